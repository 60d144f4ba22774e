#![allow(dead_code)]

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use encoding_rs::UTF_8;
use sheet_insights::{
    DirectoryStore, FileId, Record, TenantId, catalog::AnalysisType, io_utils::read_records,
};
use tempfile::{TempDir, tempdir};

/// Parses comma-separated `contents` (header line first) into records.
pub fn records(contents: &str) -> Vec<Record> {
    read_records(Cursor::new(contents.as_bytes().to_vec()), b',', UTF_8).expect("parse records")
}

pub fn tenant(value: &str) -> TenantId {
    TenantId::new(value).expect("tenant id")
}

pub fn file(value: &str) -> FileId {
    FileId::new(value).expect("file id")
}

/// Data directory laid out the way `DirectoryStore` expects, removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path_str(&self) -> &str {
        self.path().to_str().expect("utf-8 temp path")
    }

    /// Writes `contents` to `name` under the workspace, creating parents.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file");
        path
    }

    /// Writes a tenant's rows file as `<tenant>/<file>.csv`.
    pub fn write_rows(&self, tenant: &str, file: &str, csv: &str) -> PathBuf {
        self.write(&format!("{tenant}/{file}.csv"), csv)
    }

    /// Writes a mapping document from `(field, column)` pairs.
    pub fn write_mapping(
        &self,
        tenant: &str,
        file: &str,
        analysis: AnalysisType,
        entries: &[(&str, &str)],
    ) -> PathBuf {
        let mut yaml = String::from("entries:\n");
        for (field, column) in entries {
            yaml.push_str(&format!("  {field}: \"{column}\"\n"));
        }
        self.write(&format!("{tenant}/{file}.{analysis}.mapping.yml"), &yaml)
    }

    pub fn store(&self) -> DirectoryStore {
        DirectoryStore::new(self.path())
    }
}
