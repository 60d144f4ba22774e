//! Row and mapping stores.
//!
//! The engine only ever reads from these. An absent file or mapping is
//! `Ok(None)`; `Err` is reserved for stores that exist but cannot be read.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
    catalog::AnalysisType,
    data::Record,
    io_utils,
    mapping::{ColumnMapping, FileId, MappingEntries, TenantId},
};

pub trait RowStore {
    fn list_records(&self, tenant: &TenantId, file: &FileId) -> Result<Option<Vec<Record>>>;
}

pub trait MappingStore {
    fn get_mapping(
        &self,
        tenant: &TenantId,
        file: &FileId,
        analysis: AnalysisType,
    ) -> Result<Option<ColumnMapping>>;
}

impl<T: RowStore + ?Sized> RowStore for &T {
    fn list_records(&self, tenant: &TenantId, file: &FileId) -> Result<Option<Vec<Record>>> {
        (**self).list_records(tenant, file)
    }
}

impl<T: MappingStore + ?Sized> MappingStore for &T {
    fn get_mapping(
        &self,
        tenant: &TenantId,
        file: &FileId,
        analysis: AnalysisType,
    ) -> Result<Option<ColumnMapping>> {
        (**self).get_mapping(tenant, file, analysis)
    }
}

/// In-memory store for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    rows: HashMap<(TenantId, FileId), Vec<Record>>,
    mappings: HashMap<(TenantId, FileId, AnalysisType), ColumnMapping>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_records(&mut self, tenant: TenantId, file: FileId, records: Vec<Record>) {
        self.rows.insert((tenant, file), records);
    }

    pub fn insert_mapping(&mut self, mapping: ColumnMapping) {
        let key = (
            mapping.tenant_id.clone(),
            mapping.file_id.clone(),
            mapping.analysis_type,
        );
        self.mappings.insert(key, mapping);
    }
}

impl RowStore for MemoryStore {
    fn list_records(&self, tenant: &TenantId, file: &FileId) -> Result<Option<Vec<Record>>> {
        Ok(self.rows.get(&(tenant.clone(), file.clone())).cloned())
    }
}

impl MappingStore for MemoryStore {
    fn get_mapping(
        &self,
        tenant: &TenantId,
        file: &FileId,
        analysis: AnalysisType,
    ) -> Result<Option<ColumnMapping>> {
        Ok(self
            .mappings
            .get(&(tenant.clone(), file.clone(), analysis))
            .cloned())
    }
}

const ROW_EXTENSIONS: &[&str] = &["csv", "tsv"];

/// On-disk mapping document. Tenant, file and analysis type come from the
/// file's location.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MappingFile {
    #[serde(default)]
    entries: MappingEntries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// File-backed store rooted at a data directory:
///
/// ```text
/// <root>/<tenant>/<file>.csv                      rows (or .tsv)
/// <root>/<tenant>/<file>.<analysis>.mapping.yml   column mapping
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    encoding: &'static Encoding,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            encoding: UTF_8,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tenant_dir(&self, tenant: &TenantId) -> PathBuf {
        self.root.join(tenant.as_str())
    }

    /// Path of the rows file, if one exists with a supported extension.
    pub fn rows_path(&self, tenant: &TenantId, file: &FileId) -> Option<PathBuf> {
        let dir = self.tenant_dir(tenant);
        ROW_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{ext}", file.as_str())))
            .find(|path| path.is_file())
    }

    pub fn mapping_path(&self, tenant: &TenantId, file: &FileId, analysis: AnalysisType) -> PathBuf {
        self.tenant_dir(tenant)
            .join(format!("{}.{}.mapping.yml", file.as_str(), analysis))
    }

    /// Writes `mapping`, stamping `updated_at` when it is unset.
    ///
    /// The document is staged in a temporary file next to the target and
    /// renamed over it, so readers never observe a partially written mapping.
    pub fn save_mapping(&self, mapping: &ColumnMapping) -> Result<PathBuf> {
        let path = self.mapping_path(&mapping.tenant_id, &mapping.file_id, mapping.analysis_type);
        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating mapping directory {parent:?}"))?;
        let document = MappingFile {
            entries: mapping.entries.clone(),
            updated_at: mapping.updated_at.or_else(|| Some(Utc::now())),
        };
        let mut staged = NamedTempFile::new_in(parent)
            .with_context(|| format!("Creating temporary mapping file in {parent:?}"))?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            serde_yaml::to_writer(&mut writer, &document)
                .with_context(|| format!("Writing mapping YAML for {path:?}"))?;
            writer
                .flush()
                .with_context(|| format!("Flushing mapping YAML for {path:?}"))?;
        }
        staged
            .persist(&path)
            .with_context(|| format!("Replacing mapping file {path:?}"))?;
        debug!("Saved mapping to {path:?}");
        Ok(path)
    }
}

impl RowStore for DirectoryStore {
    fn list_records(&self, tenant: &TenantId, file: &FileId) -> Result<Option<Vec<Record>>> {
        let Some(path) = self.rows_path(tenant, file) else {
            debug!("No rows file for {tenant}/{file} under {:?}", self.root);
            return Ok(None);
        };
        io_utils::read_records_from_path(&path, self.encoding).map(Some)
    }
}

impl MappingStore for DirectoryStore {
    fn get_mapping(
        &self,
        tenant: &TenantId,
        file: &FileId,
        analysis: AnalysisType,
    ) -> Result<Option<ColumnMapping>> {
        let path = self.mapping_path(tenant, file, analysis);
        if !path.is_file() {
            debug!("No {analysis} mapping at {path:?}");
            return Ok(None);
        }
        let handle = File::open(&path).with_context(|| format!("Opening mapping file {path:?}"))?;
        let document: MappingFile = serde_yaml::from_reader(BufReader::new(handle))
            .with_context(|| format!("Parsing mapping YAML {path:?}"))?;
        Ok(Some(ColumnMapping {
            tenant_id: tenant.clone(),
            file_id: file.clone(),
            analysis_type: analysis,
            entries: document.entries,
            updated_at: document.updated_at,
        }))
    }
}
