//! Command-line context: configuration, data directory, catalog and store,
//! with flags taking precedence over the configuration file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::debug;

use crate::{
    analytics::Analytics,
    catalog::Catalog,
    cli::{StoreArgs, TargetArgs},
    config::EngineConfig,
    data::Record,
    io_utils,
    mapping::{FileId, TenantId},
    store::{DirectoryStore, RowStore},
};

pub struct Workspace {
    pub config: EngineConfig,
    pub store: DirectoryStore,
    pub catalog: Catalog,
    pub record_cap: Option<usize>,
}

impl Workspace {
    pub fn open(args: &StoreArgs) -> Result<Self> {
        let config = EngineConfig::load_optional(args.config.as_deref())?;
        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let encoding = io_utils::resolve_encoding(
            args.input_encoding
                .as_deref()
                .or(config.input_encoding.as_deref()),
        )?;
        let catalog = match &args.catalog {
            Some(path) => Catalog::load(path)?,
            None => config.load_catalog()?,
        };
        let record_cap = args.record_cap.or(config.record_cap);
        debug!(
            "Workspace at {data_dir:?} (encoding {}, {} catalog field(s))",
            encoding.name(),
            catalog.len()
        );
        Ok(Self {
            store: DirectoryStore::new(data_dir).with_encoding(encoding),
            config,
            catalog,
            record_cap,
        })
    }

    pub fn analytics(&self) -> Analytics<&DirectoryStore, &DirectoryStore> {
        Analytics::new(&self.store, &self.store)
            .with_catalog(self.catalog.clone())
            .with_record_cap(self.record_cap)
    }

    /// Records of a file that must exist, capped at `limit` rows when set.
    pub fn load_records(
        &self,
        tenant: &TenantId,
        file: &FileId,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let mut records = self
            .store
            .list_records(tenant, file)?
            .with_context(|| format!("File '{file}' not found for tenant '{tenant}' under {:?}", self.store.root()))?;
        let cap = match (limit, self.record_cap) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(cap) = cap {
            records.truncate(cap);
        }
        Ok(records)
    }
}

pub fn parse_target(args: &TargetArgs) -> Result<(TenantId, FileId)> {
    let tenant = TenantId::new(args.tenant.as_str()).context("Parsing --tenant")?;
    let file = FileId::new(args.file.as_str()).context("Parsing --file")?;
    Ok((tenant, file))
}
