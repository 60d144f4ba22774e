pub mod aggregate;
pub mod analytics;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod identity;
pub mod io_utils;
pub mod mapping;
pub mod mapping_cmd;
pub mod normalize;
pub mod profile;
pub mod report;
pub mod resolver;
pub mod results;
pub mod store;
pub mod suggest;
pub mod table;
pub mod workspace;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

pub use crate::{
    aggregate::{AggregationPlan, DateRange, Granularity, Page, SortKey, aggregate},
    analytics::Analytics,
    catalog::{AnalysisType, CanonicalFieldSpec, Catalog},
    data::{RawValue, Record},
    error::{EngineError, EngineResult},
    mapping::{ColumnMapping, FileId, TenantId},
    resolver::{Resolution, ResolvedColumnSet, resolve},
    results::{EmptyReason, RangeBuckets, RankedList, ScalarTotals},
    store::{DirectoryStore, MappingStore, MemoryStore, RowStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_insights", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Catalog(args) => mapping_cmd::execute_catalog(&args),
        Commands::Resolve(args) => mapping_cmd::execute_resolve(&args),
        Commands::Profile(args) => mapping_cmd::execute_profile(&args),
        Commands::Suggest(args) => mapping_cmd::execute_suggest(&args),
        Commands::Top(args) => report::execute_top(&args),
        Commands::Total(args) => report::execute_total(&args),
        Commands::Range(args) => report::execute_range(&args),
    }
}
