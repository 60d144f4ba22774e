use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    aggregate::{Granularity, SortKey},
    analytics::{RankedQuery, TotalQuery},
    catalog::AnalysisType,
    suggest::FallbackPolicy,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Resolve spreadsheet columns to canonical fields and run analytics over them",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List canonical fields and their aliases
    Catalog(CatalogArgs),
    /// Show how each canonical field resolves against a file
    Resolve(ResolveArgs),
    /// Profile the columns of a file (value shape, samples, cardinality)
    Profile(ProfileArgs),
    /// Suggest a column mapping for a file, optionally writing it
    Suggest(SuggestArgs),
    /// Rank customers or products by amount, count, units or recency
    Top(TopArgs),
    /// Compute a scalar total (sales, orders, customers, products)
    Total(TotalArgs),
    /// Bucket order amounts and counts by day, month or year within a date range
    Range(RangeArgs),
}

/// Where tenant files and mappings live.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Root directory holding `<tenant>/<file>.csv` and mapping files
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,
    /// YAML configuration file
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Canonical catalog override (YAML)
    #[arg(long = "catalog")]
    pub catalog: Option<PathBuf>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Maximum number of records read per file
    #[arg(long = "record-cap")]
    pub record_cap: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Tenant identifier
    #[arg(short = 't', long = "tenant")]
    pub tenant: String,
    /// File identifier (file name without extension)
    #[arg(short = 'f', long = "file")]
    pub file: String,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Restrict output to one analysis type
    #[arg(short = 'a', long = "analysis", value_parser = parse_analysis_type)]
    pub analysis: Option<AnalysisType>,
    /// Output format
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Analysis type whose catalog fields are resolved
    #[arg(short = 'a', long = "analysis", value_parser = parse_analysis_type)]
    pub analysis: AnalysisType,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Number of rows to sample (0 means all rows)
    #[arg(long = "sample-rows")]
    pub sample_rows: Option<usize>,
    /// Distinct example values kept per column
    #[arg(long = "sample-values")]
    pub sample_values: Option<usize>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Analysis type to suggest a mapping for
    #[arg(short = 'a', long = "analysis", value_parser = parse_analysis_type)]
    pub analysis: AnalysisType,
    /// Number of rows to sample (0 means all rows)
    #[arg(long = "sample-rows")]
    pub sample_rows: Option<usize>,
    /// Minimum confidence for an entry to be accepted with --write
    #[arg(long = "min-confidence", value_parser = parse_confidence)]
    pub min_confidence: Option<f64>,
    /// External classifier endpoint (overrides the configuration file)
    #[arg(long = "classifier-url")]
    pub classifier_url: Option<String>,
    /// Deadline for the external classifier in milliseconds
    #[arg(long = "classifier-timeout-ms")]
    pub classifier_timeout_ms: Option<u64>,
    /// What to return when the classifier fails: heuristic or empty
    #[arg(long = "fallback", value_parser = parse_fallback)]
    pub fallback: Option<FallbackPolicy>,
    /// Write accepted entries to the file's mapping
    #[arg(long)]
    pub write: bool,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RankedTarget {
    Customers,
    Products,
}

impl From<RankedTarget> for RankedQuery {
    fn from(value: RankedTarget) -> Self {
        match value {
            RankedTarget::Customers => RankedQuery::TopCustomers,
            RankedTarget::Products => RankedQuery::TopProducts,
        }
    }
}

#[derive(Debug, Args)]
pub struct TopArgs {
    /// What to rank
    #[arg(value_enum)]
    pub target_kind: RankedTarget,
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Maximum number of rows to return (0 returns every row)
    #[arg(short = 'n', long = "limit", default_value_t = 10)]
    pub limit: usize,
    /// Number of ranked rows to skip
    #[arg(long = "offset", default_value_t = 0)]
    pub offset: usize,
    /// Ranking key: amount, count, units or recent
    #[arg(long = "sort", value_parser = parse_sort_key, default_value = "amount")]
    pub sort: SortKey,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum TotalTarget {
    Sales,
    Orders,
    Customers,
    Products,
}

impl From<TotalTarget> for TotalQuery {
    fn from(value: TotalTarget) -> Self {
        match value {
            TotalTarget::Sales => TotalQuery::Sales,
            TotalTarget::Orders => TotalQuery::Orders,
            TotalTarget::Customers => TotalQuery::Customers,
            TotalTarget::Products => TotalQuery::Products,
        }
    }
}

#[derive(Debug, Args)]
pub struct TotalArgs {
    /// Which total to compute
    #[arg(value_enum)]
    pub metric: TotalTarget,
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RangeArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub target: TargetArgs,
    /// First day of the range (YYYY-MM-DD, inclusive)
    #[arg(long = "start", value_parser = parse_date)]
    pub start: NaiveDate,
    /// Last day of the range (YYYY-MM-DD, inclusive)
    #[arg(long = "end", value_parser = parse_date)]
    pub end: NaiveDate,
    /// Bucket size: day, month or year
    #[arg(long = "granularity", value_parser = parse_granularity, default_value = "day")]
    pub granularity: Granularity,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn parse_analysis_type(value: &str) -> Result<AnalysisType, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}

pub fn parse_sort_key(value: &str) -> Result<SortKey, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}

pub fn parse_granularity(value: &str) -> Result<Granularity, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}

pub fn parse_fallback(value: &str) -> Result<FallbackPolicy, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("Invalid date '{value}' (expected YYYY-MM-DD): {err}"))
}

pub fn parse_confidence(value: &str) -> Result<f64, String> {
    let parsed = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Confidence '{value}' is not a number"))?;
    if (0.0..=1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("Confidence must be within [0, 1], got {parsed}"))
    }
}
