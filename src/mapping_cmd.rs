use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};

use crate::{
    catalog::{AnalysisType, Catalog},
    cli::{CatalogArgs, OutputFormat, ProfileArgs, ResolveArgs, SuggestArgs},
    config::ClassifierConfig,
    mapping::ColumnMapping,
    profile::profile_columns,
    store::MappingStore,
    suggest::{
        ExternalClassifierProvider, HeuristicProvider, HttpClassifier, SuggestionProvider,
    },
    table,
    workspace::{Workspace, parse_target},
};

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing output as JSON")?;
    println!("{rendered}");
    Ok(())
}

fn sample_limit(rows: usize) -> Option<usize> {
    (rows > 0).then_some(rows)
}

pub fn execute_catalog(args: &CatalogArgs) -> Result<()> {
    let workspace = Workspace::open(&args.store)?;
    let catalog = match args.analysis {
        Some(analysis) => Catalog::from_specs(workspace.catalog.fields(analysis).cloned().collect())?,
        None => workspace.catalog.clone(),
    };
    let specs = AnalysisType::variants()
        .iter()
        .flat_map(|analysis| catalog.fields(*analysis))
        .collect::<Vec<_>>();
    match args.format {
        OutputFormat::Yaml => print!("{}", catalog.to_yaml_string()?),
        OutputFormat::Json => print_json(&specs)?,
        OutputFormat::Table => {
            let headers = ["analysis", "field", "kind", "aliases"]
                .map(String::from)
                .to_vec();
            let rows = specs
                .iter()
                .map(|spec| {
                    vec![
                        spec.analysis_type.to_string(),
                        spec.field_name.clone(),
                        spec.kind.as_str().to_string(),
                        spec.aliases.join(", "),
                    ]
                })
                .collect::<Vec<_>>();
            table::print_table(&headers, &rows);
        }
    }
    Ok(())
}

pub fn execute_resolve(args: &ResolveArgs) -> Result<()> {
    let workspace = Workspace::open(&args.store)?;
    let (tenant, file) = parse_target(&args.target)?;
    let report = workspace
        .analytics()
        .resolution(&tenant, &file, args.analysis)?
        .with_context(|| format!("File '{file}' not found for tenant '{tenant}'"))?;
    if !report.mapping_present {
        warn!("No {} mapping for {tenant}/{file}; showing heuristic resolution", args.analysis);
    }
    if args.json {
        return print_json(&report);
    }
    let headers = ["field", "column", "strategy"].map(String::from).to_vec();
    let rows = report
        .resolved
        .iter()
        .map(|(field, resolution)| {
            vec![
                field.to_string(),
                resolution.column().unwrap_or("-").to_string(),
                resolution.strategy().to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    for dangling in report.resolved.dangling() {
        println!(
            "dangling: '{}' is mapped to missing column '{}'",
            dangling.field, dangling.column
        );
    }
    Ok(())
}

pub fn execute_profile(args: &ProfileArgs) -> Result<()> {
    let workspace = Workspace::open(&args.store)?;
    let (tenant, file) = parse_target(&args.target)?;
    let suggestion = &workspace.config.suggestion;
    let rows = args.sample_rows.unwrap_or(suggestion.sample_rows);
    let values = args.sample_values.unwrap_or(suggestion.sample_values);
    let records = workspace.load_records(&tenant, &file, sample_limit(rows))?;
    let samples = profile_columns(&records, values);
    info!("Profiled {} column(s) from {} row(s)", samples.len(), records.len());
    if args.json {
        return print_json(&samples);
    }
    let headers = ["column", "type", "non_empty", "cardinality", "samples"]
        .map(String::from)
        .to_vec();
    let rows = samples
        .iter()
        .map(|sample| {
            vec![
                sample.name.clone(),
                sample.kind.to_string(),
                sample.non_empty.to_string(),
                sample.cardinality.to_string(),
                sample.sample_values.join(", "),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}

fn classifier_config(args: &SuggestArgs, workspace: &Workspace) -> Option<ClassifierConfig> {
    let configured = workspace.config.suggestion.classifier.clone();
    let mut config = match (&args.classifier_url, configured) {
        (Some(url), Some(existing)) => ClassifierConfig {
            endpoint: url.clone(),
            ..existing
        },
        (Some(url), None) => ClassifierConfig {
            endpoint: url.clone(),
            timeout_ms: crate::config::DEFAULT_CLASSIFIER_TIMEOUT_MS,
            api_key_env: None,
        },
        (None, existing) => existing?,
    };
    if let Some(timeout_ms) = args.classifier_timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    Some(config)
}

fn build_provider(args: &SuggestArgs, workspace: &Workspace) -> Box<dyn SuggestionProvider> {
    let heuristic = HeuristicProvider::new(workspace.catalog.clone());
    let Some(config) = classifier_config(args, workspace) else {
        return Box::new(heuristic);
    };
    match HttpClassifier::from_config(&config) {
        Ok(classifier) => {
            info!("Using external classifier at {}", classifier.endpoint());
            let fallback = args.fallback.unwrap_or(workspace.config.suggestion.fallback);
            Box::new(
                ExternalClassifierProvider::new(Arc::new(classifier), heuristic)
                    .with_fallback(fallback)
                    .with_timeout(config.timeout()),
            )
        }
        Err(err) => {
            warn!("External classifier unavailable ({err:#}); using heuristic suggestions");
            Box::new(heuristic)
        }
    }
}

pub fn execute_suggest(args: &SuggestArgs) -> Result<()> {
    let workspace = Workspace::open(&args.store)?;
    let (tenant, file) = parse_target(&args.target)?;
    let settings = &workspace.config.suggestion;
    let rows = args.sample_rows.unwrap_or(settings.sample_rows);
    let min_confidence = args.min_confidence.unwrap_or(settings.min_confidence);
    let records = workspace.load_records(&tenant, &file, sample_limit(rows))?;
    let samples = profile_columns(&records, settings.sample_values);

    let provider = build_provider(args, &workspace);
    let suggestions = provider.suggest(&samples, args.analysis);
    let accepted = suggestions.accepted(min_confidence);
    info!(
        "{} suggestion(s) for {tenant}/{file} ({}), {} at or above {min_confidence}",
        suggestions.len(),
        provider.kind(),
        accepted.len()
    );

    if args.json {
        print_json(&suggestions)?;
    } else {
        let headers = ["field", "column", "confidence", "provider", "accepted"]
            .map(String::from)
            .to_vec();
        let rows = suggestions
            .iter()
            .map(|s| {
                let is_accepted = s.source_column.is_some() && s.confidence >= min_confidence;
                vec![
                    s.canonical_field.clone(),
                    s.source_column.clone().unwrap_or_else(|| "-".to_string()),
                    format!("{:.2}", s.confidence),
                    s.provider.to_string(),
                    if is_accepted { "yes" } else { "no" }.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
    }

    if args.write {
        let mut mapping = workspace
            .store
            .get_mapping(&tenant, &file, args.analysis)?
            .unwrap_or_else(|| ColumnMapping::new(tenant.clone(), file.clone(), args.analysis));
        let mut added = 0usize;
        for (field, column) in accepted {
            if mapping.column_for(&field).is_none() {
                mapping.entries.insert(field, column);
                added += 1;
            }
        }
        mapping.updated_at = Some(Utc::now());
        let path = workspace.store.save_mapping(&mapping)?;
        info!("Wrote {added} new mapping entries to {path:?}");
    }
    Ok(())
}
