use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;

use crate::{
    aggregate::{DateRange, Page},
    analytics::{RankedQuery, TotalQuery},
    cli::{RangeArgs, TopArgs, TotalArgs},
    results::{EmptyReason, RankedList},
    table,
    workspace::{Workspace, parse_target},
};

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing output as JSON")?;
    println!("{rendered}");
    Ok(())
}

fn print_reason(reason: Option<&EmptyReason>) {
    if let Some(reason) = reason {
        println!("note: {reason}");
    }
}

fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

fn ranked_table(list: &RankedList) -> (Vec<String>, Vec<Vec<String>>) {
    let extra_keys = list
        .rows
        .iter()
        .flat_map(|row| row.extras.keys())
        .unique()
        .sorted()
        .cloned()
        .collect::<Vec<_>>();
    let with_units = list.rows.iter().any(|row| row.units.is_some());
    let with_last_seen = list.rows.iter().any(|row| row.last_seen.is_some());

    let mut headers = vec!["rank".to_string(), "name".to_string(), "count".to_string(), "amount".to_string()];
    if with_units {
        headers.push("units".to_string());
    }
    if with_last_seen {
        headers.push("last_seen".to_string());
    }
    headers.extend(extra_keys.iter().cloned());

    let rows = list
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut cells = vec![
                (idx + 1).to_string(),
                row.identity_display.clone(),
                row.count.to_string(),
                format_amount(row.amount),
            ];
            if with_units {
                cells.push(row.units.map(|u| u.to_string()).unwrap_or_default());
            }
            if with_last_seen {
                cells.push(row.last_seen.map(|d| d.to_string()).unwrap_or_default());
            }
            for key in &extra_keys {
                cells.push(row.extras.get(key).cloned().unwrap_or_default());
            }
            cells
        })
        .collect();
    (headers, rows)
}

pub fn execute_top(args: &TopArgs) -> Result<()> {
    let workspace = Workspace::open(&args.store)?;
    let (tenant, file) = parse_target(&args.target)?;
    let query = RankedQuery::from(args.target_kind);
    let page = Page {
        offset: args.offset,
        limit: (args.limit > 0).then_some(args.limit),
    };
    let list = workspace
        .analytics()
        .ranked(query, &tenant, &file, args.sort, page)?;

    if args.json {
        return print_json(&list);
    }
    let (headers, rows) = ranked_table(&list);
    table::print_table(&headers, &rows);
    print_reason(list.reason.as_ref());
    info!(
        "Showing {} of {} ranked entities (offset {})",
        list.rows.len(),
        list.total_entities,
        args.offset
    );
    Ok(())
}

pub fn execute_total(args: &TotalArgs) -> Result<()> {
    let workspace = Workspace::open(&args.store)?;
    let (tenant, file) = parse_target(&args.target)?;
    let query = TotalQuery::from(args.metric);
    let totals = workspace.analytics().total(query, &tenant, &file)?;

    if args.json {
        return print_json(&totals);
    }
    let value = match query {
        TotalQuery::Sales => format_amount(totals.total),
        _ => format!("{}", totals.total as u64),
    };
    let headers = ["metric", "value", "rows"].map(String::from).to_vec();
    let rows = vec![vec![
        query.name().to_string(),
        value,
        totals.row_count.to_string(),
    ]];
    table::print_table(&headers, &rows);
    print_reason(totals.reason.as_ref());
    Ok(())
}

pub fn execute_range(args: &RangeArgs) -> Result<()> {
    let range = DateRange::new(args.start, args.end)?;
    let workspace = Workspace::open(&args.store)?;
    let (tenant, file) = parse_target(&args.target)?;
    let buckets = workspace
        .analytics()
        .orders_in_range(&tenant, &file, &range, args.granularity)?;

    if args.json {
        return print_json(&buckets);
    }
    let headers = ["bucket", "amount", "count"].map(String::from).to_vec();
    let rows = buckets
        .rows
        .iter()
        .map(|row| {
            vec![
                row.bucket_key.clone(),
                format_amount(row.total_amount),
                row.count.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    print_reason(buckets.reason.as_ref());
    info!(
        "{} bucket(s) between {} and {} from {} row(s)",
        buckets.rows.len(),
        args.start,
        args.end,
        buckets.row_count
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::results::RankedRow;

    fn row(name: &str, amount: f64, extras: &[(&str, &str)]) -> RankedRow {
        RankedRow {
            identity_display: name.to_string(),
            count: 1,
            amount,
            units: None,
            last_seen: None,
            extras: extras
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn ranked_table_unions_extra_columns() {
        let list = RankedList {
            rows: vec![
                row("Ann", 10.0, &[("phone", "555")]),
                row("Bob", 4.5, &[("email", "bob@example.com")]),
            ],
            limit_applied: 10,
            total_entities: 2,
            reason: None,
        };
        let (headers, rows) = ranked_table(&list);
        assert_eq!(headers, vec!["rank", "name", "count", "amount", "email", "phone"]);
        assert_eq!(rows[0], vec!["1", "Ann", "1", "10.00", "", "555"]);
        assert_eq!(rows[1][4], "bob@example.com");
    }

    #[test]
    fn optional_columns_appear_only_when_populated() {
        let mut first = row("Widget", 3.0, &[]);
        first.units = Some(2.0);
        let list = RankedList {
            rows: vec![first],
            limit_applied: 1,
            total_entities: 1,
            reason: None,
        };
        let (headers, rows) = ranked_table(&list);
        assert_eq!(headers, vec!["rank", "name", "count", "amount", "units"]);
        assert_eq!(rows[0][4], "2");
    }
}
