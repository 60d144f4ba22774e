mod common;

use std::fs;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::*;
use predicates::str::contains;
use sheet_insights::catalog::AnalysisType;

fn sheet_insights() -> Command {
    Command::cargo_bin("sheet-insights").expect("binary exists")
}

fn customers_workspace() -> TestWorkspace {
    let workspace = TestWorkspace::new();
    workspace.write_rows("acme", "sales", "Name,Total\nAnn,\"1,000\"\nAnn,250.5\nBob,99\n");
    workspace.write_mapping(
        "acme",
        "sales",
        AnalysisType::Customer,
        &[("customer_name", "Name"), ("total_amount", "Total")],
    );
    workspace
}

#[test]
fn catalog_lists_builtin_fields_as_yaml() {
    sheet_insights()
        .args(["catalog", "--analysis", "product", "--format", "yaml"])
        .assert()
        .success()
        .stdout(contains("field_name: product_id"))
        .stdout(contains("analysis_type: product"))
        .stdout(contains("customer_id").not());
}

#[test]
fn top_customers_prints_a_ranked_table() {
    let workspace = customers_workspace();
    let output = sheet_insights()
        .args([
            "top",
            "customers",
            "--data-dir",
            workspace.path_str(),
            "-t",
            "acme",
            "-f",
            "sales",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).expect("utf-8 output");
    let lines = stdout.lines().collect::<Vec<_>>();
    assert!(lines[0].starts_with("rank"), "{stdout}");
    assert!(lines[2].contains("Ann") && lines[2].contains("1250.50"), "{stdout}");
    assert!(lines[3].contains("Bob") && lines[3].contains("99.00"), "{stdout}");
}

#[test]
fn top_customers_json_honours_limit_and_offset() {
    let workspace = customers_workspace();
    let output = sheet_insights()
        .args([
            "top",
            "customers",
            "--data-dir",
            workspace.path_str(),
            "-t",
            "acme",
            "-f",
            "sales",
            "--limit",
            "1",
            "--offset",
            "1",
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(value["limit_applied"], 1);
    assert_eq!(value["total_entities"], 2);
    assert_eq!(value["rows"][0]["identity_display"], "Bob");
    assert_eq!(value["rows"][0]["count"], 1);
}

#[test]
fn missing_file_prints_a_note_instead_of_failing() {
    let workspace = TestWorkspace::new();
    sheet_insights()
        .args([
            "total",
            "sales",
            "--data-dir",
            workspace.path_str(),
            "-t",
            "acme",
            "-f",
            "nothing",
        ])
        .assert()
        .success()
        .stdout(contains("note: file not found"));
}

#[test]
fn range_rejects_reversed_dates() {
    let workspace = customers_workspace();
    sheet_insights()
        .args([
            "range",
            "--data-dir",
            workspace.path_str(),
            "-t",
            "acme",
            "-f",
            "sales",
            "--start",
            "2024-02-01",
            "--end",
            "2024-01-01",
        ])
        .assert()
        .failure()
        .stderr(contains("is after end"));
}

#[test]
fn range_buckets_orders_by_month() {
    let workspace = TestWorkspace::new();
    workspace.write_rows(
        "acme",
        "orders",
        "Order,Date,Total\nA1,2024-01-05,10\nA2,2024-01-20,5\nA3,2024-02-02,7\nA4,bad,3\n",
    );
    workspace.write_mapping(
        "acme",
        "orders",
        AnalysisType::Order,
        &[("order_date", "Date"), ("total_amount", "Total")],
    );
    let output = sheet_insights()
        .args([
            "range",
            "--data-dir",
            workspace.path_str(),
            "-t",
            "acme",
            "-f",
            "orders",
            "--start",
            "2024-01-01",
            "--end",
            "2024-12-31",
            "--granularity",
            "month",
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(value["row_count"], 4);
    assert_eq!(value["rows"][0]["bucket_key"], "2024-01");
    assert_eq!(value["rows"][0]["total_amount"], 15.0);
    assert_eq!(value["rows"][1]["bucket_key"], "2024-02");
}

#[test]
fn suggest_write_creates_a_usable_mapping() {
    let workspace = TestWorkspace::new();
    workspace.write_rows(
        "acme",
        "sales",
        "customer_name,mobile,total\nAnn,0501234567,10\nBob,0559876543,4\n",
    );
    sheet_insights()
        .args([
            "suggest",
            "--data-dir",
            workspace.path_str(),
            "-t",
            "acme",
            "-f",
            "sales",
            "--analysis",
            "customer",
            "--write",
        ])
        .assert()
        .success()
        .stdout(contains("customer_name"));

    let mapping_path = workspace.path().join("acme/sales.customer.mapping.yml");
    let mapping = fs::read_to_string(&mapping_path).expect("mapping written");
    assert!(mapping.contains("customer_name: customer_name"), "{mapping}");
    assert!(mapping.contains("phone: mobile"), "{mapping}");

    sheet_insights()
        .args([
            "total",
            "customers",
            "--data-dir",
            workspace.path_str(),
            "-t",
            "acme",
            "-f",
            "sales",
        ])
        .assert()
        .success()
        .stdout(contains("total_customers"));
}

#[test]
fn resolve_reports_strategy_per_field() {
    let workspace = customers_workspace();
    sheet_insights()
        .args([
            "resolve",
            "--data-dir",
            workspace.path_str(),
            "-t",
            "acme",
            "-f",
            "sales",
            "-a",
            "customer",
        ])
        .assert()
        .success()
        .stdout(contains("customer_name"))
        .stdout(contains("exact_alias"));
}

#[test]
fn path_like_tenants_are_rejected() {
    let workspace = customers_workspace();
    sheet_insights()
        .args([
            "total",
            "sales",
            "--data-dir",
            workspace.path_str(),
            "-t",
            "../acme",
            "-f",
            "sales",
        ])
        .assert()
        .failure()
        .stderr(contains("--tenant"));
}
