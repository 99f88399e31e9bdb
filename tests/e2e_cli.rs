use assert_cmd::prelude::*;
use predicates::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use tempfile::TempDir;

mod cli_helpers;
mod sqlite_helpers;

use cli_helpers::{
    add_cash, add_stock, base_cmd, list_transactions_json, portfolio_json, run_cmd, run_cmd_json,
    set_quote, stdout_of,
};

fn setup_temp_home() -> TempDir {
    TempDir::new().expect("failed to create temp home")
}

fn decimal(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

/// One portfolio: 10000 cash, 10 IBM at 100 quoted at 110
fn seeded_home() -> TempDir {
    let home = setup_temp_home();
    add_cash(&home, "port:a", "10000", "2024-01-01").unwrap();
    add_stock(&home, "port:a", "IBM", "10", "100", "2024-01-02").unwrap();
    set_quote(&home, "IBM", "110", "108").unwrap();
    home
}

#[test]
fn portfolio_show_empty_db_no_color_when_piped() {
    let home = setup_temp_home();

    let mut cmd = base_cmd(&home);
    cmd.arg("portfolio").arg("show");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No transactions found"))
        .stdout(predicate::str::contains("\u{001b}[").not());
}

#[test]
fn init_creates_database() {
    let home = setup_temp_home();
    let db_path = sqlite_helpers::db_path(&home);
    assert!(!db_path.exists(), "db should start absent");

    let mut cmd = base_cmd(&home);
    cmd.arg("init");
    cmd.assert().success().stdout(predicate::str::contains("Database ready"));

    assert!(db_path.exists());
    let conn = sqlite_helpers::open_conn(&home).unwrap();
    assert_eq!(sqlite_helpers::count_rows(&conn, "transaction_list").unwrap(), 0);
}

#[test]
fn add_then_list_transactions() {
    let home = seeded_home();
    add_stock(&home, "port:b", "MSFT", "-3", "300", "2024-01-03").unwrap();

    let rows = list_transactions_json(&home, "port:a").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["symbol"], "IBM");

    let short = list_transactions_json(&home, "port:b").unwrap();
    assert_eq!(decimal(&short[0]["shares"]), dec!(-3));

    let ports = run_cmd_json(&home, &["ports", "list"]).unwrap();
    assert_eq!(ports, serde_json::json!(["port:a", "port:b"]));
}

#[test]
fn invalid_fileportname_is_rejected() {
    let home = setup_temp_home();
    let mut cmd = base_cmd(&home);
    cmd.args(["transactions", "add", "noport", "IBM", "1", "10"]);
    cmd.assert().failure();
}

#[test]
fn portfolio_values_position_against_quote() {
    let home = seeded_home();

    let value = portfolio_json(&home, "port:a").unwrap();
    let port = &value[0];
    assert_eq!(port["fileportname"], "port:a");
    assert_eq!(decimal(&port["totals"]["cash"]), dec!(9000));
    assert_eq!(decimal(&port["totals"]["open_value"]), dec!(1100));
    assert_eq!(decimal(&port["totals"]["total_value"]), dec!(10100));
    assert_eq!(decimal(&port["totals"]["day_change"]), dec!(20));
    assert!(port["missing_quotes"].as_array().unwrap().is_empty());

    let table = stdout_of(&home, &["portfolio", "show"]).unwrap();
    assert!(table.contains("IBM"));
    assert!(table.contains("$10,100.00"));
}

#[test]
fn close_realizes_gain_and_sold_report_lists_it() {
    let home = seeded_home();
    let rows = list_transactions_json(&home, "port:a").unwrap();
    let id = rows[1]["id"].as_i64().unwrap().to_string();

    let closed = run_cmd_json(&home, &["transactions", "close", &id, "120", "--date", "2024-02-01"]).unwrap();
    assert_eq!(closed["closed"], true);

    let value = portfolio_json(&home, "port:a").unwrap();
    assert_eq!(decimal(&value[0]["totals"]["cash"]), dec!(10200));
    assert_eq!(decimal(&value[0]["totals"]["realized"]), dec!(200));

    let html = stdout_of(&home, &["report", "--fpn", "port:a", "--sold"]).unwrap();
    assert!(html.contains("Closed positions"));
    assert!(html.contains("+200.00"));

    let mut again = base_cmd(&home);
    again.args(["transactions", "close", &id, "120"]);
    again.assert().failure().stderr(predicate::str::contains("already closed"));
}

#[test]
fn report_written_to_file() {
    let home = seeded_home();
    let out = home.path().join("report.html");
    let out_str = out.to_str().unwrap();

    run_cmd(&home, &["report", "--viewname", "Mine", "--addcols", "Low,High", "-o", out_str]).unwrap();

    let html = std::fs::read_to_string(&out).unwrap();
    assert!(html.contains("<title>Mine</title>"));
    assert!(html.contains("CASH"));
    assert!(html.contains("IBM"));
    assert!(html.contains(">High<"));
}

#[test]
fn cgi_mode_reads_query_string() {
    let home = seeded_home();
    add_stock(&home, "port:b", "MSFT", "1", "300", "2024-01-03").unwrap();

    let mut cmd = base_cmd(&home);
    cmd.env("GATEWAY_INTERFACE", "CGI/1.1")
        .env("QUERY_STRING", "port=b&handheld=1&viewname=Phone")
        .arg("report");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("Content-type: text/html\n\n"))
        .stdout(predicate::str::contains("<title>Phone</title>"))
        .stdout(predicate::str::contains("MSFT"))
        .stdout(predicate::str::contains("port:a").not());
}

#[test]
fn totals_update_records_snapshot() {
    let home = seeded_home();

    let rows = run_cmd_json(&home, &["totals", "update"]).unwrap();
    let row = &rows[0];
    assert_eq!(row["fileportname"], "port:a");
    assert_eq!(decimal(&row["totals"]["total_value"]), dec!(10100));
    assert!(row["day_gain"].is_null());

    let params = run_cmd_json(&home, &["totals", "show"]).unwrap();
    assert_eq!(decimal(&params[0]["total_value"]), dec!(10100));

    let conn = sqlite_helpers::open_conn(&home).unwrap();
    assert_eq!(sqlite_helpers::count_rows(&conn, "port_history").unwrap(), 1);
}

#[test]
fn history_rebuild_offline_uses_purchase_price() {
    let home = seeded_home();

    let summary = run_cmd_json(&home, &["history", "rebuild", "port:a", "--until", "2024-01-05"]).unwrap();
    assert_eq!(summary["days_written"], 5);
    assert_eq!(summary["unpriced_symbols"], serde_json::json!(["IBM"]));

    let conn = sqlite_helpers::open_conn(&home).unwrap();
    let totals = sqlite_helpers::history_totals(&conn, "port:a").unwrap();
    assert_eq!(totals.len(), 5);
    assert!(totals.iter().all(|(_, total)| Decimal::from_str(total).unwrap() == dec!(10000)));

    let out = home.path().join("plot.html");
    run_cmd(&home, &["history", "plot", "-o", out.to_str().unwrap()]).unwrap();
    let page = std::fs::read_to_string(&out).unwrap();
    assert!(page.contains("<svg"));
    assert!(page.contains("port:a"));
}

#[test]
fn export_then_import_into_fresh_home() {
    let home = seeded_home();
    let csv_path = home.path().join("tx.csv");
    run_cmd(&home, &["transactions", "export", "-o", csv_path.to_str().unwrap()]).unwrap();

    let other = setup_temp_home();
    let imported = run_cmd_json(&other, &["transactions", "import", csv_path.to_str().unwrap()]).unwrap();
    assert_eq!(imported["imported"], 2);

    let rows = list_transactions_json(&other, "port:a").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["symbol"], "CASH");
}

#[test]
fn holidays_and_tickers_round_trip() {
    let home = setup_temp_home();

    run_cmd(&home, &["holidays", "add", "2024-07-04", "--name", "Independence Day"]).unwrap();
    let holidays = run_cmd_json(&home, &["holidays", "list"]).unwrap();
    assert_eq!(holidays[0]["date"], "2024-07-04");
    run_cmd(&home, &["holidays", "remove", "2024-07-04"]).unwrap();
    assert_eq!(run_cmd_json(&home, &["holidays", "list"]).unwrap(), serde_json::json!([]));

    run_cmd(&home, &["tickers", "add", "^gspc"]).unwrap();
    assert_eq!(run_cmd_json(&home, &["tickers", "list"]).unwrap(), serde_json::json!(["^GSPC"]));
    run_cmd(&home, &["tickers", "remove", "^GSPC"]).unwrap();

    let mut missing = base_cmd(&home);
    missing.args(["tickers", "remove", "^GSPC"]);
    missing.assert().failure();
}

#[test]
fn quotes_update_offline_is_a_no_op() {
    let home = seeded_home();
    let summary = run_cmd_json(&home, &["quotes", "update"]).unwrap();
    assert_eq!(summary["updated"], serde_json::json!([]));

    let line = stdout_of(&home, &["quotes", "get", "IBM", "--line"]).unwrap();
    assert!(line.starts_with("108 110 "));
}
