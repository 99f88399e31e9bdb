//! Integration tests for the trackport library
//!
//! These tests drive the public modules against a real SQLite file:
//! - transaction storage, closing and filtering
//! - valuation against cached quotes
//! - daily totals across a market holiday
//! - history rebuild with a scripted price source
//! - CSV export and re-import
//! - report rendering for CGI requests

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use trackport::db::{
    self, Descriptor, MarketHoliday, PositionKind, Quote, Transaction, TransactionFilter,
};
use trackport::importers::{self, ExportOrder};
use trackport::quotes::yahoo::DailyClose;
use trackport::reports::{self, history::PriceHistory};

/// Test helper: Create a temporary database
fn create_test_db() -> Result<(TempDir, Connection)> {
    let temp_dir = TempDir::new()?;
    let conn = db::open_initialized(Some(temp_dir.path().join("test.db")))?;
    Ok((temp_dir, conn))
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    date.and_hms_opt(h, m, 0).unwrap()
}

fn quote(symbol: &str, last: Decimal, close: Decimal) -> Quote {
    let mut q = Quote {
        symbol: symbol.to_string(),
        last,
        close: Some(close),
        method: "manual".to_string(),
        success: true,
        ..Default::default()
    };
    q.derive_change();
    q
}

/// 10000 initial cash, 10 IBM at 100, 2 IBM calls, a closed MSFT trade
fn seed(conn: &Connection) -> Result<()> {
    let rows = vec![
        Transaction::cash("port:a", Descriptor::Initial, dec!(10000), d(2024, 1, 1)),
        Transaction::open_long("port:a", "IBM", Descriptor::Stock, dec!(10), dec!(100), d(2024, 1, 2))
            .with_sector(Some("Technology".to_string())),
        Transaction::open_long("port:a", "IBM", Descriptor::Call, dec!(2), dec!(3), d(2024, 1, 2))
            .with_option(d(2024, 6, 21), dec!(150)),
        Transaction::open_long("port:a", "MSFT", Descriptor::Stock, dec!(4), dec!(300), d(2024, 1, 3))
            .closed_at(dec!(350), d(2024, 2, 1)),
        Transaction::cash("port:a", Descriptor::Intermediate, dec!(25), d(2024, 1, 15)),
    ];
    for tx in &rows {
        db::insert_transaction(conn, tx)?;
    }
    Ok(())
}

#[test]
fn test_filters_and_close() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    seed(&conn)?;

    let open = db::list_transactions(
        &conn,
        &TransactionFilter {
            closed: Some(false),
            position: Some(PositionKind::Long),
            ..Default::default()
        },
    )?;
    assert_eq!(open.len(), 2);

    let ibm = db::list_transactions(
        &conn,
        &TransactionFilter {
            symbol: Some("ibm".to_string()),
            ..Default::default()
        },
    )?;
    assert_eq!(ibm.len(), 2);

    let id = ibm[0].id.ok_or_else(|| anyhow!("stored row has an id"))?;
    let closed = db::close_transaction(&conn, id, dec!(120), d(2024, 3, 1))?;
    assert_eq!(closed.realized_gain(), dec!(200));
    assert!(db::close_transaction(&conn, id, dec!(120), d(2024, 3, 1)).is_err());

    assert!(db::delete_transaction(&conn, id)?);
    assert!(db::get_transaction(&conn, id)?.is_none());
    Ok(())
}

#[test]
fn test_valuation_against_quotes() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    seed(&conn)?;
    db::upsert_quote(&conn, &quote("IBM", dec!(110), dec!(108)))?;

    let portfolios = reports::load_portfolios(&conn, &["port:a".to_string()], false)?;
    let port = &portfolios[0];
    let t = &port.totals;

    // cash: 10000 + 25 - 1000 - 6 - 1200 + 1400
    assert_eq!(t.cash, dec!(9219));
    assert_eq!(t.realized, dec!(200));
    // IBM quoted; the call has no quote and stays at basis
    assert_eq!(t.open_value, dec!(1106));
    assert_eq!(t.total_value, dec!(10325));
    assert_eq!(port.missing_quotes, vec!["IBM240621C00150000".to_string()]);
    assert_eq!(port.closed.len(), 1);
    Ok(())
}

#[test]
fn test_failed_fetch_never_values_position_at_zero() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    seed(&conn)?;
    db::upsert_quote(&conn, &Quote::failed("IBM", "finviz", "404 Not Found"))?;

    let portfolios = reports::load_portfolios(&conn, &["port:a".to_string()], false)?;
    let t = &portfolios[0].totals;
    // Both open positions stay at basis: 1000 + 6
    assert_eq!(t.open_value, dec!(1006));
    assert_eq!(t.total_value, dec!(10225));
    assert!(portfolios[0].missing_quotes.contains(&"IBM".to_string()));

    // A later failure keeps the last good price
    db::upsert_quote(&conn, &quote("IBM", dec!(110), dec!(108)))?;
    db::upsert_quote(&conn, &Quote::failed("IBM", "finviz", "timeout"))?;
    let portfolios = reports::load_portfolios(&conn, &["port:a".to_string()], false)?;
    assert_eq!(portfolios[0].totals.open_value, dec!(1106));
    assert!(!portfolios[0].missing_quotes.contains(&"IBM".to_string()));
    Ok(())
}

#[test]
fn test_close_rejects_negative_price() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    seed(&conn)?;
    let ibm = db::list_transactions(
        &conn,
        &TransactionFilter {
            symbol: Some("IBM".to_string()),
            closed: Some(false),
            ..Default::default()
        },
    )?;
    let id = ibm[0].id.ok_or_else(|| anyhow!("stored row has an id"))?;

    assert!(db::close_transaction(&conn, id, dec!(-5), d(2024, 3, 1)).is_err());
    let stored = db::get_transaction(&conn, id)?.ok_or_else(|| anyhow!("row vanished"))?;
    assert!(!stored.closed);
    Ok(())
}

#[test]
fn test_totals_across_holiday() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    seed(&conn)?;
    db::upsert_quote(&conn, &quote("IBM", dec!(110), dec!(108)))?;
    db::insert_holiday(
        &conn,
        &MarketHoliday {
            date: d(2024, 7, 4),
            name: Some("Independence Day".to_string()),
        },
    )?;
    let names = vec!["port:a".to_string()];

    let first = reports::put_totals(&conn, &names, at(d(2024, 7, 3), 17, 0))?;
    assert_eq!(first[0].data_date, d(2024, 7, 3));
    assert!(first[0].day_gain.is_none());

    db::upsert_quote(&conn, &quote("IBM", dec!(120), dec!(110)))?;

    // The holiday itself reads as the previous close
    let holiday = reports::put_totals(&conn, &names, at(d(2024, 7, 4), 12, 0))?;
    assert_eq!(holiday[0].data_date, d(2024, 7, 3));
    assert_eq!(holiday[0].previous_date, d(2024, 7, 2));

    let next = reports::put_totals(&conn, &names, at(d(2024, 7, 5), 17, 0))?;
    assert_eq!(next[0].previous_date, d(2024, 7, 3));
    let gain = next[0].day_gain.ok_or_else(|| anyhow!("day gain against 7/3"))?;
    assert_eq!(gain.amount, dec!(0));

    let params = db::get_port_params(&conn)?;
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].total_value, dec!(10425));
    Ok(())
}

struct ScriptedPrices;

impl PriceHistory for ScriptedPrices {
    async fn daily_closes(&self, symbol: &str, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<DailyClose>> {
        match symbol {
            "IBM" => Ok(vec![
                DailyClose { date: d(2024, 1, 2), close: dec!(100) },
                DailyClose { date: d(2024, 1, 3), close: dec!(102) },
                DailyClose { date: d(2024, 1, 4), close: dec!(101) },
            ]),
            "MSFT" => Ok(vec![DailyClose { date: d(2024, 1, 3), close: dec!(300) }]),
            _ => Err(anyhow!("unknown symbol {}", symbol)),
        }
    }
}

#[tokio::test]
async fn test_history_rebuild_values_trading_days() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    seed(&conn)?;

    let summary = reports::history::rebuild(&conn, "port:a", &ScriptedPrices, d(2024, 1, 5)).await?;
    assert_eq!(summary.first_date, Some(d(2024, 1, 1)));
    assert_eq!(summary.last_date, Some(d(2024, 1, 5)));
    assert_eq!(summary.days_written, 5);
    assert!(summary.unpriced_symbols.is_empty());

    let history = db::list_port_history(&conn, "port:a")?;
    let jan4 = history
        .iter()
        .find(|s| s.date == d(2024, 1, 4))
        .ok_or_else(|| anyhow!("missing 2024-01-04"))?;
    // cash 10000 - 1000 - 6 - 1200; IBM 10 x 101, MSFT 4 x 300, call counts zero
    assert_eq!(jan4.cash, dec!(7794));
    assert_eq!(jan4.total, dec!(7794) + dec!(1010) + dec!(1200));
    // Friday carries Thursday's close forward
    let jan5 = history.last().ok_or_else(|| anyhow!("empty history"))?;
    assert_eq!(jan5.day_gain, Some(dec!(0)));
    Ok(())
}

#[test]
fn test_csv_export_and_import() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    seed(&conn)?;
    let all = db::list_transactions(&conn, &TransactionFilter::default())?;

    let mut buffer = Vec::new();
    let written = importers::export_transactions(&mut buffer, &all, ExportOrder::Open)?;
    assert_eq!(written, 5);

    let (other_dir, mut other) = create_test_db()?;
    let path = other_dir.path().join("tx.csv");
    std::fs::write(&path, &buffer)?;
    assert_eq!(importers::import_csv_file(&mut other, &path)?, 5);

    let copied = db::list_transactions(&other, &TransactionFilter::default())?;
    assert_eq!(copied.len(), 5);
    let call = copied
        .iter()
        .find(|t| t.descriptor == Descriptor::Call)
        .ok_or_else(|| anyhow!("call row lost"))?;
    assert_eq!(call.strike, Some(dec!(150)));
    assert_eq!(call.expiration, Some(d(2024, 6, 21)));

    assert!(importers::import_csv_file(&mut other, other_dir.path().join("tx.xlsx")).is_err());
    Ok(())
}

#[test]
fn test_cgi_request_renders_selected_port() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    seed(&conn)?;
    db::insert_transaction(
        &conn,
        &Transaction::cash("ira:main", Descriptor::Initial, dec!(500), d(2024, 1, 1)),
    )?;

    let pairs = reports::parse_query_string("ira=_ALL_&showsector=1&sort=Symb")?;
    let query = reports::handle_cgi_args(&pairs, &db::get_fileportnames(&conn)?);
    assert_eq!(query.fileportnames, vec!["ira:main".to_string()]);

    let portfolios = reports::load_portfolios(&conn, &query.fileportnames, query.combined)?;
    let page = reports::cgi_response(&reports::render_report(&portfolios, &query, &[], d(2024, 3, 1))?);
    assert!(page.starts_with("Content-type: text/html\n\n"));
    assert!(page.contains("ira:main"));
    assert!(page.contains("$500.00"));
    assert!(!page.contains("port:a"));
    Ok(())
}
