// Database module - SQLite connection and table access

pub mod models;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::PortfolioError;
pub use models::{
    option_symbol, Descriptor, FilePortName, MarketHoliday, PortParam, PortSnapshot,
    PositionKind, PositionTrait, Quote, Transaction,
};

/// Get the default database path (~/.trackport/track_port.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let trackport_dir = PathBuf::from(home).join(".trackport");

    std::fs::create_dir_all(&trackport_dir).context("Failed to create .trackport directory")?;

    Ok(trackport_dir.join("track_port.db"))
}

fn resolve_db_path(db_path: Option<PathBuf>) -> Result<PathBuf> {
    match db_path {
        Some(path) => Ok(path),
        None => match std::env::var_os("TRACKPORT_DB") {
            Some(path) => Ok(PathBuf::from(path)),
            None => get_default_db_path(),
        },
    }
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = resolve_db_path(db_path)?;
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;
    Ok(conn)
}

/// Initialize the database with schema
///
/// Safe to call on every start: all statements are `IF NOT EXISTS`.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = resolve_db_path(db_path)?;

    debug!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    conn.execute_batch(include_str!("schema.sql"))
        .context("Failed to execute schema")?;

    Ok(())
}

/// Open the database and make sure the schema exists
pub fn open_initialized(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = resolve_db_path(db_path)?;
    init_database(Some(path.clone()))?;
    open_db(Some(path))
}

// ============ Decimal helpers ============

/// Helper to read Decimal from SQLite (handles INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Decimal::from_str(s.trim())
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => {
            Decimal::try_from(f).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Null,
        )),
    }
}

/// Helper to read optional Decimal from SQLite
pub fn get_optional_decimal_value(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<Decimal>, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        _ => get_decimal_value(row, idx).map(Some),
    }
}

fn parse_column<T: FromStr>(row: &rusqlite::Row, idx: usize) -> Result<T, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(PortfolioError::ParseError(format!(
                "unexpected value '{}'",
                raw
            ))),
        )
    })
}

fn opt_decimal_text(value: &Option<Decimal>) -> Option<String> {
    value.as_ref().map(|d| d.to_string())
}

// ============ transaction_list ============

const TRANSACTION_COLUMNS: &str = "id, fileportname, symbol, sector, position, descriptor, shares,
     open_price, open_date, closed, close_price, close_date, expiration, strike";

fn transaction_from_row(row: &rusqlite::Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: Some(row.get(0)?),
        fileportname: row.get(1)?,
        symbol: row.get(2)?,
        sector: row.get(3)?,
        position: parse_column::<PositionKind>(row, 4)?,
        descriptor: parse_column::<Descriptor>(row, 5)?,
        shares: get_decimal_value(row, 6)?,
        open_price: get_decimal_value(row, 7)?,
        open_date: row.get(8)?,
        closed: row.get(9)?,
        close_price: get_optional_decimal_value(row, 10)?,
        close_date: row.get(11)?,
        expiration: row.get(12)?,
        strike: get_optional_decimal_value(row, 13)?,
    })
}

/// Insert a validated transaction, returns its id
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<i64> {
    tx.validate()?;

    conn.execute(
        "INSERT INTO transaction_list (
            fileportname, symbol, sector, position, descriptor, shares, open_price,
            open_date, closed, close_price, close_date, expiration, strike
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            tx.fileportname,
            tx.symbol,
            tx.sector,
            tx.position.as_str(),
            tx.descriptor.as_str(),
            tx.shares.to_string(),
            tx.open_price.to_string(),
            tx.open_date,
            tx.closed,
            opt_decimal_text(&tx.close_price),
            tx.close_date,
            tx.expiration,
            opt_decimal_text(&tx.strike),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Get a single transaction by id
pub fn get_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let sql = format!(
        "SELECT {} FROM transaction_list WHERE id = ?1",
        TRANSACTION_COLUMNS
    );
    let tx = conn
        .query_row(&sql, [id], transaction_from_row)
        .optional()?;
    Ok(tx)
}

/// Mark a transaction closed at the given price and date
pub fn close_transaction(
    conn: &Connection,
    id: i64,
    close_price: Decimal,
    close_date: NaiveDate,
) -> Result<Transaction> {
    let tx = get_transaction(conn, id)?
        .ok_or_else(|| PortfolioError::ValidationError(format!("no transaction with id {}", id)))?;

    if tx.closed {
        return Err(PortfolioError::ValidationError(format!(
            "transaction {} ({}) is already closed",
            id, tx.symbol
        ))
        .into());
    }
    if tx.position == PositionKind::Cash {
        return Err(PortfolioError::ValidationError(format!(
            "transaction {} is a cash row and cannot be closed",
            id
        ))
        .into());
    }

    let closed = tx.closed_at(close_price, close_date);
    closed.validate()?;

    conn.execute(
        "UPDATE transaction_list SET closed = 1, close_price = ?1, close_date = ?2 WHERE id = ?3",
        params![close_price.to_string(), close_date, id],
    )?;

    info!("Closed transaction {} ({}) at {}", id, closed.symbol, close_price);
    Ok(closed)
}

/// Delete a transaction; returns whether a row was removed
pub fn delete_transaction(conn: &Connection, id: i64) -> Result<bool> {
    let removed = conn.execute("DELETE FROM transaction_list WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

/// Filter for transaction listings
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub fileportname: Option<String>,
    pub closed: Option<bool>,
    pub position: Option<PositionKind>,
    pub symbol: Option<String>,
}

/// List transactions matching the filter, ordered by open date
pub fn list_transactions(conn: &Connection, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
    let mut sql = format!(
        "SELECT {} FROM transaction_list WHERE 1=1",
        TRANSACTION_COLUMNS
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(fpn) = &filter.fileportname {
        sql.push_str(" AND fileportname = ?");
        params.push(Box::new(fpn.clone()));
    }
    if let Some(closed) = filter.closed {
        sql.push_str(" AND closed = ?");
        params.push(Box::new(closed));
    }
    if let Some(position) = filter.position {
        sql.push_str(" AND position = ?");
        params.push(Box::new(position.as_str()));
    }
    if let Some(symbol) = &filter.symbol {
        sql.push_str(" AND symbol = ?");
        params.push(Box::new(symbol.to_uppercase()));
    }

    sql.push_str(" ORDER BY open_date ASC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let transactions = stmt
        .query_map(param_refs.as_slice(), transaction_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// All transactions of one portfolio, in open order
pub fn get_portfolio_transactions(conn: &Connection, fileportname: &str) -> Result<Vec<Transaction>> {
    list_transactions(
        conn,
        &TransactionFilter {
            fileportname: Some(fileportname.to_string()),
            ..Default::default()
        },
    )
}

/// Distinct portfolio names present in the transaction list
pub fn get_fileportnames(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT fileportname FROM transaction_list")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(names)
}

/// Open (not closed) long rows, optionally limited to some portfolios
pub fn get_open_longs(conn: &Connection, fileportnames: &[String]) -> Result<Vec<Transaction>> {
    let open = list_transactions(
        conn,
        &TransactionFilter {
            closed: Some(false),
            position: Some(PositionKind::Long),
            ..Default::default()
        },
    )?;

    Ok(open
        .into_iter()
        .filter(|tx| fileportnames.is_empty() || fileportnames.contains(&tx.fileportname))
        .collect())
}

// ============ finance_quote ============

const QUOTE_COLUMNS: &str = "symbol, name, last, close, open, high, low, low52, high52, net,
     p_change, volume, avg_vol, bid, ask, eps, pe, cap, dividend, div_yield, ex_div,
     quote_date, method, success, errormsg, updated_at";

fn quote_from_row(row: &rusqlite::Row) -> Result<Quote, rusqlite::Error> {
    Ok(Quote {
        symbol: row.get(0)?,
        name: row.get(1)?,
        last: get_decimal_value(row, 2)?,
        close: get_optional_decimal_value(row, 3)?,
        open: get_optional_decimal_value(row, 4)?,
        high: get_optional_decimal_value(row, 5)?,
        low: get_optional_decimal_value(row, 6)?,
        low52: get_optional_decimal_value(row, 7)?,
        high52: get_optional_decimal_value(row, 8)?,
        net: get_decimal_value(row, 9)?,
        p_change: get_decimal_value(row, 10)?,
        volume: row.get(11)?,
        avg_vol: row.get(12)?,
        bid: get_optional_decimal_value(row, 13)?,
        ask: get_optional_decimal_value(row, 14)?,
        eps: get_optional_decimal_value(row, 15)?,
        pe: get_optional_decimal_value(row, 16)?,
        cap: row.get(17)?,
        dividend: get_optional_decimal_value(row, 18)?,
        div_yield: get_optional_decimal_value(row, 19)?,
        ex_div: row.get(20)?,
        quote_date: row.get(21)?,
        method: row.get(22)?,
        success: row.get(23)?,
        errormsg: row.get(24)?,
        updated_at: row.get(25)?,
    })
}

/// Insert or replace a quote
///
/// A failed fetch never overwrites the last good price: only the status
/// columns are updated.
pub fn upsert_quote(conn: &Connection, quote: &Quote) -> Result<()> {
    let now = Utc::now();

    if !quote.success {
        let updated = conn.execute(
            "UPDATE finance_quote SET success = 0, errormsg = ?1, method = ?2, updated_at = ?3
             WHERE symbol = ?4",
            params![quote.errormsg, quote.method, now, quote.symbol],
        )?;
        if updated > 0 {
            return Ok(());
        }
    }

    conn.execute(
        "INSERT OR REPLACE INTO finance_quote (
            symbol, name, last, close, open, high, low, low52, high52, net, p_change,
            volume, avg_vol, bid, ask, eps, pe, cap, dividend, div_yield, ex_div,
            quote_date, method, success, errormsg, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                  ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
        params![
            quote.symbol,
            quote.name,
            quote.last.to_string(),
            opt_decimal_text(&quote.close),
            opt_decimal_text(&quote.open),
            opt_decimal_text(&quote.high),
            opt_decimal_text(&quote.low),
            opt_decimal_text(&quote.low52),
            opt_decimal_text(&quote.high52),
            quote.net.to_string(),
            quote.p_change.to_string(),
            quote.volume,
            quote.avg_vol,
            opt_decimal_text(&quote.bid),
            opt_decimal_text(&quote.ask),
            opt_decimal_text(&quote.eps),
            opt_decimal_text(&quote.pe),
            quote.cap,
            opt_decimal_text(&quote.dividend),
            opt_decimal_text(&quote.div_yield),
            quote.ex_div,
            quote.quote_date,
            quote.method,
            quote.success,
            quote.errormsg,
            now,
        ],
    )?;

    Ok(())
}

/// Get the cached quote for a symbol
pub fn get_quote(conn: &Connection, symbol: &str) -> Result<Option<Quote>> {
    let sql = format!("SELECT {} FROM finance_quote WHERE symbol = ?1", QUOTE_COLUMNS);
    let quote = conn
        .query_row(&sql, [symbol.to_uppercase()], quote_from_row)
        .optional()?;
    Ok(quote)
}

/// All cached quotes keyed by symbol
pub fn get_all_quotes(conn: &Connection) -> Result<HashMap<String, Quote>> {
    let sql = format!("SELECT {} FROM finance_quote", QUOTE_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let quotes = stmt
        .query_map([], quote_from_row)?
        .map(|q| q.map(|q| (q.symbol.clone(), q)))
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(quotes)
}

// ============ port_history ============

/// Insert or replace the snapshot for (fileportname, date)
pub fn upsert_port_snapshot(conn: &Connection, snapshot: &PortSnapshot) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO port_history (fileportname, date, total, cash, open_value, day_gain)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            snapshot.fileportname,
            snapshot.date,
            snapshot.total.to_string(),
            snapshot.cash.to_string(),
            snapshot.open_value.to_string(),
            opt_decimal_text(&snapshot.day_gain),
        ],
    )?;
    Ok(())
}

fn snapshot_from_row(row: &rusqlite::Row) -> Result<PortSnapshot, rusqlite::Error> {
    Ok(PortSnapshot {
        fileportname: row.get(0)?,
        date: row.get(1)?,
        total: get_decimal_value(row, 2)?,
        cash: get_decimal_value(row, 3)?,
        open_value: get_decimal_value(row, 4)?,
        day_gain: get_optional_decimal_value(row, 5)?,
    })
}

/// Snapshot of a portfolio on an exact date
pub fn get_port_snapshot(
    conn: &Connection,
    fileportname: &str,
    date: NaiveDate,
) -> Result<Option<PortSnapshot>> {
    let snapshot = conn
        .query_row(
            "SELECT fileportname, date, total, cash, open_value, day_gain
             FROM port_history WHERE fileportname = ?1 AND date = ?2",
            params![fileportname, date],
            snapshot_from_row,
        )
        .optional()?;
    Ok(snapshot)
}

/// Full history of a portfolio, oldest first
pub fn list_port_history(conn: &Connection, fileportname: &str) -> Result<Vec<PortSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT fileportname, date, total, cash, open_value, day_gain
         FROM port_history WHERE fileportname = ?1 ORDER BY date ASC",
    )?;
    let rows = stmt
        .query_map([fileportname], snapshot_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Portfolios that have at least one history row
pub fn get_history_fileportnames(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT fileportname FROM port_history")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(names)
}

// ============ port_param ============

pub fn upsert_port_param(conn: &Connection, param: &PortParam) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO port_param (
            fileportname, cash, open_value, total_value, realized, day_gain, day_gain_pct, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            param.fileportname,
            param.cash.to_string(),
            param.open_value.to_string(),
            param.total_value.to_string(),
            param.realized.to_string(),
            opt_decimal_text(&param.day_gain),
            opt_decimal_text(&param.day_gain_pct),
            Utc::now(),
        ],
    )?;
    Ok(())
}

pub fn get_port_params(conn: &Connection) -> Result<Vec<PortParam>> {
    let mut stmt = conn.prepare(
        "SELECT fileportname, cash, open_value, total_value, realized, day_gain, day_gain_pct, updated_at
         FROM port_param ORDER BY fileportname",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PortParam {
                fileportname: row.get(0)?,
                cash: get_decimal_value(row, 1)?,
                open_value: get_decimal_value(row, 2)?,
                total_value: get_decimal_value(row, 3)?,
                realized: get_decimal_value(row, 4)?,
                day_gain: get_optional_decimal_value(row, 5)?,
                day_gain_pct: get_optional_decimal_value(row, 6)?,
                updated_at: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ market_holiday ============

pub fn insert_holiday(conn: &Connection, holiday: &MarketHoliday) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO market_holiday (date, name) VALUES (?1, ?2)",
        params![holiday.date, holiday.name],
    )?;
    Ok(())
}

pub fn delete_holiday(conn: &Connection, date: NaiveDate) -> Result<bool> {
    let removed = conn.execute("DELETE FROM market_holiday WHERE date = ?1", [date])?;
    Ok(removed > 0)
}

pub fn list_holidays(conn: &Connection) -> Result<Vec<MarketHoliday>> {
    let mut stmt = conn.prepare("SELECT date, name FROM market_holiday ORDER BY date")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MarketHoliday {
                date: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Holiday dates only, for calendar walks
pub fn get_holiday_dates(conn: &Connection) -> Result<BTreeSet<NaiveDate>> {
    Ok(list_holidays(conn)?.into_iter().map(|h| h.date).collect())
}

// ============ ticker_symbols ============

pub fn add_ticker_symbol(conn: &Connection, symbol: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO ticker_symbols (symbol) VALUES (?1)",
        [symbol.to_uppercase()],
    )?;
    Ok(())
}

pub fn remove_ticker_symbol(conn: &Connection, symbol: &str) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM ticker_symbols WHERE symbol = ?1",
        [symbol.to_uppercase()],
    )?;
    Ok(removed > 0)
}

pub fn list_ticker_symbols(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT symbol FROM ticker_symbols")?;
    let symbols = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(symbols)
}
