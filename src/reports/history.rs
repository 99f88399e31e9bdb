//! Portfolio history rebuild
//!
//! Replays a portfolio's transaction list day by day (cash balance and open
//! positions per calendar day), prices the stock positions with historical
//! daily closes and rewrites `port_history` for every trading day.

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::calendar;
use crate::db::{self, Descriptor, PortSnapshot, PositionKind, PositionTrait, Transaction};
use crate::quotes::yahoo::DailyClose;
use crate::quotes::YahooSource;

/// Source of historical daily closes
#[allow(async_fn_in_trait)]
pub trait PriceHistory {
    async fn daily_closes(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyClose>>;
}

impl PriceHistory for YahooSource {
    async fn daily_closes(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyClose>> {
        self.fetch_daily_closes(symbol, from, to).await
    }
}

/// Cash balance at the end of every calendar day.
///
/// Starts from the `initial` cash row, then applies intermediate cash rows,
/// `-shares x open_price` on open dates and `+shares x close_price` on close
/// dates. The map begins the day before the first change and runs through
/// `until`.
pub fn cash_by_date(transactions: &[Transaction], until: NaiveDate) -> BTreeMap<NaiveDate, Decimal> {
    let mut initial = Decimal::ZERO;
    let mut changes: Vec<(NaiveDate, Decimal)> = Vec::new();

    for tx in transactions {
        match (tx.position, tx.descriptor) {
            (PositionKind::Cash, Descriptor::Initial) => initial += tx.open_price,
            (PositionKind::Cash, _) => changes.push((tx.open_date, tx.open_price)),
            (PositionKind::Long, _) => {
                changes.push((tx.open_date, -(tx.shares * tx.open_price)));
                if let (true, Some(price), Some(date)) = (tx.closed, tx.close_price, tx.close_date) {
                    changes.push((date, tx.shares * price));
                }
            }
        }
    }
    changes.sort_by_key(|(date, _)| *date);

    let first = changes.first().map(|(date, _)| *date).or_else(|| {
        transactions
            .iter()
            .filter(|t| t.descriptor == Descriptor::Initial)
            .map(|t| t.open_date)
            .min()
    });
    let Some(first) = first else {
        return BTreeMap::new();
    };

    let mut by_date = BTreeMap::new();
    let mut balance = initial;
    let mut current = first - Duration::days(1);
    by_date.insert(current, balance);

    for (date, change) in changes {
        while current < date {
            current += Duration::days(1);
            by_date.insert(current, balance);
        }
        balance += change;
        by_date.insert(date, balance);
    }
    while current < until {
        current += Duration::days(1);
        by_date.insert(current, balance);
    }

    debug!("cash by date: {} days, final {}", by_date.len(), balance);
    by_date
}

pub type Holdings = BTreeMap<PositionTrait, Decimal>;

/// Open holdings at the end of every calendar day from the first open
/// through `until`. A trait whose shares reach zero drops out.
pub fn positions_by_date(transactions: &[Transaction], until: NaiveDate) -> BTreeMap<NaiveDate, Holdings> {
    let mut halves: Vec<(NaiveDate, PositionTrait, Decimal)> = Vec::new();
    for tx in transactions.iter().filter(|t| t.position == PositionKind::Long) {
        halves.push((tx.open_date, tx.trait_key(), tx.shares));
        if let (true, Some(date)) = (tx.closed, tx.close_date) {
            halves.push((date, tx.trait_key(), -tx.shares));
        }
    }
    halves.sort_by(|a, b| a.0.cmp(&b.0));

    let mut by_date = BTreeMap::new();
    let Some(mut current) = halves.first().map(|h| h.0) else {
        return by_date;
    };
    let mut holdings = Holdings::new();

    for (date, key, shares) in halves {
        while current < date {
            by_date.insert(current, holdings.clone());
            current += Duration::days(1);
        }
        let entry = holdings.entry(key.clone()).or_insert(Decimal::ZERO);
        *entry += shares;
        if entry.is_zero() {
            holdings.remove(&key);
        }
        by_date.insert(current, holdings.clone());
    }
    while current < until {
        current += Duration::days(1);
        by_date.insert(current, holdings.clone());
    }

    by_date
}

/// Dates and prices bounding a stock symbol's holding period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolRange {
    pub start: NaiveDate,
    pub start_price: Decimal,
    pub end: Option<NaiveDate>,
    pub end_price: Option<Decimal>,
}

/// Earliest open and latest close per stock symbol
pub fn symbol_ranges(transactions: &[Transaction]) -> BTreeMap<String, SymbolRange> {
    let mut ranges: BTreeMap<String, SymbolRange> = BTreeMap::new();

    for tx in transactions
        .iter()
        .filter(|t| t.position == PositionKind::Long && !t.is_option())
    {
        let range = ranges.entry(tx.symbol.clone()).or_insert_with(|| SymbolRange {
            start: tx.open_date,
            start_price: tx.open_price,
            end: None,
            end_price: None,
        });
        if tx.open_date < range.start {
            range.start = tx.open_date;
            range.start_price = tx.open_price;
        }
        if let (true, Some(date), Some(price)) = (tx.closed, tx.close_date, tx.close_price) {
            if range.end.map_or(true, |end| end < date) {
                range.end = Some(date);
                range.end_price = Some(price);
            }
        }
    }

    ranges
}

/// Outcome of a rebuild
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildSummary {
    pub fileportname: String,
    pub days_written: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub unpriced_symbols: Vec<String>,
}

/// Close on or before `date`, falling back to the purchase price
fn price_on(prices: Option<&BTreeMap<NaiveDate, Decimal>>, date: NaiveDate, fallback: Decimal) -> Decimal {
    prices
        .and_then(|p| p.range(..=date).next_back())
        .map(|(_, close)| *close)
        .unwrap_or(fallback)
}

/// Recompute `port_history` for one portfolio from its transactions.
///
/// Each trading day is valued as `cash + sum(shares x close)`. The last
/// known close carries forward over gaps; option traits count as zero.
pub async fn rebuild<P: PriceHistory>(
    conn: &Connection,
    fileportname: &str,
    source: &P,
    until: NaiveDate,
) -> Result<RebuildSummary> {
    let transactions = db::get_portfolio_transactions(conn, fileportname)?;
    let holidays = db::get_holiday_dates(conn)?;

    let cash = cash_by_date(&transactions, until);
    let positions = positions_by_date(&transactions, until);
    let ranges = symbol_ranges(&transactions);

    info!(
        "Rebuilding {}: {} transactions, {} symbols",
        fileportname,
        transactions.len(),
        ranges.len()
    );

    let mut prices: BTreeMap<String, BTreeMap<NaiveDate, Decimal>> = BTreeMap::new();
    let mut summary = RebuildSummary {
        fileportname: fileportname.to_string(),
        ..Default::default()
    };

    for (symbol, range) in &ranges {
        let end = range.end.unwrap_or(until).min(until);
        match source.daily_closes(symbol, range.start, end).await {
            Ok(closes) if !closes.is_empty() => {
                prices.insert(
                    symbol.clone(),
                    closes.into_iter().map(|c| (c.date, c.close)).collect(),
                );
            }
            Ok(_) => {
                warn!("{}: no daily closes for {}, using purchase price", fileportname, symbol);
                summary.unpriced_symbols.push(symbol.clone());
            }
            Err(e) => {
                warn!("{}: price history failed for {}: {:#}, using purchase price", fileportname, symbol, e);
                summary.unpriced_symbols.push(symbol.clone());
            }
        }
    }

    let days: BTreeSet<NaiveDate> = cash
        .keys()
        .chain(positions.keys())
        .copied()
        .filter(|d| *d <= until && calendar::is_trading_day(*d, &holidays))
        .collect();

    let empty = Holdings::new();
    let mut previous_total: Option<Decimal> = None;

    let db_tx = conn.unchecked_transaction()?;
    for day in days {
        let balance = cash
            .range(..=day)
            .next_back()
            .map(|(_, c)| *c)
            .unwrap_or(Decimal::ZERO);
        let holdings = positions
            .range(..=day)
            .next_back()
            .map(|(_, h)| h)
            .unwrap_or(&empty);

        let open_value: Decimal = holdings
            .iter()
            .filter(|(key, _)| !key.descriptor.is_option())
            .map(|(key, shares)| {
                let fallback = ranges
                    .get(&key.symbol)
                    .map(|r| r.start_price)
                    .unwrap_or(Decimal::ZERO);
                *shares * price_on(prices.get(&key.symbol), day, fallback)
            })
            .sum();

        let total = balance + open_value;
        db::upsert_port_snapshot(
            &db_tx,
            &PortSnapshot {
                fileportname: fileportname.to_string(),
                date: day,
                total,
                cash: balance,
                open_value,
                day_gain: previous_total.map(|prev| total - prev),
            },
        )?;
        previous_total = Some(total);

        summary.first_date.get_or_insert(day);
        summary.last_date = Some(day);
        summary.days_written += 1;
    }
    db_tx.commit()?;

    info!(
        "{}: wrote {} history rows ({} unpriced symbols)",
        fileportname,
        summary.days_written,
        summary.unpriced_symbols.len()
    );
    Ok(summary)
}
