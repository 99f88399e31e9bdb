// Daily totals - value each portfolio, compare against the previous
// trading day's snapshot, and store the new figures.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::calendar;
use crate::db::{self, PortParam, PortSnapshot};
use crate::portfolio::{combine_positions, PortfolioTotals};

/// Gain against the prior snapshot; `None` when there is no prior snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayGain {
    pub amount: Decimal,
    pub percent: Option<Decimal>,
}

pub fn compute_day_gain(total: Decimal, previous: Option<&PortSnapshot>) -> Option<DayGain> {
    let prev = previous?;
    let amount = total - prev.total;
    let percent = if prev.total.is_zero() {
        None
    } else {
        Some(amount * Decimal::from(100) / prev.total)
    };
    Some(DayGain { amount, percent })
}

/// Result of one totals pass for a portfolio
#[derive(Debug, Clone, Serialize)]
pub struct TotalsRow {
    pub fileportname: String,
    pub data_date: NaiveDate,
    pub market_closed: bool,
    pub totals: PortfolioTotals,
    pub previous_date: NaiveDate,
    pub day_gain: Option<DayGain>,
    pub missing_quotes: Vec<String>,
}

/// Value every listed portfolio as of `now` and persist a snapshot per
/// portfolio into port_history and port_param.
pub fn put_totals(
    conn: &Connection,
    fileportnames: &[String],
    now: NaiveDateTime,
) -> Result<Vec<TotalsRow>> {
    let holidays = db::get_holiday_dates(conn)?;
    let (data_datetime, market_closed) = calendar::data_datetime(now, &holidays);
    let data_date = data_datetime.date();
    let previous_date = calendar::previous_trading_day(data_date, &holidays);

    info!(
        "Totals for {} portfolios, data date {} (previous {}){}",
        fileportnames.len(),
        data_date,
        previous_date,
        if market_closed { ", market closed" } else { "" }
    );

    let quotes = db::get_all_quotes(conn)?;
    let mut rows = Vec::with_capacity(fileportnames.len());

    for fpn in fileportnames {
        let transactions = db::get_portfolio_transactions(conn, fpn)?;
        let combined = combine_positions(fpn, &transactions, &quotes);
        let totals = combined.totals.clone();

        let previous = db::get_port_snapshot(conn, fpn, previous_date)?;
        let day_gain = compute_day_gain(totals.total_value, previous.as_ref());
        debug!("{}: total={} day_gain={:?}", fpn, totals.total_value, day_gain);

        db::upsert_port_snapshot(
            conn,
            &PortSnapshot {
                fileportname: fpn.clone(),
                date: data_date,
                total: totals.total_value,
                cash: totals.cash,
                open_value: totals.open_value,
                day_gain: day_gain.map(|g| g.amount),
            },
        )
        .with_context(|| format!("Failed to store history for {}", fpn))?;

        db::upsert_port_param(
            conn,
            &PortParam {
                fileportname: fpn.clone(),
                cash: totals.cash,
                open_value: totals.open_value,
                total_value: totals.total_value,
                realized: totals.realized,
                day_gain: day_gain.map(|g| g.amount),
                day_gain_pct: day_gain.and_then(|g| g.percent),
                updated_at: None,
            },
        )
        .with_context(|| format!("Failed to store params for {}", fpn))?;

        rows.push(TotalsRow {
            fileportname: fpn.clone(),
            data_date,
            market_closed,
            totals,
            previous_date,
            day_gain,
            missing_quotes: combined.missing_quotes,
        });
    }

    Ok(rows)
}
