//! Position aggregation and valuation
//!
//! Turns a portfolio's transaction list into combined positions (longs,
//! shorts, options), a cash position and closed positions, then values
//! them against cached quotes.
//!
//! Cash convention: `cash = deposits - open basis + realized`, so
//! `total_value = cash + open_value = deposits + realized + unrealized`.

pub mod position;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::db::{PositionKind, PositionTrait, Quote, Transaction};
pub use position::{CashPosition, ClosedPosition, Position};

/// Which table an open position belongs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionGroup {
    Longs,
    Shorts,
    Options,
}

impl PositionGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionGroup::Longs => "longs",
            PositionGroup::Shorts => "shorts",
            PositionGroup::Options => "options",
        }
    }

    fn of(tx: &Transaction) -> Self {
        if tx.is_option() {
            PositionGroup::Options
        } else if tx.shares < Decimal::ZERO {
            PositionGroup::Shorts
        } else {
            PositionGroup::Longs
        }
    }
}

/// Portfolio-level figures
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioTotals {
    pub cash: Decimal,
    pub open_value: Decimal,
    pub open_basis: Decimal,
    pub total_value: Decimal,
    pub deposits: Decimal,
    pub realized: Decimal,
    pub unrealized: Decimal,
    pub day_change: Decimal,
}

/// All valued positions of one portfolio
#[derive(Debug, Clone)]
pub struct CombinedPortfolio {
    pub fileportname: String,
    pub longs: BTreeMap<PositionTrait, Position>,
    pub shorts: BTreeMap<PositionTrait, Position>,
    pub options: BTreeMap<PositionTrait, Position>,
    pub cash: CashPosition,
    pub closed: BTreeMap<String, ClosedPosition>,
    pub totals: PortfolioTotals,
    /// Display symbols valued at basis for lack of a quote
    pub missing_quotes: Vec<String>,
    quotes: HashMap<String, Quote>,
}

/// Combine a portfolio's transactions and value them.
///
/// `quotes` is keyed by display symbol (OCC symbol for options). A
/// position without a quote is valued at its basis and listed in
/// `missing_quotes`.
pub fn combine_positions(
    fileportname: &str,
    transactions: &[Transaction],
    quotes: &HashMap<String, Quote>,
) -> CombinedPortfolio {
    let mut longs: BTreeMap<PositionTrait, Position> = BTreeMap::new();
    let mut shorts: BTreeMap<PositionTrait, Position> = BTreeMap::new();
    let mut options: BTreeMap<PositionTrait, Position> = BTreeMap::new();
    let mut cash = CashPosition::default();
    let mut closed: BTreeMap<String, ClosedPosition> = BTreeMap::new();

    let mut totals = PortfolioTotals::default();

    for tx in transactions {
        match (tx.position, tx.closed) {
            (PositionKind::Long, false) => {
                let group = match PositionGroup::of(tx) {
                    PositionGroup::Longs => &mut longs,
                    PositionGroup::Shorts => &mut shorts,
                    PositionGroup::Options => &mut options,
                };
                let key = tx.trait_key();
                group
                    .entry(key.clone())
                    .or_insert_with(|| Position::new(key))
                    .add_transaction(tx);
                totals.open_basis += tx.shares * tx.open_price;
            }
            (PositionKind::Long, true) => {
                let gain = tx.realized_gain();
                totals.realized += gain;
                closed
                    .entry(tx.symbol.clone())
                    .or_insert_with(|| ClosedPosition::new(&tx.symbol))
                    .add_transaction(tx);
            }
            (PositionKind::Cash, _) => {
                totals.deposits += tx.open_price;
                cash.add_transaction(tx);
            }
        }
    }

    let mut missing_quotes = Vec::new();
    let mut relevant_quotes = HashMap::new();

    for position in longs.values().chain(shorts.values()).chain(options.values()) {
        match quotes.get(&position.symbol).filter(|q| q.has_price()) {
            Some(quote) => {
                totals.open_value += position.shares * quote.last;
                totals.day_change += position.shares * quote.net;
                relevant_quotes.insert(position.symbol.clone(), quote.clone());
            }
            None => {
                warn!(
                    "{}: no quote for {}, valuing at basis",
                    fileportname, position.symbol
                );
                totals.open_value += position.basis;
                missing_quotes.push(position.symbol.clone());
            }
        }
    }

    totals.cash = totals.deposits - totals.open_basis + totals.realized;
    totals.total_value = totals.cash + totals.open_value;
    totals.unrealized = totals.open_value - totals.open_basis;

    debug!(
        "{}: cash={} open_value={} total={}",
        fileportname, totals.cash, totals.open_value, totals.total_value
    );

    CombinedPortfolio {
        fileportname: fileportname.to_string(),
        longs,
        shorts,
        options,
        cash,
        closed,
        totals,
        missing_quotes,
        quotes: relevant_quotes,
    }
}

/// One row of the position report; `None` renders blank
#[derive(Debug, Clone, Serialize)]
pub struct ReportLine {
    pub group: Option<PositionGroup>, // None for the CASH row
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub shares: Decimal,
    pub purch: Decimal,
    pub last: Option<Decimal>,
    pub chg: Option<Decimal>,
    pub day_pct: Option<Decimal>,
    pub day: Decimal,
    pub mkt_val: Decimal,
    pub gain_pct: Decimal,
    pub gain: Decimal,
    pub basis: Decimal,
    pub port_pct: Decimal,
    pub low: Option<Decimal>,
    pub hl_pct: Option<Decimal>,
    pub high: Option<Decimal>,
    pub days: Option<i64>,
    pub pur_date: Option<NaiveDate>,
    pub pe: Option<Decimal>,
    pub vol: Option<i64>,
    pub mk_cap: Option<i64>,
    pub low52: Option<Decimal>,
    pub hl52_pct: Option<Decimal>,
    pub high52: Option<Decimal>,
    pub cagr: Option<f64>,
    pub div: Option<Decimal>,
    pub yld: Option<Decimal>,
    pub ex_div: Option<NaiveDate>,
    pub quoted: bool,
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part * Decimal::from(100) / whole
    }
}

/// Position of `last` inside a low/high range, in percent
fn range_pct(last: Decimal, low: Option<Decimal>, high: Option<Decimal>) -> Option<Decimal> {
    match (low, high) {
        (Some(low), Some(high)) if high != low => Some((last - low) * Decimal::from(100) / (high - low)),
        _ => None,
    }
}

/// Compound annual growth rate in percent
pub fn cagr(mkt_val: Decimal, basis: Decimal, days: i64) -> Option<f64> {
    if days <= 0 || mkt_val <= Decimal::ZERO || basis <= Decimal::ZERO {
        return None;
    }
    let ratio = (mkt_val / basis).to_f64()?;
    let rate = (ratio.powf(365.0 / days as f64) - 1.0) * 100.0;
    rate.is_finite().then_some(rate)
}

impl CombinedPortfolio {
    pub fn positions(&self) -> impl Iterator<Item = (PositionGroup, &Position)> {
        self.longs
            .values()
            .map(|p| (PositionGroup::Longs, p))
            .chain(self.shorts.values().map(|p| (PositionGroup::Shorts, p)))
            .chain(self.options.values().map(|p| (PositionGroup::Options, p)))
    }

    pub fn is_empty(&self) -> bool {
        self.longs.is_empty()
            && self.shorts.is_empty()
            && self.options.is_empty()
            && self.cash.transactions.is_empty()
            && self.closed.is_empty()
    }

    pub fn quote_for(&self, symbol: &str) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    fn position_line(&self, group: PositionGroup, position: &Position, as_of: NaiveDate) -> ReportLine {
        let quote = self.quotes.get(&position.symbol);
        let total = self.totals.total_value;

        let mkt_val = match quote {
            Some(q) => position.shares * q.last,
            None => position.basis,
        };
        let gain = mkt_val - position.basis;
        let days = position.open_date.map(|date| (as_of - date).num_days());

        ReportLine {
            group: Some(group),
            symbol: position.symbol.clone(),
            name: quote.and_then(|q| q.name.clone()),
            sector: position.sector.clone(),
            shares: position.shares,
            purch: position.open_price,
            last: quote.map(|q| q.last),
            chg: quote.map(|q| q.net),
            day_pct: quote.map(|q| q.p_change),
            day: quote.map(|q| position.shares * q.net).unwrap_or(Decimal::ZERO),
            mkt_val,
            gain_pct: percent_of(gain, position.basis.abs()),
            gain,
            basis: position.basis,
            port_pct: percent_of(mkt_val, total),
            low: quote.and_then(|q| q.low),
            hl_pct: quote.and_then(|q| range_pct(q.last, q.low, q.high)),
            high: quote.and_then(|q| q.high),
            days,
            pur_date: position.open_date,
            pe: quote.and_then(|q| q.pe),
            vol: quote.and_then(|q| q.volume),
            mk_cap: quote.and_then(|q| q.cap),
            low52: quote.and_then(|q| q.low52),
            hl52_pct: quote.and_then(|q| range_pct(q.last, q.low52, q.high52)),
            high52: quote.and_then(|q| q.high52),
            cagr: days.and_then(|days| cagr(mkt_val, position.basis, days)),
            div: quote.and_then(|q| q.dividend),
            yld: quote.and_then(|q| q.div_yield),
            ex_div: quote.and_then(|q| q.ex_div),
            quoted: quote.is_some(),
        }
    }

    /// The CASH row: cash balance at price 1
    pub fn cash_line(&self) -> ReportLine {
        let cash = self.totals.cash;
        ReportLine {
            group: None,
            symbol: "CASH".to_string(),
            name: None,
            sector: None,
            shares: cash,
            purch: Decimal::ONE,
            last: Some(Decimal::ONE),
            chg: Some(Decimal::ZERO),
            day_pct: Some(Decimal::ZERO),
            day: Decimal::ZERO,
            mkt_val: cash,
            gain_pct: Decimal::ZERO,
            gain: Decimal::ZERO,
            basis: cash,
            port_pct: percent_of(cash, self.totals.total_value),
            low: None,
            hl_pct: None,
            high: None,
            days: None,
            pur_date: self.cash.open_date,
            pe: None,
            vol: None,
            mk_cap: None,
            low52: None,
            hl52_pct: None,
            high52: None,
            cagr: None,
            div: None,
            yld: None,
            ex_div: None,
            quoted: true,
        }
    }

    /// Report lines for every open position, longs then shorts then options
    pub fn report_lines(&self, as_of: NaiveDate) -> Vec<ReportLine> {
        self.positions()
            .map(|(group, position)| self.position_line(group, position, as_of))
            .collect()
    }

    pub fn lines_for(&self, group: PositionGroup, as_of: NaiveDate) -> Vec<ReportLine> {
        self.positions()
            .filter(|(g, _)| *g == group)
            .map(|(g, position)| self.position_line(g, position, as_of))
            .collect()
    }
}
