// Quotes module - provider clients and the refresh pass over finance_quote

pub mod finviz;
pub mod yahoo;

use anyhow::{Context, Result};
use reqwest::Client;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{self, Quote};

pub use finviz::FinvizSource;
pub use yahoo::YahooSource;

/// A place quotes come from
#[allow(async_fn_in_trait)]
pub trait QuoteSource {
    fn name(&self) -> &'static str;
    async fn fetch(&self, symbol: &str) -> Result<Quote>;
}

/// Kind of instrument a symbol names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolClass {
    Stock,
    MutualFund,
    Index,
    Option,
}

/// Classify a bare symbol: `^` prefix is an index, five characters
/// ending in X is a mutual fund, anything else a stock
pub fn classify_symbol(symbol: &str) -> SymbolClass {
    if symbol.starts_with('^') {
        SymbolClass::Index
    } else if symbol.len() == 5 && symbol.ends_with('X') {
        SymbolClass::MutualFund
    } else {
        SymbolClass::Stock
    }
}

/// Symbols needing a quote, split by provider path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SymbolSets {
    pub stocks: BTreeSet<String>,
    pub mutual_funds: BTreeSet<String>,
    pub indices: BTreeSet<String>,
    pub options: BTreeSet<String>,
}

impl SymbolSets {
    pub fn from_symbols<I: IntoIterator<Item = String>>(symbols: I) -> Self {
        let mut sets = SymbolSets::default();
        for symbol in symbols {
            match classify_symbol(&symbol) {
                SymbolClass::Index => sets.indices.insert(symbol),
                SymbolClass::MutualFund => sets.mutual_funds.insert(symbol),
                _ => sets.stocks.insert(symbol),
            };
        }
        sets
    }

    pub fn len(&self) -> usize {
        self.stocks.len() + self.mutual_funds.len() + self.indices.len() + self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Open stock symbols (optionally limited to some portfolios), plus the
/// ticker_symbols watch list, plus OCC symbols of open options
pub fn symbols_to_refresh(conn: &Connection, fileportnames: &[String]) -> Result<SymbolSets> {
    let open = db::get_open_longs(conn, fileportnames)?;

    let mut bare: BTreeSet<String> = open
        .iter()
        .filter(|tx| !tx.is_option())
        .map(|tx| tx.symbol.clone())
        .collect();
    bare.extend(db::list_ticker_symbols(conn)?);

    let mut sets = SymbolSets::from_symbols(bare);
    sets.options = open
        .iter()
        .filter(|tx| tx.is_option())
        .map(|tx| tx.trait_key().display_symbol())
        .collect();

    debug!(
        "symbols: {} stocks, {} funds, {} indices, {} options",
        sets.stocks.len(),
        sets.mutual_funds.len(),
        sets.indices.len(),
        sets.options.len()
    );
    Ok(sets)
}

/// Try the primary source, then the fallback. Never fails: the last
/// error is kept on a quote with `success = false`.
pub async fn fetch_with_fallback<P, F>(primary: &P, fallback: Option<&F>, symbol: &str) -> Quote
where
    P: QuoteSource,
    F: QuoteSource,
{
    let primary_err = match primary.fetch(symbol).await {
        Ok(quote) => return quote,
        Err(e) => {
            warn!("{} lookup failed for {}: {:#}", primary.name(), symbol, e);
            e
        }
    };

    match fallback {
        Some(fallback) => match fallback.fetch(symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!("{} lookup failed for {}: {:#}", fallback.name(), symbol, e);
                Quote::failed(symbol, fallback.name(), &format!("{:#}", e))
            }
        },
        None => Quote::failed(symbol, primary.name(), &format!("{:#}", primary_err)),
    }
}

/// Outcome of a refresh pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshSummary {
    pub updated: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Fetch every symbol and store the results. Stocks go to `stock_source`
/// with `fallback` behind it; funds, indices and options go to `fallback`.
pub async fn refresh_quotes<S, F>(
    conn: &Connection,
    sets: &SymbolSets,
    stock_source: &S,
    fallback: &F,
) -> Result<RefreshSummary>
where
    S: QuoteSource,
    F: QuoteSource,
{
    let mut summary = RefreshSummary::default();
    let mut results = Vec::with_capacity(sets.len());

    for symbol in &sets.stocks {
        results.push(fetch_with_fallback(stock_source, Some(fallback), symbol).await);
    }
    for symbol in sets
        .mutual_funds
        .iter()
        .chain(&sets.indices)
        .chain(&sets.options)
    {
        results.push(fetch_with_fallback::<F, F>(fallback, None, symbol).await);
    }

    for quote in results {
        db::upsert_quote(conn, &quote)
            .with_context(|| format!("Failed to store quote for {}", quote.symbol))?;
        if quote.success {
            summary.updated.push(quote.symbol);
        } else {
            let message = quote.errormsg.unwrap_or_default();
            summary.failed.push((quote.symbol, message));
        }
    }

    info!(
        "Quote refresh: {} updated, {} failed",
        summary.updated.len(),
        summary.failed.len()
    );
    Ok(summary)
}

/// HTTP client shared by the providers
pub fn http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")
}

fn field(value: Option<Decimal>) -> String {
    value.unwrap_or(Decimal::ZERO).to_string()
}

/// Single-line quote summary:
/// `close last dayhigh daylow yearlow yearhigh volume pe net p_change bid ask`
pub fn quote_line(quote: &Quote) -> String {
    [
        field(quote.close),
        quote.last.to_string(),
        field(quote.high),
        field(quote.low),
        field(quote.low52),
        field(quote.high52),
        quote.volume.unwrap_or(0).to_string(),
        field(quote.pe),
        quote.net.to_string(),
        format!("{:.6}", quote.p_change),
        field(quote.bid),
        field(quote.ask),
    ]
    .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Descriptor, Transaction};
    use anyhow::anyhow;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    struct FixedSource {
        name: &'static str,
        price: Option<Decimal>,
    }

    impl QuoteSource for FixedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, symbol: &str) -> Result<Quote> {
            match self.price {
                Some(last) => Ok(Quote {
                    symbol: symbol.to_string(),
                    last,
                    method: self.name.to_string(),
                    success: true,
                    ..Default::default()
                }),
                None => Err(anyhow!("{} is down", self.name)),
            }
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_classify_symbol() {
        assert_eq!(classify_symbol("^GSPC"), SymbolClass::Index);
        assert_eq!(classify_symbol("VFIAX"), SymbolClass::MutualFund);
        assert_eq!(classify_symbol("AAPL"), SymbolClass::Stock);
        // five characters but not ending in X
        assert_eq!(classify_symbol("GOOGL"), SymbolClass::Stock);
        assert_eq!(classify_symbol("^DJIAX"), SymbolClass::Index);
    }

    #[test]
    fn test_symbols_to_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_initialized(Some(dir.path().join("q.db"))).unwrap();

        db::insert_transaction(
            &conn,
            &Transaction::open_long("port:a", "IBM", Descriptor::Stock, dec!(1), dec!(1), d(2024, 1, 1)),
        )
        .unwrap();
        db::insert_transaction(
            &conn,
            &Transaction::open_long("port:b", "VFIAX", Descriptor::Stock, dec!(1), dec!(1), d(2024, 1, 1)),
        )
        .unwrap();
        db::insert_transaction(
            &conn,
            &Transaction::open_long("port:a", "IBM", Descriptor::Put, dec!(1), dec!(1), d(2024, 1, 1))
                .with_option(d(2024, 6, 21), dec!(120)),
        )
        .unwrap();
        db::insert_transaction(
            &conn,
            &Transaction::open_long("port:a", "MSFT", Descriptor::Stock, dec!(1), dec!(1), d(2024, 1, 1))
                .closed_at(dec!(2), d(2024, 1, 2)),
        )
        .unwrap();
        db::add_ticker_symbol(&conn, "^GSPC").unwrap();

        let all = symbols_to_refresh(&conn, &[]).unwrap();
        assert_eq!(all.stocks.iter().collect::<Vec<_>>(), vec!["IBM"]);
        assert!(all.mutual_funds.contains("VFIAX"));
        assert!(all.indices.contains("^GSPC"));
        assert!(all.options.contains("IBM240621P00120000"));

        let only_a = symbols_to_refresh(&conn, &["port:a".to_string()]).unwrap();
        assert!(only_a.mutual_funds.is_empty());
        assert_eq!(only_a.len(), 3);
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let primary = FixedSource { name: "down", price: None };
        let fallback = FixedSource { name: "up", price: Some(dec!(42)) };

        let quote = fetch_with_fallback(&primary, Some(&fallback), "IBM").await;
        assert!(quote.success);
        assert_eq!(quote.method, "up");
        assert_eq!(quote.last, dec!(42));
    }

    #[tokio::test]
    async fn test_refresh_records_failures_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_initialized(Some(dir.path().join("q.db"))).unwrap();

        let sets = SymbolSets::from_symbols(vec!["IBM".to_string(), "^GSPC".to_string()]);
        let stocks = FixedSource { name: "stocks", price: Some(dec!(10)) };
        let broken = FixedSource { name: "broken", price: None };

        let summary = refresh_quotes(&conn, &sets, &stocks, &broken).await.unwrap();
        assert_eq!(summary.updated, vec!["IBM".to_string()]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "^GSPC");

        let stored = db::get_quote(&conn, "^GSPC").unwrap().unwrap();
        assert!(!stored.success);
        assert!(stored.errormsg.unwrap().contains("broken is down"));
    }

    #[test]
    fn test_quote_line_layout() {
        let mut quote = Quote {
            symbol: "IBM".to_string(),
            last: dec!(110),
            close: Some(dec!(100)),
            high: Some(dec!(111)),
            low: Some(dec!(99)),
            volume: Some(1000),
            ..Default::default()
        };
        quote.derive_change();

        assert_eq!(
            quote_line(&quote),
            "100 110 111 99 0 0 1000 0 10 10.000000 0 0"
        );
    }
}
