// finviz.com quote page scraper
//
// The snapshot table is a flat run of <td> cells alternating label and
// value. A "-" value means the field does not apply.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

use super::QuoteSource;
use crate::db::Quote;
use crate::error::PortfolioError;

const FINVIZ_URL: &str = "https://finviz.com/quote.ashx";

static RANGE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*([-\d.,]+)\s*-\s*([-\d.,]+)\s*$").ok());

pub struct FinvizSource {
    client: Client,
}

impl FinvizSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl QuoteSource for FinvizSource {
    fn name(&self) -> &'static str {
        "finviz"
    }

    async fn fetch(&self, symbol: &str) -> Result<Quote> {
        info!("Fetching {} from finviz", symbol);

        let url = format!("{}?t={}&p=d", FINVIZ_URL, symbol);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to finviz")?;

        if !response.status().is_success() {
            return Err(anyhow!("finviz returned error status: {}", response.status()));
        }

        let body = response.text().await.context("Failed to read finviz response")?;
        parse_quote_page(symbol, &body)
    }
}

/// Label -> value pairs of the snapshot table
pub fn parse_snapshot(html: &str) -> HashMap<String, String> {
    let document = Html::parse_document(html);
    let mut fields = HashMap::new();

    let cell_selector = match Selector::parse("table.snapshot-table2 td") {
        Ok(s) => s,
        Err(_) => return fields,
    };

    let cells: Vec<String> = document
        .select(&cell_selector)
        .map(|td| td.text().collect::<String>().trim().to_string())
        .collect();

    for pair in cells.chunks(2) {
        if let [label, value] = pair {
            if !label.is_empty() {
                fields.insert(label.clone(), value.clone());
            }
        }
    }

    debug!("finviz snapshot has {} fields", fields.len());
    fields
}

fn company_name(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(".quote-header_ticker-wrapper_company").ok()?;
    document
        .select(&selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a finviz number: commas, %, and K/M/B/T suffixes; "-" is absent
pub fn parse_number(raw: &str) -> Option<Decimal> {
    let s = raw.trim().trim_end_matches('%').replace(',', "");
    if s.is_empty() || s == "-" {
        return None;
    }

    let (digits, multiplier) = match s.chars().last() {
        Some('K') => (&s[..s.len() - 1], Decimal::from(1_000)),
        Some('M') => (&s[..s.len() - 1], Decimal::from(1_000_000)),
        Some('B') => (&s[..s.len() - 1], Decimal::from(1_000_000_000i64)),
        Some('T') => (&s[..s.len() - 1], Decimal::from(1_000_000_000_000i64)),
        _ => (s.as_str(), Decimal::ONE),
    };

    Decimal::from_str(digits).ok().map(|d| d * multiplier)
}

fn parse_integer(raw: &str) -> Option<i64> {
    parse_number(raw).and_then(|d| d.trunc().to_i64())
}

/// "123.45 - 200.00" -> (low, high)
pub fn parse_range(raw: &str) -> Option<(Decimal, Decimal)> {
    let caps = RANGE_RE.as_ref()?.captures(raw)?;
    let low = parse_number(caps.get(1)?.as_str())?;
    let high = parse_number(caps.get(2)?.as_str())?;
    Some((low, high))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%b %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
}

/// First number of a "0.96 (0.52%)" style cell
fn leading_number(raw: &str) -> Option<Decimal> {
    raw.split_whitespace().next().and_then(parse_number)
}

/// Build a quote from a finviz quote page
pub fn parse_quote_page(symbol: &str, html: &str) -> Result<Quote> {
    let fields = parse_snapshot(html);
    let get = |label: &str| fields.get(label).map(String::as_str);

    let last = get("Price")
        .and_then(parse_number)
        .ok_or_else(|| PortfolioError::PricingError(format!("finviz: no price for {}", symbol)))?;

    let (low52, high52) = match get("52W Range").and_then(parse_range) {
        Some((low, high)) => (Some(low), Some(high)),
        None => (None, None),
    };

    let (low, high) = match get("Range")
        .or_else(|| get("Day's Range"))
        .or_else(|| get("Day Range"))
        .and_then(parse_range)
    {
        Some((low, high)) => (Some(low), Some(high)),
        None => (None, None),
    };

    let dividend = get("Dividend TTM")
        .or_else(|| get("Dividend"))
        .or_else(|| get("Dividend Est."))
        .and_then(leading_number);

    let mut quote = Quote {
        symbol: symbol.to_string(),
        name: company_name(html),
        last,
        close: get("Prev Close").and_then(parse_number),
        low,
        high,
        low52,
        high52,
        volume: get("Volume").and_then(parse_integer),
        avg_vol: get("Avg Volume").and_then(parse_integer),
        eps: get("EPS (ttm)").and_then(parse_number),
        pe: get("P/E").and_then(parse_number),
        cap: get("Market Cap").and_then(parse_integer),
        dividend,
        div_yield: get("Dividend %").and_then(parse_number),
        ex_div: get("Ex-Dividend Date").and_then(parse_date),
        quote_date: Some(chrono::Local::now().date_naive()),
        method: "finviz".to_string(),
        success: true,
        ..Default::default()
    };
    quote.derive_change();

    Ok(quote)
}
