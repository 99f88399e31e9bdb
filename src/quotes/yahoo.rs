use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use super::QuoteSource;
use crate::db::Quote;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart response
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
    regular_market_volume: Option<i64>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<OhlcData>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct OhlcData {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

/// Daily close used by the history rebuild
#[derive(Debug, Clone, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: Decimal,
}

pub struct YahooSource {
    client: Client,
}

impl YahooSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn chart(&self, url: &str) -> Result<ChartResult> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request to Yahoo Finance")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Yahoo Finance returned error status: {}",
                response.status()
            ));
        }

        let data: YahooChartResponse = response
            .json()
            .await
            .context("Failed to parse Yahoo Finance response")?;

        first_result(data)
    }

    /// Adjusted daily closes between two dates, inclusive
    pub async fn fetch_daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyClose>> {
        info!(
            "Fetching daily closes for {} from {} to {}",
            symbol, from, to
        );

        let from_timestamp = from
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Invalid from date"))?
            .and_utc()
            .timestamp();
        let to_timestamp = to
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| anyhow!("Invalid to date"))?
            .and_utc()
            .timestamp();

        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            CHART_URL,
            encode_symbol(symbol),
            from_timestamp,
            to_timestamp
        );

        let result = self.chart(&url).await?;
        let closes = daily_closes(result)?;
        debug!("Fetched {} daily closes for {}", closes.len(), symbol);
        Ok(closes)
    }
}

impl QuoteSource for YahooSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(&self, symbol: &str) -> Result<Quote> {
        info!("Fetching {} from Yahoo Finance", symbol);
        let url = format!("{}/{}", CHART_URL, encode_symbol(symbol));
        let result = self.chart(&url).await?;
        quote_from_meta(symbol, result.meta)
    }
}

/// Index symbols carry a caret that must be escaped in the path
fn encode_symbol(symbol: &str) -> String {
    symbol.replace('^', "%5E")
}

fn first_result(data: YahooChartResponse) -> Result<ChartResult> {
    if let Some(error) = data.chart.error {
        return Err(anyhow!(
            "Yahoo Finance API error: {} - {}",
            error.code,
            error.description
        ));
    }

    data.chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| anyhow!("No data returned from Yahoo Finance"))
}

fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64_retain).map(|d| d.round_dp(4))
}

fn quote_from_meta(symbol: &str, meta: Meta) -> Result<Quote> {
    let last = to_decimal(meta.regular_market_price)
        .ok_or_else(|| anyhow!("No price data available for {}", symbol))?;

    let mut quote = Quote {
        symbol: symbol.to_string(),
        name: meta.long_name.or(meta.short_name),
        last,
        close: to_decimal(meta.previous_close.or(meta.chart_previous_close)),
        high: to_decimal(meta.regular_market_day_high),
        low: to_decimal(meta.regular_market_day_low),
        low52: to_decimal(meta.fifty_two_week_low),
        high52: to_decimal(meta.fifty_two_week_high),
        volume: meta.regular_market_volume,
        quote_date: Some(chrono::Local::now().date_naive()),
        method: "yahoo".to_string(),
        success: true,
        ..Default::default()
    };
    quote.derive_change();
    Ok(quote)
}

fn daily_closes(result: ChartResult) -> Result<Vec<DailyClose>> {
    let timestamps = result
        .timestamp
        .ok_or_else(|| anyhow!("No timestamp data"))?;

    // Prefer adjusted closes, fall back to raw closes
    let closes = result
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .and_then(|a| a.adjclose)
        .or_else(|| {
            result
                .indicators
                .quote
                .into_iter()
                .next()
                .and_then(|q| q.close)
        })
        .ok_or_else(|| anyhow!("No close prices"))?;

    let mut prices = Vec::new();
    for (i, &timestamp) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| anyhow!("Invalid timestamp"))?
            .date_naive();

        // Yahoo leaves nulls on half days and suspensions
        if let Some(close) = to_decimal(closes.get(i).copied().flatten()) {
            prices.push(DailyClose { date, close });
        }
    }

    Ok(prices)
}
