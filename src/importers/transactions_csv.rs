use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::db::{Descriptor, PositionKind, Transaction};

/// Row ordering for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportOrder {
    Open,
    Close,
}

/// One CSV line; dates are ISO, empty cells are absent values
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    fileportname: String,
    symbol: String,
    #[serde(default)]
    sector: String,
    position: String,
    descriptor: String,
    shares: String,
    open_date: String,
    open_price: String,
    #[serde(default)]
    closed: String,
    #[serde(default)]
    close_date: String,
    #[serde(default)]
    close_price: String,
    #[serde(default)]
    expiration: String,
    #[serde(default)]
    strike: String,
}

fn text<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl From<&Transaction> for CsvRow {
    fn from(tx: &Transaction) -> Self {
        CsvRow {
            fileportname: tx.fileportname.clone(),
            symbol: tx.symbol.clone(),
            sector: tx.sector.clone().unwrap_or_default(),
            position: tx.position.as_str().to_string(),
            descriptor: tx.descriptor.as_str().to_string(),
            shares: tx.shares.to_string(),
            open_date: tx.open_date.to_string(),
            open_price: tx.open_price.to_string(),
            closed: tx.closed.to_string(),
            close_date: text(tx.close_date),
            close_price: text(tx.close_price),
            expiration: text(tx.expiration),
            strike: text(tx.strike),
        }
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid {} '{}'", field, value))
}

fn parse_optional_date(field: &str, value: &str) -> Result<Option<NaiveDate>> {
    match value.trim() {
        "" | "None" => Ok(None),
        v => parse_date(field, v).map(Some),
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim()).with_context(|| format!("invalid {} '{}'", field, value))
}

fn parse_optional_decimal(field: &str, value: &str) -> Result<Option<Decimal>> {
    match value.trim() {
        "" | "None" => Ok(None),
        v => parse_decimal(field, v).map(Some),
    }
}

impl CsvRow {
    fn into_transaction(self) -> Result<Transaction> {
        let position = PositionKind::from_str(&self.position)
            .map_err(|_| anyhow!("unknown position '{}'", self.position))?;
        let descriptor = Descriptor::from_str(&self.descriptor)
            .map_err(|_| anyhow!("unknown descriptor '{}'", self.descriptor))?;
        let closed = matches!(
            self.closed.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        );
        let sector = Some(self.sector.trim().to_string()).filter(|s| !s.is_empty());

        let tx = Transaction {
            id: None,
            fileportname: self.fileportname.trim().to_string(),
            symbol: self.symbol.trim().to_uppercase(),
            sector,
            position,
            descriptor,
            shares: parse_decimal("shares", &self.shares)?,
            open_price: parse_decimal("open_price", &self.open_price)?,
            open_date: parse_date("open_date", &self.open_date)?,
            closed,
            close_price: parse_optional_decimal("close_price", &self.close_price)?,
            close_date: parse_optional_date("close_date", &self.close_date)?,
            expiration: parse_optional_date("expiration", &self.expiration)?,
            strike: parse_optional_decimal("strike", &self.strike)?,
        };
        tx.validate()?;
        Ok(tx)
    }
}

/// Write transactions as CSV, ordered by open date or close date.
/// Open rows sort after closed ones when ordering by close.
pub fn export_transactions<W: Write>(
    writer: W,
    transactions: &[Transaction],
    order: ExportOrder,
) -> Result<usize> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    match order {
        ExportOrder::Open => sorted.sort_by_key(|t| (t.open_date, t.id)),
        ExportOrder::Close => {
            sorted.sort_by_key(|t| (t.close_date.is_none(), t.close_date, t.open_date, t.id))
        }
    }

    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    for tx in &sorted {
        csv_writer
            .serialize(CsvRow::from(*tx))
            .context("Failed to write CSV row")?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;

    debug!("Exported {} transactions", sorted.len());
    Ok(sorted.len())
}

/// Parse transactions from CSV. Bad rows are skipped with a warning.
pub fn parse_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut transactions = Vec::new();
    for (idx, result) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let line = idx + 2;
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping row {}: {}", line, e);
                continue;
            }
        };
        match row.into_transaction() {
            Ok(tx) => transactions.push(tx),
            Err(e) => warn!("Skipping row {}: {:#}", line, e),
        }
    }

    info!("Parsed {} transactions from CSV", transactions.len());
    Ok(transactions)
}
