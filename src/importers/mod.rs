// Import module - transaction list CSV import and export

pub mod transactions_csv;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::db;

pub use transactions_csv::{export_transactions, parse_transactions, ExportOrder};

/// Load a CSV file into transaction_list inside one transaction
pub fn import_csv_file<P: AsRef<Path>>(conn: &mut Connection, path: P) -> Result<usize> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if extension != "csv" && extension != "txt" {
        return Err(anyhow!(
            "Unsupported file format: {:?}. Supported formats: .csv",
            path
        ));
    }

    info!("Importing transactions from {:?}", path);
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let transactions = parse_transactions(file)?;

    let db_tx = conn.transaction()?;
    for tx in &transactions {
        db::insert_transaction(&db_tx, tx)?;
    }
    db_tx.commit()?;

    Ok(transactions.len())
}
