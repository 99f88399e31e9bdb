#![allow(dead_code)]

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

pub fn db_path(home: &TempDir) -> PathBuf {
    home.path().join(".trackport").join("track_port.db")
}

pub fn open_conn(home: &TempDir) -> Result<Connection> {
    let path = db_path(home);
    Connection::open(path).context("failed to open test database")
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count)
}

pub fn history_totals(conn: &Connection, fileportname: &str) -> Result<Vec<(String, String)>> {
    let mut stmt =
        conn.prepare("SELECT date, total FROM port_history WHERE fileportname = ?1 ORDER BY date")?;
    let rows = stmt.query_map([fileportname], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}
