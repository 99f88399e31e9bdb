#![allow(dead_code)]

use anyhow::{bail, Result};
use assert_cmd::cargo;
use serde_json::Value;
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn base_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("trackport"));
    cmd.env("HOME", home.path());
    cmd.env_remove("TRACKPORT_DB");
    cmd.env_remove("GATEWAY_INTERFACE");
    cmd.env_remove("QUERY_STRING");
    cmd.env("TRACKPORT_OFFLINE", "1");
    cmd.arg("--no-color");
    cmd
}

pub fn run_cmd(home: &TempDir, args: &[&str]) -> Result<Output> {
    let mut cmd = base_cmd(home);
    cmd.args(args);
    let output = cmd.output()?;
    if !output.status.success() {
        bail!(
            "command failed: {:?}\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

pub fn run_cmd_json(home: &TempDir, args: &[&str]) -> Result<Value> {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let output = run_cmd(home, &full)?;
    let stdout = String::from_utf8(output.stdout)?;
    Ok(serde_json::from_str(&stdout)?)
}

pub fn stdout_of(home: &TempDir, args: &[&str]) -> Result<String> {
    let output = run_cmd(home, args)?;
    Ok(String::from_utf8(output.stdout)?)
}

/// Add a stock row and return its id
pub fn add_stock(home: &TempDir, fpn: &str, symbol: &str, shares: &str, price: &str, date: &str) -> Result<i64> {
    let value = run_cmd_json(
        home,
        &["transactions", "add", fpn, symbol, shares, price, "--date", date],
    )?;
    match value["id"].as_i64() {
        Some(id) => Ok(id),
        None => bail!("no id in {}", value),
    }
}

pub fn add_cash(home: &TempDir, fpn: &str, amount: &str, date: &str) -> Result<()> {
    run_cmd(home, &["transactions", "cash", fpn, amount, "--date", date, "--initial"])?;
    Ok(())
}

pub fn set_quote(home: &TempDir, symbol: &str, last: &str, close: &str) -> Result<()> {
    run_cmd(home, &["quotes", "set", symbol, last, "--close", close])?;
    Ok(())
}

pub fn list_transactions_json(home: &TempDir, fpn: &str) -> Result<Vec<Value>> {
    let value = run_cmd_json(home, &["transactions", "list", "--fpn", fpn])?;
    Ok(value.as_array().cloned().unwrap_or_default())
}

pub fn portfolio_json(home: &TempDir, fpn: &str) -> Result<Value> {
    run_cmd_json(home, &["portfolio", "show", "--fpn", fpn])
}
