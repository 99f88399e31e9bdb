//! Command dispatcher that routes parsed clap commands to their handlers.
//!
//! Each command family lives in its own submodule with a
//! `dispatch_x(action, ctx)` entry point.

mod history;
mod quotes;
mod reports;
mod tickers;
mod transactions;

use anyhow::Result;
use colored::Colorize;
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::db;

/// Settings every handler needs
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub json_output: bool,
}

impl AppContext {
    pub fn new(config: Config, cli: &Cli) -> Self {
        Self {
            config: config.with_db_override(cli.db.clone()),
            json_output: cli.json,
        }
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        self.config.db_path.clone()
    }

    /// Open the database, creating the schema on first use
    pub fn connect(&self) -> Result<Connection> {
        db::open_initialized(self.db_path())
    }

    /// Print `value` as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Route a parsed command to its handler
pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let ctx = AppContext::new(config, &cli);

    match cli.command {
        Commands::Init => {
            db::init_database(ctx.db_path())?;
            if ctx.json_output {
                ctx.print_json(&serde_json::json!({ "initialized": true }))?;
            } else {
                println!("{} Database ready", "✓".green().bold());
            }
            Ok(())
        }
        Commands::Transactions { action } => transactions::dispatch_transactions(action, &ctx),
        Commands::Ports { action } => tickers::dispatch_ports(action, &ctx),
        Commands::Quotes { action } => quotes::dispatch_quotes(action, &ctx).await,
        Commands::Report(args) => reports::dispatch_report(args, &ctx),
        Commands::Portfolio { action } => reports::dispatch_portfolio(action, &ctx),
        Commands::Totals { action } => reports::dispatch_totals(action, &ctx),
        Commands::History { action } => history::dispatch_history(action, &ctx).await,
        Commands::Holidays { action } => tickers::dispatch_holidays(action, &ctx),
        Commands::Tickers { action } => tickers::dispatch_tickers(action, &ctx),
    }
}
