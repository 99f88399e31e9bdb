use anyhow::{anyhow, Result};
use chrono::{Local, Utc};
use colored::Colorize;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::AppContext;
use crate::cli::formatters;
use crate::cli::QuoteCommands;
use crate::db::{self, Quote};
use crate::error::PortfolioError;
use crate::quotes::{self, FinvizSource, RefreshSummary, YahooSource};
use crate::utils::{format_currency, format_signed, format_signed_percent};

pub async fn dispatch_quotes(action: QuoteCommands, ctx: &AppContext) -> Result<()> {
    match action {
        QuoteCommands::Update { fileportnames } => {
            let conn = ctx.connect()?;
            let sets = quotes::symbols_to_refresh(&conn, &fileportnames)?;

            let summary = if ctx.config.offline {
                warn!("Offline mode: skipping quote refresh of {} symbols", sets.len());
                RefreshSummary::default()
            } else if sets.is_empty() {
                info!("No open positions or ticker symbols to quote");
                RefreshSummary::default()
            } else {
                let client = quotes::http_client(&ctx.config)?;
                let finviz = FinvizSource::new(client.clone());
                let yahoo = YahooSource::new(client);
                quotes::refresh_quotes(&conn, &sets, &finviz, &yahoo).await?
            };

            if ctx.json_output {
                return ctx.print_json(&summary);
            }

            println!(
                "{} Updated {} quote(s)",
                "✓".green().bold(),
                summary.updated.len()
            );
            for (symbol, message) in &summary.failed {
                println!("  {} {}: {}", "✗".red().bold(), symbol, message);
            }
            Ok(())
        }
        QuoteCommands::Get { symbol, fetch, line } => {
            let symbol = symbol.to_uppercase();
            let conn = ctx.connect()?;

            let quote = if fetch {
                if ctx.config.offline {
                    return Err(anyhow!("Offline mode: cannot fetch {}", symbol));
                }
                let client = quotes::http_client(&ctx.config)?;
                let finviz = FinvizSource::new(client.clone());
                let yahoo = YahooSource::new(client);
                let quote = quotes::fetch_with_fallback(&finviz, Some(&yahoo), &symbol).await;
                db::upsert_quote(&conn, &quote)?;
                quote
            } else {
                db::get_quote(&conn, &symbol)?
                    .ok_or_else(|| PortfolioError::MissingQuote(symbol.clone()))?
            };

            if line {
                println!("{}", quotes::quote_line(&quote));
                return Ok(());
            }
            if ctx.json_output {
                return ctx.print_json(&quote);
            }
            print_quote(&quote);
            Ok(())
        }
        QuoteCommands::Set { symbol, last, close } => {
            let mut quote = Quote {
                symbol: symbol.to_uppercase(),
                last,
                close,
                quote_date: Some(Local::now().date_naive()),
                method: "manual".to_string(),
                success: true,
                updated_at: Some(Utc::now()),
                ..Default::default()
            };
            quote.derive_change();

            let conn = ctx.connect()?;
            db::upsert_quote(&conn, &quote)?;

            if ctx.json_output {
                return ctx.print_json(&quote);
            }
            println!(
                "{} {} set to {}",
                "✓".green().bold(),
                quote.symbol.cyan().bold(),
                format_currency(last)
            );
            Ok(())
        }
        QuoteCommands::List => {
            let conn = ctx.connect()?;
            let mut all: Vec<Quote> = db::get_all_quotes(&conn)?.into_values().collect();
            all.sort_by(|a, b| a.symbol.cmp(&b.symbol));

            if ctx.json_output {
                return ctx.print_json(&all);
            }
            if all.is_empty() {
                println!("No quotes cached. Run: trackport quotes update");
                return Ok(());
            }
            println!("{}", formatters::format_quotes_table(&all));
            Ok(())
        }
    }
}

fn print_quote(quote: &Quote) {
    let title = match &quote.name {
        Some(name) => format!("{} ({})", quote.symbol, name),
        None => quote.symbol.clone(),
    };
    println!("\n{}", title.cyan().bold());

    if !quote.success {
        println!(
            "  {} {}",
            "✗".red().bold(),
            quote.errormsg.as_deref().unwrap_or("lookup failed")
        );
        return;
    }

    let change = if quote.net < Decimal::ZERO {
        format_signed(quote.net).red()
    } else {
        format_signed(quote.net).green()
    };
    println!("  Last:    {}  {} ({})", format_currency(quote.last), change, format_signed_percent(quote.p_change, 2));
    if let Some(close) = quote.close {
        println!("  Close:   {}", format_currency(close));
    }
    if let (Some(low), Some(high)) = (quote.low, quote.high) {
        println!("  Day:     {} - {}", format_currency(low), format_currency(high));
    }
    if let (Some(low52), Some(high52)) = (quote.low52, quote.high52) {
        println!("  52 week: {} - {}", format_currency(low52), format_currency(high52));
    }
    if let Some(pe) = quote.pe {
        println!("  P/E:     {}", pe);
    }
    let when = quote
        .updated_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    println!("  Source:  {} {}", quote.method, when);
    println!();
}
