use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use colored::Colorize;
use tracing::warn;

use super::AppContext;
use crate::cli::formatters;
use crate::cli::HistoryCommands;
use crate::db;
use crate::quotes::{self, yahoo::DailyClose, YahooSource};
use crate::reports::history::{self, PriceHistory};
use crate::reports::plot;

/// Price source used offline: every symbol falls back to its purchase price
struct NoPrices;

impl PriceHistory for NoPrices {
    async fn daily_closes(&self, _symbol: &str, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<DailyClose>> {
        Ok(Vec::new())
    }
}

pub async fn dispatch_history(action: HistoryCommands, ctx: &AppContext) -> Result<()> {
    match action {
        HistoryCommands::Rebuild { fileportname, until } => {
            let until = until.unwrap_or_else(|| Local::now().date_naive());
            let conn = ctx.connect()?;

            let summary = if ctx.config.offline {
                warn!("Offline mode: rebuilding {} without price history", fileportname);
                history::rebuild(&conn, &fileportname, &NoPrices, until).await?
            } else {
                let source = YahooSource::new(quotes::http_client(&ctx.config)?);
                history::rebuild(&conn, &fileportname, &source, until).await?
            };

            if ctx.json_output {
                return ctx.print_json(&summary);
            }

            match (summary.first_date, summary.last_date) {
                (Some(first), Some(last)) => println!(
                    "{} {}: {} day(s) written, {} to {}",
                    "✓".green().bold(),
                    summary.fileportname,
                    summary.days_written,
                    first,
                    last
                ),
                _ => println!("{}: no transactions to rebuild from", summary.fileportname),
            }
            if !summary.unpriced_symbols.is_empty() {
                println!(
                    "{} Valued at purchase price: {}",
                    "⚠".yellow().bold(),
                    summary.unpriced_symbols.join(", ")
                );
            }
            Ok(())
        }
        HistoryCommands::Show { fileportname } => {
            let conn = ctx.connect()?;
            let rows = db::list_port_history(&conn, &fileportname)?;

            if ctx.json_output {
                return ctx.print_json(&rows);
            }
            if rows.is_empty() {
                println!("No history for {}", fileportname);
                return Ok(());
            }
            println!("{}", formatters::format_history_table(&rows));
            Ok(())
        }
        HistoryCommands::Plot {
            fileportnames,
            title,
            output,
        } => {
            let conn = ctx.connect()?;
            let names: Vec<String> = if fileportnames.is_empty() {
                db::get_history_fileportnames(&conn)?.into_iter().collect()
            } else {
                fileportnames
            };

            let series = plot::load_series(&conn, &names)?;
            let page = plot::render_plot_page(&title, &series)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &page)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    if ctx.json_output {
                        ctx.print_json(&serde_json::json!({
                            "output": path,
                            "portfolios": names,
                        }))?;
                    } else {
                        println!("{} Plot written to {}", "✓".green().bold(), path.display());
                    }
                }
                None => print!("{}", page),
            }
            Ok(())
        }
    }
}
