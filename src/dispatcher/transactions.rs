use anyhow::{anyhow, Context, Result};
use chrono::Local;
use colored::Colorize;
use std::fs::File;
use std::io::{stdout, Write};
use tracing::info;

use super::AppContext;
use crate::cli::formatters;
use crate::cli::{RowKind, SecurityKind, TransactionCommands};
use crate::db::{self, Descriptor, FilePortName, PositionKind, Transaction, TransactionFilter};
use crate::importers;
use crate::utils::{format_currency, format_shares};

pub fn dispatch_transactions(action: TransactionCommands, ctx: &AppContext) -> Result<()> {
    match action {
        TransactionCommands::Add {
            fileportname,
            symbol,
            shares,
            price,
            date,
            kind,
            expiration,
            strike,
            sector,
        } => {
            let fpn: FilePortName = fileportname.parse()?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let descriptor = match kind {
                SecurityKind::Stock => Descriptor::Stock,
                SecurityKind::Call => Descriptor::Call,
                SecurityKind::Put => Descriptor::Put,
            };

            let mut tx = Transaction::open_long(&fpn.to_string(), &symbol, descriptor, shares, price, date)
                .with_sector(sector);
            if descriptor.is_option() {
                match (expiration, strike) {
                    (Some(expiration), Some(strike)) => tx = tx.with_option(expiration, strike),
                    _ => return Err(anyhow!("Options need both --expiration and --strike")),
                }
            }

            let conn = ctx.connect()?;
            let id = db::insert_transaction(&conn, &tx)?;
            info!("Added transaction {} for {}", id, tx.symbol);
            report_added(ctx, id, &tx)
        }
        TransactionCommands::Cash {
            fileportname,
            amount,
            date,
            initial,
        } => {
            let fpn: FilePortName = fileportname.parse()?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let descriptor = if initial {
                Descriptor::Initial
            } else {
                Descriptor::Intermediate
            };

            let tx = Transaction::cash(&fpn.to_string(), descriptor, amount, date);
            let conn = ctx.connect()?;
            let id = db::insert_transaction(&conn, &tx)?;
            report_added(ctx, id, &tx)
        }
        TransactionCommands::Close { id, price, date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let conn = ctx.connect()?;
            let tx = db::close_transaction(&conn, id, price, date)?;

            if ctx.json_output {
                return ctx.print_json(&tx);
            }
            println!(
                "{} Closed #{} {} {} @ {} (realized {})",
                "✓".green().bold(),
                id,
                format_shares(tx.shares),
                tx.trait_key().display_symbol().cyan().bold(),
                format_currency(price),
                format_currency(tx.realized_gain())
            );
            Ok(())
        }
        TransactionCommands::Delete { id } => {
            let conn = ctx.connect()?;
            let removed = db::delete_transaction(&conn, id)?;
            if !removed {
                return Err(anyhow!("No transaction with id {}", id));
            }

            if ctx.json_output {
                ctx.print_json(&serde_json::json!({ "deleted": id }))
            } else {
                println!("{} Deleted transaction #{}", "✓".green().bold(), id);
                Ok(())
            }
        }
        TransactionCommands::List {
            fileportname,
            open,
            closed,
            kind,
            symbol,
        } => {
            let filter = TransactionFilter {
                fileportname,
                closed: if open {
                    Some(false)
                } else if closed {
                    Some(true)
                } else {
                    None
                },
                position: kind.map(|k| match k {
                    RowKind::Long => PositionKind::Long,
                    RowKind::Cash => PositionKind::Cash,
                }),
                symbol,
            };

            let conn = ctx.connect()?;
            let transactions = db::list_transactions(&conn, &filter)?;

            if ctx.json_output {
                return ctx.print_json(&transactions);
            }
            if transactions.is_empty() {
                print!("{}", formatters::format_empty_portfolio());
                return Ok(());
            }
            println!("{}", formatters::format_transactions_table(&transactions));
            println!("{} transaction(s)", transactions.len());
            Ok(())
        }
        TransactionCommands::Import { file } => {
            let mut conn = ctx.connect()?;
            let imported = importers::import_csv_file(&mut conn, &file)?;

            if ctx.json_output {
                ctx.print_json(&serde_json::json!({
                    "file": file,
                    "imported": imported,
                }))
            } else {
                println!(
                    "{} Imported {} transaction(s) from {}",
                    "✓".green().bold(),
                    imported,
                    file.display()
                );
                Ok(())
            }
        }
        TransactionCommands::Export {
            fileportname,
            order,
            output,
        } => {
            let conn = ctx.connect()?;
            let transactions = db::list_transactions(
                &conn,
                &TransactionFilter {
                    fileportname,
                    ..Default::default()
                },
            )?;

            let written = match &output {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("Failed to create {:?}", path))?;
                    importers::export_transactions(file, &transactions, order)?
                }
                None => {
                    let mut out = stdout().lock();
                    let n = importers::export_transactions(&mut out, &transactions, order)?;
                    out.flush()?;
                    n
                }
            };

            if let Some(path) = output {
                info!("Exported {} transactions to {:?}", written, path);
                if !ctx.json_output {
                    println!("{} Exported {} transaction(s) to {}", "✓".green().bold(), written, path.display());
                }
            }
            Ok(())
        }
    }
}

fn report_added(ctx: &AppContext, id: i64, tx: &Transaction) -> Result<()> {
    if ctx.json_output {
        let mut stored = tx.clone();
        stored.id = Some(id);
        return ctx.print_json(&stored);
    }

    println!("\n{} Transaction added", "✓".green().bold());
    println!("  ID:        {}", id);
    println!("  Portfolio: {}", tx.fileportname);
    if tx.position == PositionKind::Cash {
        println!("  Cash:      {}", format_currency(tx.open_price).cyan());
    } else {
        println!("  Symbol:    {}", tx.trait_key().display_symbol().cyan().bold());
        println!("  Shares:    {}", format_shares(tx.shares));
        println!("  Price:     {}", format_currency(tx.open_price).cyan());
    }
    println!("  Date:      {}", tx.open_date);
    println!();
    Ok(())
}
