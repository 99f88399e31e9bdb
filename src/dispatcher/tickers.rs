use anyhow::{anyhow, Result};
use colored::Colorize;

use super::AppContext;
use crate::cli::formatters;
use crate::cli::{HolidayCommands, PortsCommands, TickerCommands};
use crate::db::{self, MarketHoliday};

pub fn dispatch_ports(action: PortsCommands, ctx: &AppContext) -> Result<()> {
    match action {
        PortsCommands::List => {
            let conn = ctx.connect()?;
            let names = db::get_fileportnames(&conn)?;

            if ctx.json_output {
                return ctx.print_json(&names);
            }
            if names.is_empty() {
                print!("{}", formatters::format_empty_portfolio());
                return Ok(());
            }
            for name in names {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

pub fn dispatch_holidays(action: HolidayCommands, ctx: &AppContext) -> Result<()> {
    let conn = ctx.connect()?;
    match action {
        HolidayCommands::Add { date, name } => {
            let holiday = MarketHoliday { date, name };
            db::insert_holiday(&conn, &holiday)?;
            if ctx.json_output {
                return ctx.print_json(&holiday);
            }
            println!("{} Market holiday {}", "✓".green().bold(), date);
            Ok(())
        }
        HolidayCommands::List => {
            let holidays = db::list_holidays(&conn)?;
            if ctx.json_output {
                return ctx.print_json(&holidays);
            }
            if holidays.is_empty() {
                println!("No market holidays recorded.");
                return Ok(());
            }
            println!("{}", formatters::format_holidays_table(&holidays));
            Ok(())
        }
        HolidayCommands::Remove { date } => {
            if !db::delete_holiday(&conn, date)? {
                return Err(anyhow!("{} is not a recorded holiday", date));
            }
            if ctx.json_output {
                return ctx.print_json(&serde_json::json!({ "removed": date }));
            }
            println!("{} Removed holiday {}", "✓".green().bold(), date);
            Ok(())
        }
    }
}

pub fn dispatch_tickers(action: TickerCommands, ctx: &AppContext) -> Result<()> {
    let conn = ctx.connect()?;
    match action {
        TickerCommands::Add { symbol } => {
            let symbol = symbol.to_uppercase();
            db::add_ticker_symbol(&conn, &symbol)?;
            if ctx.json_output {
                return ctx.print_json(&serde_json::json!({ "added": symbol }));
            }
            println!("{} Watching {}", "✓".green().bold(), symbol.cyan().bold());
            Ok(())
        }
        TickerCommands::List => {
            let symbols = db::list_ticker_symbols(&conn)?;
            if ctx.json_output {
                return ctx.print_json(&symbols);
            }
            if symbols.is_empty() {
                println!("No ticker symbols.");
                return Ok(());
            }
            for symbol in symbols {
                println!("{}", symbol);
            }
            Ok(())
        }
        TickerCommands::Remove { symbol } => {
            let symbol = symbol.to_uppercase();
            if !db::remove_ticker_symbol(&conn, &symbol)? {
                return Err(anyhow!("{} is not a ticker symbol", symbol));
            }
            if ctx.json_output {
                return ctx.print_json(&serde_json::json!({ "removed": symbol }));
            }
            println!("{} Removed {}", "✓".green().bold(), symbol);
            Ok(())
        }
    }
}
