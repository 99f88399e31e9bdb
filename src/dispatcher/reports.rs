use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use itertools::Itertools;
use rusqlite::Connection;
use tracing::{debug, info};

use super::AppContext;
use crate::cli::formatters;
use crate::cli::{PortfolioCommands, ReportArgs, TotalsCommands};
use crate::db;
use crate::reports::{self, columns, ReportQuery};

/// Selected portfolios, else the configured defaults, else all of them
fn pick_fileportnames(conn: &Connection, ctx: &AppContext, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() && !ctx.config.default_ports.is_empty() {
        return Ok(ctx.config.default_ports.clone());
    }
    reports::resolve_fileportnames(conn, requested)
}

fn cgi_mode(args: &ReportArgs) -> bool {
    args.cgi || std::env::var_os("GATEWAY_INTERFACE").is_some()
}

fn query_from_args(args: ReportArgs) -> ReportQuery {
    ReportQuery {
        method: args.method,
        combined: args.combined,
        showname: args.showname,
        showsector: args.showsector,
        sort: args.sort,
        sold: args.sold,
        handheld: args.handheld,
        viewname: args.viewname,
        fileportnames: args.fileportnames,
        addcols: args
            .addcols
            .iter()
            .flat_map(|c| c.split(','))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect(),
    }
}

pub fn dispatch_report(args: ReportArgs, ctx: &AppContext) -> Result<()> {
    let conn = ctx.connect()?;
    let cgi = cgi_mode(&args);
    let output = args.output.clone();

    let mut query = if cgi {
        let raw = std::env::var("QUERY_STRING").unwrap_or_default();
        debug!("CGI query: {}", raw);
        let pairs = reports::parse_query_string(&raw)?;
        reports::handle_cgi_args(&pairs, &db::get_fileportnames(&conn)?)
    } else {
        query_from_args(args)
    };
    query.fileportnames = pick_fileportnames(&conn, ctx, &query.fileportnames)?;

    let portfolios = reports::load_portfolios(&conn, &query.fileportnames, query.combined)?;
    let html = reports::render_report(
        &portfolios,
        &query,
        &ctx.config.default_addcols,
        Local::now().date_naive(),
    )?;

    if cgi {
        print!("{}", reports::cgi_response(&html));
        return Ok(());
    }

    match output {
        Some(path) => {
            std::fs::write(&path, &html).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Report for {} written to {:?}", query.fileportnames.iter().join(", "), path);
            if ctx.json_output {
                ctx.print_json(&serde_json::json!({
                    "output": path,
                    "portfolios": query.fileportnames,
                }))?;
            } else {
                println!("{} Report written to {}", "✓".green().bold(), path.display());
            }
        }
        None => print!("{}", html),
    }
    Ok(())
}

pub fn dispatch_portfolio(action: PortfolioCommands, ctx: &AppContext) -> Result<()> {
    match action {
        PortfolioCommands::Show {
            fileportnames,
            combined,
            addcols,
            sold,
        } => {
            let conn = ctx.connect()?;
            let names = pick_fileportnames(&conn, ctx, &fileportnames)?;
            let portfolios = reports::load_portfolios(&conn, &names, combined)?;
            let as_of = Local::now().date_naive();

            if ctx.json_output {
                let payload: Vec<serde_json::Value> = portfolios
                    .iter()
                    .map(|p| {
                        serde_json::json!({
                            "fileportname": p.fileportname,
                            "positions": p.report_lines(as_of),
                            "cash": p.cash_line(),
                            "closed": p.closed.values().collect::<Vec<_>>(),
                            "totals": p.totals,
                            "missing_quotes": p.missing_quotes,
                        })
                    })
                    .collect();
                return ctx.print_json(&payload);
            }

            if portfolios.iter().all(|p| p.is_empty()) {
                print!("{}", formatters::format_empty_portfolio());
                return Ok(());
            }

            let mut wanted = ctx.config.default_addcols.clone();
            wanted.extend(addcols);
            let cols = columns::handle_cols(&wanted);
            for portfolio in &portfolios {
                print!("{}", formatters::format_portfolio_table(portfolio, &cols, as_of, sold));
            }
            Ok(())
        }
    }
}

pub fn dispatch_totals(action: TotalsCommands, ctx: &AppContext) -> Result<()> {
    match action {
        TotalsCommands::Update { fileportnames } => {
            let conn = ctx.connect()?;
            let names = reports::resolve_fileportnames(&conn, &fileportnames)?;
            let rows = reports::put_totals(&conn, &names, Local::now().naive_local())?;

            if ctx.json_output {
                return ctx.print_json(&rows);
            }
            if rows.is_empty() {
                println!("No portfolios to total");
                return Ok(());
            }
            if rows.iter().any(|r| r.market_closed) {
                println!("{} Market closed: totals recorded for {}", "ℹ".blue().bold(), rows[0].data_date);
            }
            println!("{}", formatters::format_totals_table(&rows));
            for row in rows.iter().filter(|r| !r.missing_quotes.is_empty()) {
                println!(
                    "{} {}: no quote for {} (valued at basis)",
                    "⚠".yellow().bold(),
                    row.fileportname,
                    row.missing_quotes.join(", ")
                );
            }
            Ok(())
        }
        TotalsCommands::Show => {
            let conn = ctx.connect()?;
            let params = db::get_port_params(&conn)?;

            if ctx.json_output {
                return ctx.print_json(&params);
            }
            if params.is_empty() {
                println!("No totals recorded. Run: trackport totals update");
                return Ok(());
            }
            println!("{}", formatters::format_params_table(&params));
            Ok(())
        }
    }
}
