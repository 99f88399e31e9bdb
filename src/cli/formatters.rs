//! Output formatting module for CLI display
//!
//! Terminal tables for positions, transactions, quotes and totals. Data is
//! computed elsewhere; these functions only lay it out.

use chrono::NaiveDate;
use colored::Colorize;
use rust_decimal::Decimal;
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::db::{MarketHoliday, PortParam, PortSnapshot, Quote, Transaction};
use crate::portfolio::{CombinedPortfolio, PositionGroup};
use crate::reports::columns::{self, Column};
use crate::reports::totals::TotalsRow;
use crate::utils::{format_currency, format_decimal, format_shares, format_signed, format_signed_percent};

fn colored_signed(value: Decimal) -> String {
    let text = format_signed(value);
    if value > Decimal::ZERO {
        text.green().to_string()
    } else if value < Decimal::ZERO {
        text.red().to_string()
    } else {
        text
    }
}

/// Positions of one portfolio grouped as longs, shorts, options and cash
pub fn format_portfolio_table(
    portfolio: &CombinedPortfolio,
    cols: &[Column],
    as_of: NaiveDate,
    show_sold: bool,
) -> String {
    let mut output = format!("\n{} {}\n", "📊".cyan().bold(), portfolio.fileportname.bold());

    for (group, title) in [
        (PositionGroup::Longs, "Longs"),
        (PositionGroup::Shorts, "Shorts"),
        (PositionGroup::Options, "Options"),
    ] {
        let lines = portfolio.lines_for(group, as_of);
        if lines.is_empty() {
            continue;
        }

        let mut builder = Builder::default();
        builder.push_record(cols.iter().map(|c| c.heading.to_string()));
        for line in &lines {
            builder.push_record(cols.iter().map(|c| {
                let text = columns::cell_text(line, c.heading);
                match columns::cell_class(line, c.heading) {
                    "up" => text.green().to_string(),
                    "down" => text.red().to_string(),
                    _ => text,
                }
            }));
        }

        let mut table = builder.build();
        table.with(Style::modern());
        table.modify(Columns::new(1..), Alignment::right());

        output.push_str(&format!("\n{}\n{}\n", title.bold(), table));
    }

    if show_sold && !portfolio.closed.is_empty() {
        #[derive(Tabled)]
        struct ClosedRow {
            #[tabled(rename = "Symb")]
            symbol: String,
            #[tabled(rename = "Shrs")]
            shares: String,
            #[tabled(rename = "Basis")]
            basis: String,
            #[tabled(rename = "Proceeds")]
            proceeds: String,
            #[tabled(rename = "Realized")]
            realized: String,
            #[tabled(rename = "Realized%")]
            realized_pct: String,
        }

        let rows: Vec<ClosedRow> = portfolio
            .closed
            .values()
            .map(|c| ClosedRow {
                symbol: c.symbol.clone(),
                shares: format_shares(c.shares),
                basis: format_decimal(c.basis),
                proceeds: format_decimal(c.proceeds),
                realized: colored_signed(c.realized()),
                realized_pct: format_signed_percent(c.realized_pct(), 1),
            })
            .collect();

        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(1..), Alignment::right());
        output.push_str(&format!("\n{}\n{}\n", "Closed".bold(), table));
    }

    let t = &portfolio.totals;
    output.push_str(&format!("\n{}", "━".repeat(60).bright_black()));
    output.push_str(&format!("\n{:<16} {}", "Cash:".bold(), format_currency(t.cash)));
    output.push_str(&format!("\n{:<16} {}", "Open value:".bold(), format_currency(t.open_value)));
    output.push_str(&format!("\n{:<16} {}", "Total:".bold(), format_currency(t.total_value)));
    output.push_str(&format!("\n{:<16} {}", "Day change:".bold(), colored_signed(t.day_change)));
    output.push_str(&format!("\n{:<16} {}", "Realized:".bold(), colored_signed(t.realized)));
    output.push_str(&format!("\n{:<16} {}\n", "Unrealized:".bold(), colored_signed(t.unrealized)));

    if !portfolio.missing_quotes.is_empty() {
        output.push_str(&format!(
            "{} No quote (valued at basis): {}\n",
            "⚠".yellow().bold(),
            portfolio.missing_quotes.join(", ")
        ));
    }

    output
}

pub fn format_transactions_table(transactions: &[Transaction]) -> String {
    #[derive(Tabled)]
    struct TransactionRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Portfolio")]
        fileportname: String,
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Kind")]
        descriptor: String,
        #[tabled(rename = "Shares")]
        shares: String,
        #[tabled(rename = "Open")]
        open_price: String,
        #[tabled(rename = "Opened")]
        open_date: String,
        #[tabled(rename = "Close")]
        close_price: String,
        #[tabled(rename = "Closed")]
        close_date: String,
    }

    let rows: Vec<TransactionRow> = transactions
        .iter()
        .map(|t| TransactionRow {
            id: t.id.map(|id| id.to_string()).unwrap_or_default(),
            fileportname: t.fileportname.clone(),
            symbol: t.trait_key().display_symbol(),
            descriptor: t.descriptor.as_str().to_string(),
            shares: format_shares(t.shares),
            open_price: format_decimal(t.open_price),
            open_date: t.open_date.to_string(),
            close_price: t.close_price.map(format_decimal).unwrap_or_default(),
            close_date: t.close_date.map(|d| d.to_string()).unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(4..6), Alignment::right());
    table.to_string()
}

pub fn format_quotes_table(quotes: &[Quote]) -> String {
    #[derive(Tabled)]
    struct QuoteRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Last")]
        last: String,
        #[tabled(rename = "Chg")]
        net: String,
        #[tabled(rename = "Chg%")]
        p_change: String,
        #[tabled(rename = "Method")]
        method: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<QuoteRow> = quotes
        .iter()
        .map(|q| QuoteRow {
            symbol: q.symbol.clone(),
            last: format_decimal(q.last),
            net: colored_signed(q.net),
            p_change: format_signed_percent(q.p_change, 2),
            method: q.method.clone(),
            status: if q.success {
                "ok".green().to_string()
            } else {
                q.errormsg.clone().unwrap_or_else(|| "failed".to_string()).red().to_string()
            },
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..4), Alignment::right());
    table.to_string()
}

pub fn format_totals_table(rows: &[TotalsRow]) -> String {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Portfolio")]
        fileportname: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Cash")]
        cash: String,
        #[tabled(rename = "Open value")]
        open_value: String,
        #[tabled(rename = "Total")]
        total: String,
        #[tabled(rename = "Day gain")]
        day_gain: String,
        #[tabled(rename = "Day %")]
        day_pct: String,
    }

    let table_rows: Vec<Row> = rows
        .iter()
        .map(|r| Row {
            fileportname: r.fileportname.clone(),
            date: r.data_date.to_string(),
            cash: format_decimal(r.totals.cash),
            open_value: format_decimal(r.totals.open_value),
            total: format_decimal(r.totals.total_value),
            day_gain: r.day_gain.map(|g| colored_signed(g.amount)).unwrap_or_else(|| "-".to_string()),
            day_pct: r
                .day_gain
                .and_then(|g| g.percent)
                .map(|p| format_signed_percent(p, 2))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(&table_rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());
    table.to_string()
}

pub fn format_params_table(params: &[PortParam]) -> String {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Portfolio")]
        fileportname: String,
        #[tabled(rename = "Cash")]
        cash: String,
        #[tabled(rename = "Open value")]
        open_value: String,
        #[tabled(rename = "Total")]
        total: String,
        #[tabled(rename = "Realized")]
        realized: String,
        #[tabled(rename = "Day gain")]
        day_gain: String,
        #[tabled(rename = "Updated")]
        updated_at: String,
    }

    let rows: Vec<Row> = params
        .iter()
        .map(|p| Row {
            fileportname: p.fileportname.clone(),
            cash: format_decimal(p.cash),
            open_value: format_decimal(p.open_value),
            total: format_decimal(p.total_value),
            realized: format_signed(p.realized),
            day_gain: p.day_gain.map(colored_signed).unwrap_or_else(|| "-".to_string()),
            updated_at: p
                .updated_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..6), Alignment::right());
    table.to_string()
}

pub fn format_history_table(history: &[PortSnapshot]) -> String {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Cash")]
        cash: String,
        #[tabled(rename = "Open value")]
        open_value: String,
        #[tabled(rename = "Total")]
        total: String,
        #[tabled(rename = "Day gain")]
        day_gain: String,
    }

    let rows: Vec<Row> = history
        .iter()
        .map(|s| Row {
            date: s.date.to_string(),
            cash: format_decimal(s.cash),
            open_value: format_decimal(s.open_value),
            total: format_decimal(s.total),
            day_gain: s.day_gain.map(colored_signed).unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

pub fn format_holidays_table(holidays: &[MarketHoliday]) -> String {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Name")]
        name: String,
    }

    let rows: Vec<Row> = holidays
        .iter()
        .map(|h| Row {
            date: h.date.to_string(),
            name: h.name.clone().unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}

/// Format empty portfolio message
pub fn format_empty_portfolio() -> String {
    format!(
        "{} No transactions found\nAdd some first using: {} transactions add <file:port> <symbol> <shares> <price>\n",
        "ℹ".blue().bold(),
        "trackport".bold()
    )
}
