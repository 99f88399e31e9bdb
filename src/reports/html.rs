// HTML position report rendered through askama

use anyhow::{Context, Result};
use askama::Template;
use chrono::NaiveDate;

use super::columns::{self, Column};
use super::query::ReportQuery;
use crate::portfolio::{CombinedPortfolio, PositionGroup, ReportLine};
use crate::utils::{format_currency, format_decimal, format_shares, format_signed, format_signed_percent};

pub const CGI_HEADER: &str = "Content-type: text/html\n\n";

/// A rendered heading with the sort mode the table sorter reads
struct HeadingView {
    label: String,
    sort: &'static str,
}

struct CellView {
    text: String,
    class: &'static str,
}

struct RowView {
    cells: Vec<CellView>,
    unquoted: bool,
}

struct TableView {
    title: &'static str,
    rows: Vec<RowView>,
}

struct ClosedView {
    symbol: String,
    shares: String,
    basis: String,
    proceeds: String,
    realized: String,
    realized_pct: String,
    last_close: String,
}

struct PortView {
    name: String,
    tables: Vec<TableView>,
    cash_row: RowView,
    closed: Vec<ClosedView>,
    totals: Vec<(&'static str, String)>,
    missing_quotes: Vec<String>,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate {
    title: String,
    as_of: String,
    headings: Vec<HeadingView>,
    ports: Vec<PortView>,
    show_sold: bool,
}

/// Columns for a request: handheld set or defaults plus addcols, then the
/// Name/Sector/Method extras
fn headings(query: &ReportQuery, default_addcols: &[String]) -> Vec<HeadingView> {
    let cols: Vec<Column> = if query.handheld {
        columns::handheld_cols()
    } else {
        let mut wanted = default_addcols.to_vec();
        wanted.extend(query.addcols.iter().cloned());
        columns::handle_cols(&wanted)
    };

    let mut views: Vec<HeadingView> = Vec::with_capacity(cols.len() + 3);
    for col in cols {
        views.push(HeadingView {
            label: col.heading.to_string(),
            sort: col.sort.as_str(),
        });
        if col.heading == "Symb" {
            if query.showname {
                views.push(HeadingView { label: "Name".to_string(), sort: "text" });
            }
            if query.showsector {
                views.push(HeadingView { label: "Sector".to_string(), sort: "text" });
            }
        }
    }
    if query.method {
        views.push(HeadingView { label: "Method".to_string(), sort: "text" });
    }
    views
}

fn method_text(portfolio: &CombinedPortfolio, line: &ReportLine) -> String {
    match portfolio.quote_for(&line.symbol) {
        Some(quote) => match quote.updated_at {
            Some(at) => format!("{} {}", quote.method, at.format("%Y-%m-%d %H:%M")),
            None => quote.method.clone(),
        },
        None if line.group.is_none() => String::new(),
        None => "none".to_string(),
    }
}

fn row_view(portfolio: &CombinedPortfolio, line: &ReportLine, headings: &[HeadingView]) -> RowView {
    let cells = headings
        .iter()
        .map(|h| {
            let text = match h.label.as_str() {
                "Name" => line.name.clone().unwrap_or_default(),
                "Sector" => line.sector.clone().unwrap_or_default(),
                "Method" => method_text(portfolio, line),
                other => columns::cell_text(line, other),
            };
            CellView {
                text,
                class: columns::cell_class(line, &h.label),
            }
        })
        .collect();
    RowView {
        cells,
        unquoted: !line.quoted,
    }
}

fn port_view(
    portfolio: &CombinedPortfolio,
    query: &ReportQuery,
    headings: &[HeadingView],
    as_of: NaiveDate,
) -> PortView {
    let mut tables = Vec::new();
    for (group, title) in [
        (PositionGroup::Longs, "Longs"),
        (PositionGroup::Shorts, "Shorts"),
        (PositionGroup::Options, "Options"),
    ] {
        let mut lines = portfolio.lines_for(group, as_of);
        if lines.is_empty() {
            continue;
        }
        if let Some(sort) = &query.sort {
            columns::sort_lines(&mut lines, sort);
        }
        tables.push(TableView {
            title,
            rows: lines.iter().map(|l| row_view(portfolio, l, headings)).collect(),
        });
    }

    let closed = if query.sold {
        portfolio
            .closed
            .values()
            .map(|c| ClosedView {
                symbol: c.symbol.clone(),
                shares: format_shares(c.shares),
                basis: format_decimal(c.basis),
                proceeds: format_decimal(c.proceeds),
                realized: format_signed(c.realized()),
                realized_pct: format_signed_percent(c.realized_pct(), 1),
                last_close: c.last_close.map(|d| d.to_string()).unwrap_or_default(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let t = &portfolio.totals;
    let totals = vec![
        ("Cash", format_currency(t.cash)),
        ("Open value", format_currency(t.open_value)),
        ("Total", format_currency(t.total_value)),
        ("Day change", format_signed(t.day_change)),
        ("Realized", format_signed(t.realized)),
        ("Unrealized", format_signed(t.unrealized)),
    ];

    PortView {
        name: portfolio.fileportname.clone(),
        tables,
        cash_row: row_view(portfolio, &portfolio.cash_line(), headings),
        closed,
        totals,
        missing_quotes: portfolio.missing_quotes.clone(),
    }
}

/// Render the position report page for the given portfolios
pub fn render_report(
    portfolios: &[CombinedPortfolio],
    query: &ReportQuery,
    default_addcols: &[String],
    as_of: NaiveDate,
) -> Result<String> {
    let headings = headings(query, default_addcols);
    let ports = portfolios
        .iter()
        .map(|p| port_view(p, query, &headings, as_of))
        .collect();

    let title = query
        .viewname
        .clone()
        .unwrap_or_else(|| "Portfolio Report".to_string());

    let page = ReportTemplate {
        title,
        as_of: as_of.to_string(),
        headings,
        ports,
        show_sold: query.sold,
    };
    page.render().context("Failed to render report")
}

/// Prefix a page with the CGI content-type header
pub fn cgi_response(html: &str) -> String {
    format!("{}{}", CGI_HEADER, html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Descriptor, Quote, Transaction};
    use crate::portfolio::combine_positions;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn portfolio() -> CombinedPortfolio {
        let txs = vec![
            Transaction::cash("port:a", Descriptor::Initial, dec!(10000), d(2024, 1, 1)),
            Transaction::open_long("port:a", "IBM", Descriptor::Stock, dec!(10), dec!(100), d(2024, 1, 2))
                .with_sector(Some("Tech".to_string())),
            Transaction::open_long("port:a", "ZZZZ", Descriptor::Stock, dec!(1), dec!(5), d(2024, 1, 2)),
            Transaction::open_long("port:a", "MSFT", Descriptor::Stock, dec!(4), dec!(300), d(2024, 1, 2))
                .closed_at(dec!(350), d(2024, 2, 2)),
        ];
        let mut quote = Quote {
            symbol: "IBM".to_string(),
            name: Some("International Business Machines".to_string()),
            last: dec!(110),
            close: Some(dec!(108)),
            method: "finviz".to_string(),
            success: true,
            ..Default::default()
        };
        quote.derive_change();
        let quotes: HashMap<String, Quote> = [("IBM".to_string(), quote)].into_iter().collect();
        combine_positions("port:a", &txs, &quotes)
    }

    #[test]
    fn test_report_contains_positions_and_totals() {
        let html = render_report(&[portfolio()], &ReportQuery::default(), &[], d(2024, 3, 1)).unwrap();

        assert!(html.contains("port:a"));
        assert!(html.contains("IBM"));
        assert!(html.contains("CASH"));
        assert!(html.contains("data-sort=\"percent\""));
        assert!(html.contains("No quote: ZZZZ"));
        assert!(!html.contains("Closed positions"));
        assert!(html.contains("Portfolio Report"));
    }

    #[test]
    fn test_query_options_shape_the_page() {
        let query = ReportQuery {
            showname: true,
            showsector: true,
            sold: true,
            method: true,
            viewname: Some("Mine".to_string()),
            addcols: vec!["ExDiv".to_string()],
            ..Default::default()
        };
        let html = render_report(&[portfolio()], &query, &[], d(2024, 3, 1)).unwrap();

        assert!(html.contains("<title>Mine</title>"));
        assert!(html.contains("International Business Machines"));
        assert!(html.contains(">Sector<"));
        assert!(html.contains(">ExDiv<"));
        assert!(html.contains("Closed positions"));
        assert!(html.contains("+200.00"));
        assert!(html.contains("finviz"));
    }

    #[test]
    fn test_handheld_is_compact() {
        let query = ReportQuery {
            handheld: true,
            ..Default::default()
        };
        let html = render_report(&[portfolio()], &query, &[], d(2024, 3, 1)).unwrap();
        assert!(!html.contains(">Basis<"));
        assert!(html.contains(">MktVal<"));
    }

    #[test]
    fn test_cgi_response_header() {
        let out = cgi_response("<html></html>");
        assert!(out.starts_with("Content-type: text/html\n\n<html>"));
    }
}
