//! History chart: one line per portfolio of `port_history.total`,
//! rendered as inline SVG inside an HTML page.

use anyhow::{Context, Result};
use askama::Template;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::db;
use crate::utils::format_decimal;

const CHART_WIDTH: f64 = 900.0;
const CHART_HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 40.0;

const COLORS: [&str; 6] = ["#1f77b4", "#d62728", "#2ca02c", "#ff7f0e", "#9467bd", "#8c564b"];

/// One portfolio's totals over time
#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    pub points: Vec<(NaiveDate, f64)>,
}

pub fn load_series(conn: &Connection, fileportnames: &[String]) -> Result<Vec<Series>> {
    let mut series = Vec::with_capacity(fileportnames.len());
    for fpn in fileportnames {
        let points: Vec<(NaiveDate, f64)> = db::list_port_history(conn, fpn)?
            .into_iter()
            .filter_map(|s| s.total.to_f64().map(|t| (s.date, t)))
            .collect();
        debug!("{}: {} history points", fpn, points.len());
        series.push(Series {
            name: fpn.clone(),
            points,
        });
    }
    Ok(series)
}

/// Line chart over a shared date axis. Empty input gives an empty string.
pub fn generate_history_svg(series: &[Series]) -> String {
    let all: Vec<&(NaiveDate, f64)> = series.iter().flat_map(|s| s.points.iter()).collect();
    let (Some(first_date), Some(last_date)) = (
        all.iter().map(|p| p.0).min(),
        all.iter().map(|p| p.0).max(),
    ) else {
        return String::new();
    };

    let min_total = all.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_total = all.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let range = (max_total - min_total).max(1.0);
    let span_days = ((last_date - first_date).num_days() as f64).max(1.0);

    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let x_scale = |date: NaiveDate| -> f64 {
        MARGIN_LEFT + ((date - first_date).num_days() as f64 / span_days) * plot_width
    };
    let y_scale = |v: f64| -> f64 { MARGIN_TOP + plot_height - ((v - min_total) / range) * plot_height };

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg width="{}" height="{}" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"#,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        CHART_HEIGHT - MARGIN_BOTTOM,
        CHART_WIDTH - MARGIN_RIGHT,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));

    for (amount, y) in [(max_total, MARGIN_TOP + 5.0), (min_total, CHART_HEIGHT - MARGIN_BOTTOM)] {
        let text = Decimal::from_f64_retain(amount)
            .map(format_decimal)
            .unwrap_or_default();
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{}</text>\n",
            MARGIN_LEFT - 5.0,
            y,
            text
        ));
    }
    for (date, anchor) in [(first_date, "start"), (last_date, "end")] {
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{}\" text-anchor=\"{}\" font-size=\"10\" fill=\"#666\">{}</text>\n",
            x_scale(date),
            CHART_HEIGHT - MARGIN_BOTTOM + 15.0,
            anchor,
            date
        ));
    }

    for (idx, s) in series.iter().enumerate() {
        if s.points.is_empty() {
            continue;
        }
        let color = COLORS[idx % COLORS.len()];

        let mut path_data = String::new();
        for (i, (date, total)) in s.points.iter().enumerate() {
            let cmd = if i == 0 { "M" } else { " L" };
            path_data.push_str(&format!("{} {:.1} {:.1}", cmd, x_scale(*date), y_scale(*total)));
        }
        svg.push_str(&format!(
            "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\"/>\n",
            path_data, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"{}\">{}</text>\n",
            MARGIN_LEFT + 10.0,
            MARGIN_TOP + 12.0 * (idx as f64 + 1.0),
            color,
            escape_text(&s.name)
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

/// Escape text content for inline SVG
fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Template)]
#[template(path = "history_plot.html")]
struct PlotTemplate<'a> {
    title: &'a str,
    chart_svg: String,
    portfolios: Vec<String>,
}

/// Full HTML page with the chart
pub fn render_plot_page(title: &str, series: &[Series]) -> Result<String> {
    let page = PlotTemplate {
        title,
        chart_svg: generate_history_svg(series),
        portfolios: series.iter().map(|s| s.name.clone()).collect(),
    };
    page.render().context("Failed to render history plot")
}
