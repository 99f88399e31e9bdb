//! Report column catalogue
//!
//! Every heading the position report can show, in display order, with the
//! sort mode the client-side table sorter should use for it.

use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;

use crate::portfolio::ReportLine;
use crate::utils::{format_decimal, format_percent, format_shares, format_signed, format_signed_percent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortMode {
    Text,
    Digit,
    Percent,
    IsoDate,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Text => "text",
            SortMode::Digit => "digit",
            SortMode::Percent => "percent",
            SortMode::IsoDate => "isoDate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub heading: &'static str,
    pub sort: SortMode,
}

const fn col(heading: &'static str, sort: SortMode) -> Column {
    Column { heading, sort }
}

pub const COLUMNS: [Column; 27] = [
    col("Symb", SortMode::Text),
    col("Shrs", SortMode::Digit),
    col("Purch", SortMode::Digit),
    col("Last", SortMode::Digit),
    col("Chg", SortMode::Digit),
    col("Day%", SortMode::Percent),
    col("Day", SortMode::Digit),
    col("MktVal", SortMode::Digit),
    col("Gain%", SortMode::Percent),
    col("Gain", SortMode::Digit),
    col("Basis", SortMode::Digit),
    col("Port%", SortMode::Percent),
    col("Low", SortMode::Digit),
    col("HL%", SortMode::Percent),
    col("High", SortMode::Digit),
    col("Days", SortMode::Digit),
    col("PurDate", SortMode::IsoDate),
    col("P/E", SortMode::Digit),
    col("Vol", SortMode::Digit),
    col("MkCap", SortMode::Digit),
    col("Low52", SortMode::Digit),
    col("HL52%", SortMode::Percent),
    col("High52", SortMode::Digit),
    col("CAGR", SortMode::Percent),
    col("DIV", SortMode::Digit),
    col("YLD", SortMode::Percent),
    col("ExDiv", SortMode::IsoDate),
];

pub const DEFAULT_HEADINGS: [&str; 12] = [
    "Symb", "Shrs", "Purch", "Last", "Chg", "Day%", "Day", "MktVal", "Gain%", "Gain", "Basis",
    "Port%",
];

/// Compact set for small screens
pub const HANDHELD_HEADINGS: [&str; 6] = ["Symb", "Last", "Day%", "MktVal", "Gain%", "Port%"];

/// Case-insensitive lookup
pub fn find_column(heading: &str) -> Option<Column> {
    COLUMNS
        .iter()
        .find(|c| c.heading.eq_ignore_ascii_case(heading.trim()))
        .copied()
}

/// Default columns plus any requested extras, kept in catalogue order.
/// Unknown names are ignored.
pub fn handle_cols(addcols: &[String]) -> Vec<Column> {
    COLUMNS
        .iter()
        .filter(|c| {
            DEFAULT_HEADINGS.contains(&c.heading)
                || addcols.iter().any(|a| a.trim().eq_ignore_ascii_case(c.heading))
        })
        .copied()
        .collect()
}

pub fn handheld_cols() -> Vec<Column> {
    COLUMNS
        .iter()
        .filter(|c| HANDHELD_HEADINGS.contains(&c.heading))
        .copied()
        .collect()
}

fn opt<T>(value: Option<T>, f: impl Fn(T) -> String) -> String {
    value.map(f).unwrap_or_default()
}

/// Display text of one cell; blank when the value does not apply
pub fn cell_text(line: &ReportLine, heading: &str) -> String {
    match heading {
        "Symb" => line.symbol.clone(),
        "Shrs" => format_shares(line.shares),
        "Purch" => format_decimal(line.purch),
        "Last" => opt(line.last, format_decimal),
        "Chg" => opt(line.chg, format_signed),
        "Day%" => opt(line.day_pct, |v| format_signed_percent(v, 2)),
        "Day" => format_signed(line.day),
        "MktVal" => format_decimal(line.mkt_val),
        "Gain%" => format_signed_percent(line.gain_pct, 1),
        "Gain" => format_signed(line.gain),
        "Basis" => format_decimal(line.basis),
        "Port%" => format_percent(line.port_pct, 1),
        "Low" => opt(line.low, format_decimal),
        "HL%" => opt(line.hl_pct, |v| format_percent(v, 1)),
        "High" => opt(line.high, format_decimal),
        "Days" => opt(line.days, |v| v.to_string()),
        "PurDate" => opt(line.pur_date, |d| d.format("%Y-%m-%d").to_string()),
        "P/E" => opt(line.pe, format_decimal),
        "Vol" => opt(line.vol, |v| v.to_string()),
        "MkCap" => opt(line.mk_cap, |v| v.to_string()),
        "Low52" => opt(line.low52, format_decimal),
        "HL52%" => opt(line.hl52_pct, |v| format_percent(v, 1)),
        "High52" => opt(line.high52, format_decimal),
        "CAGR" => opt(line.cagr, |v| format!("{:.1}%", v)),
        "DIV" => opt(line.div, format_decimal),
        "YLD" => opt(line.yld, |v| format_percent(v, 2)),
        "ExDiv" => opt(line.ex_div, |d| d.format("%Y-%m-%d").to_string()),
        _ => String::new(),
    }
}

/// CSS class used to color gains and losses
pub fn cell_class(line: &ReportLine, heading: &str) -> &'static str {
    let value = match heading {
        "Chg" | "Day%" => line.chg,
        "Day" => Some(line.day),
        "Gain" | "Gain%" => Some(line.gain),
        _ => None,
    };
    match value {
        Some(v) if v > Decimal::ZERO => "up",
        Some(v) if v < Decimal::ZERO => "down",
        _ => "",
    }
}

fn numeric_value(line: &ReportLine, heading: &str) -> Option<Decimal> {
    match heading {
        "Shrs" => Some(line.shares),
        "Purch" => Some(line.purch),
        "Last" => line.last,
        "Chg" => line.chg,
        "Day%" => line.day_pct,
        "Day" => Some(line.day),
        "MktVal" => Some(line.mkt_val),
        "Gain%" => Some(line.gain_pct),
        "Gain" => Some(line.gain),
        "Basis" => Some(line.basis),
        "Port%" => Some(line.port_pct),
        "Low" => line.low,
        "HL%" => line.hl_pct,
        "High" => line.high,
        "Days" => line.days.map(Decimal::from),
        "P/E" => line.pe,
        "Vol" => line.vol.map(Decimal::from),
        "MkCap" => line.mk_cap.map(Decimal::from),
        "Low52" => line.low52,
        "HL52%" => line.hl52_pct,
        "High52" => line.high52,
        "CAGR" => line.cagr.and_then(Decimal::from_f64_retain),
        "DIV" => line.div,
        "YLD" => line.yld,
        _ => None,
    }
}

/// Sort lines by a heading: text and dates ascending, numbers descending,
/// blanks last
pub fn sort_lines(lines: &mut [ReportLine], heading: &str) {
    let Some(column) = find_column(heading) else {
        return;
    };

    match column.sort {
        SortMode::Text | SortMode::IsoDate => {
            lines.sort_by(|a, b| {
                let (ka, kb) = (cell_text(a, column.heading), cell_text(b, column.heading));
                match (ka.is_empty(), kb.is_empty()) {
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    _ => ka.cmp(&kb),
                }
            });
        }
        SortMode::Digit | SortMode::Percent => {
            lines.sort_by(|a, b| {
                match (numeric_value(a, column.heading), numeric_value(b, column.heading)) {
                    (Some(x), Some(y)) => y.cmp(&x),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }
    }
}
