// Reports module - position report, daily totals, history rebuild and plot

pub mod columns;
pub mod history;
pub mod html;
pub mod plot;
pub mod query;
pub mod totals;

use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

use crate::db;
use crate::portfolio::{combine_positions, CombinedPortfolio};

pub use html::{cgi_response, render_report};
pub use query::{handle_cgi_args, parse_query_string, ReportQuery};
pub use totals::put_totals;

/// Name used when several portfolios are merged into one view
pub const COMBINED_NAME: &str = "combined";

/// Portfolio names to report on: the requested ones, or every known one
pub fn resolve_fileportnames(conn: &Connection, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        Ok(db::get_fileportnames(conn)?.into_iter().collect())
    } else {
        Ok(requested.to_vec())
    }
}

/// Value each portfolio against the cached quotes. With `combined` the
/// transactions of all of them are merged into a single portfolio.
pub fn load_portfolios(
    conn: &Connection,
    fileportnames: &[String],
    combined: bool,
) -> Result<Vec<CombinedPortfolio>> {
    let quotes = db::get_all_quotes(conn)?;

    if combined {
        let mut transactions = Vec::new();
        for fpn in fileportnames {
            transactions.extend(db::get_portfolio_transactions(conn, fpn)?);
        }
        transactions.sort_by_key(|t| (t.open_date, t.id));
        debug!("combined {} portfolios, {} transactions", fileportnames.len(), transactions.len());
        return Ok(vec![combine_positions(COMBINED_NAME, &transactions, &quotes)]);
    }

    fileportnames
        .iter()
        .map(|fpn| {
            let transactions = db::get_portfolio_transactions(conn, fpn)?;
            Ok(combine_positions(fpn, &transactions, &quotes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Descriptor, Transaction};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_combined_merges_portfolios() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_initialized(Some(dir.path().join("r.db"))).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        for fpn in ["port:a", "port:b"] {
            db::insert_transaction(&conn, &Transaction::cash(fpn, Descriptor::Initial, dec!(100), day)).unwrap();
        }

        let names = resolve_fileportnames(&conn, &[]).unwrap();
        assert_eq!(names, vec!["port:a", "port:b"]);

        let separate = load_portfolios(&conn, &names, false).unwrap();
        assert_eq!(separate.len(), 2);
        assert_eq!(separate[1].totals.total_value, dec!(100));

        let merged = load_portfolios(&conn, &names, true).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].fileportname, COMBINED_NAME);
        assert_eq!(merged[0].totals.total_value, dec!(200));
    }
}
