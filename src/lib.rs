//! Trackport - personal portfolio tracker
//!
//! Records stock, option and cash transactions per portfolio, refreshes
//! quotes from finviz and Yahoo Finance, values positions and renders the
//! result as terminal tables or an HTML report (also served as CGI).
//! Daily totals and rebuilt history are kept in the same SQLite database.

pub mod calendar;
pub mod cli;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod importers;
pub mod portfolio;
pub mod quotes;
pub mod reports;
pub mod utils;
