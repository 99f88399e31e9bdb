use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::importers::ExportOrder;

pub mod formatters;

#[derive(Parser, Debug)]
#[command(name = "trackport")]
#[command(version, about = "Personal portfolio tracker with quotes and HTML reports")]
#[command(
    long_about = "Record transactions for brokerage portfolios, refresh quotes from finviz and Yahoo Finance, value positions, keep daily totals and render HTML reports (also as a CGI script)."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Show informational log messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Show debug log messages
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Database file (overrides config and TRACKPORT_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and its tables
    Init,

    /// Add, close, delete, list, import and export transactions
    Transactions {
        #[command(subcommand)]
        action: TransactionCommands,
    },

    /// Portfolio names
    Ports {
        #[command(subcommand)]
        action: PortsCommands,
    },

    /// Quote refresh and lookup
    Quotes {
        #[command(subcommand)]
        action: QuoteCommands,
    },

    /// Render the HTML position report
    Report(ReportArgs),

    /// Show valued positions in the terminal
    Portfolio {
        #[command(subcommand)]
        action: PortfolioCommands,
    },

    /// Daily totals (port_history / port_param)
    Totals {
        #[command(subcommand)]
        action: TotalsCommands,
    },

    /// Rebuild, show and plot portfolio history
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Market holidays used for trading-day arithmetic
    Holidays {
        #[command(subcommand)]
        action: HolidayCommands,
    },

    /// Extra symbols to keep quoted (indices, watch list)
    Tickers {
        #[command(subcommand)]
        action: TickerCommands,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SecurityKind {
    Stock,
    Call,
    Put,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RowKind {
    Long,
    Cash,
}

#[derive(Subcommand, Debug)]
pub enum TransactionCommands {
    /// Open a stock or option position
    Add {
        /// Portfolio in file:port form
        fileportname: String,
        symbol: String,
        /// Number of shares (negative for a short)
        #[arg(allow_negative_numbers = true)]
        shares: Decimal,
        /// Price per share
        price: Decimal,
        /// Open date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum, default_value = "stock")]
        kind: SecurityKind,
        /// Option expiration (YYYY-MM-DD)
        #[arg(long)]
        expiration: Option<NaiveDate>,
        /// Option strike
        #[arg(long)]
        strike: Option<Decimal>,
        #[arg(long)]
        sector: Option<String>,
    },

    /// Record a cash movement (deposit, dividend, interest, commission)
    Cash {
        fileportname: String,
        /// Amount; negative for withdrawals and fees
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Opening balance instead of an intermediate movement
        #[arg(long)]
        initial: bool,
    },

    /// Close an open transaction
    Close {
        id: i64,
        price: Decimal,
        /// Close date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete a transaction
    Delete { id: i64 },

    /// List transactions
    List {
        #[arg(long = "fpn")]
        fileportname: Option<String>,
        /// Only open rows
        #[arg(long, conflicts_with = "closed")]
        open: bool,
        /// Only closed rows
        #[arg(long)]
        closed: bool,
        #[arg(long, value_enum)]
        kind: Option<RowKind>,
        #[arg(long)]
        symbol: Option<String>,
    },

    /// Import transactions from a CSV file
    Import { file: PathBuf },

    /// Export transactions as CSV
    Export {
        #[arg(long = "fpn")]
        fileportname: Option<String>,
        #[arg(long, value_enum, default_value = "open")]
        order: ExportOrder,
        /// Output file (default stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PortsCommands {
    /// List known portfolio names
    List,
}

#[derive(Subcommand, Debug)]
pub enum QuoteCommands {
    /// Refresh quotes for open positions and ticker symbols
    Update {
        /// Limit to these portfolios
        #[arg(long = "fpn")]
        fileportnames: Vec<String>,
    },

    /// Show the cached quote of a symbol
    Get {
        symbol: String,
        /// Fetch it now instead of reading the cache
        #[arg(long)]
        fetch: bool,
        /// Single-line output: close last dayhigh daylow yearlow yearhigh volume pe net p_change bid ask
        #[arg(long)]
        line: bool,
    },

    /// Store a manual quote
    Set {
        symbol: String,
        last: Decimal,
        /// Previous close
        #[arg(long)]
        close: Option<Decimal>,
    },

    /// List cached quotes
    List,
}

#[derive(clap::Args, Debug, Default)]
pub struct ReportArgs {
    /// Portfolios to include (default all)
    #[arg(long = "fpn")]
    pub fileportnames: Vec<String>,

    /// Extra columns beyond the defaults
    #[arg(long)]
    pub addcols: Vec<String>,

    /// Merge the selected portfolios into one
    #[arg(long)]
    pub combined: bool,

    /// Show closed positions
    #[arg(long)]
    pub sold: bool,

    #[arg(long)]
    pub showname: bool,

    #[arg(long)]
    pub showsector: bool,

    /// Compact column set
    #[arg(long)]
    pub handheld: bool,

    /// Show quote source and time
    #[arg(long)]
    pub method: bool,

    /// Sort rows by a column heading
    #[arg(long)]
    pub sort: Option<String>,

    /// Page title
    #[arg(long)]
    pub viewname: Option<String>,

    /// Write the page to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run as a CGI script: options come from QUERY_STRING
    #[arg(long)]
    pub cgi: bool,
}

#[derive(Subcommand, Debug)]
pub enum PortfolioCommands {
    /// Valued positions, cash and totals
    Show {
        #[arg(long = "fpn")]
        fileportnames: Vec<String>,
        #[arg(long)]
        combined: bool,
        #[arg(long)]
        addcols: Vec<String>,
        /// Include closed positions
        #[arg(long)]
        sold: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum TotalsCommands {
    /// Value portfolios and store today's snapshot
    Update {
        #[arg(long = "fpn")]
        fileportnames: Vec<String>,
    },
    /// Latest stored figures per portfolio
    Show,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// Recompute port_history from transactions and historical prices
    Rebuild {
        fileportname: String,
        /// Last day to rebuild (default today)
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    /// Print stored history
    Show { fileportname: String },
    /// Write an HTML chart of portfolio totals
    Plot {
        #[arg(long = "fpn")]
        fileportnames: Vec<String>,
        #[arg(long, default_value = "Portfolio History")]
        title: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum HolidayCommands {
    Add {
        date: NaiveDate,
        #[arg(long)]
        name: Option<String>,
    },
    List,
    Remove { date: NaiveDate },
}

#[derive(Subcommand, Debug)]
pub enum TickerCommands {
    Add { symbol: String },
    List,
    Remove { symbol: String },
}
