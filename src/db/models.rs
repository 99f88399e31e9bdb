use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PortfolioError;

/// Kind of row in the transaction list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PositionKind {
    Long,
    Cash,
}

impl PositionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionKind::Long => "long",
            PositionKind::Cash => "cash",
        }
    }
}

impl FromStr for PositionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(PositionKind::Long),
            "cash" => Ok(PositionKind::Cash),
            _ => Err(()),
        }
    }
}

/// What a transaction holds: a security (stock/call/put) or a cash movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Descriptor {
    Stock,
    Call,
    Put,
    Initial,      // opening cash balance
    Intermediate, // dividends, interest, commissions, adjustments
}

impl Descriptor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Descriptor::Stock => "stock",
            Descriptor::Call => "call",
            Descriptor::Put => "put",
            Descriptor::Initial => "initial",
            Descriptor::Intermediate => "intermediate",
        }
    }

    pub fn is_option(&self) -> bool {
        matches!(self, Descriptor::Call | Descriptor::Put)
    }

    pub fn is_cash(&self) -> bool {
        matches!(self, Descriptor::Initial | Descriptor::Intermediate)
    }
}

impl FromStr for Descriptor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(Descriptor::Stock),
            "call" | "c" => Ok(Descriptor::Call),
            "put" | "p" => Ok(Descriptor::Put),
            "initial" => Ok(Descriptor::Initial),
            "intermediate" | "dividend" | "interest" | "commission" => {
                Ok(Descriptor::Intermediate)
            }
            _ => Err(()),
        }
    }
}

/// Portfolio identifier in `file:port` form (e.g. `port:fluffgazer`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilePortName {
    pub file: String,
    pub port: String,
}

impl FilePortName {
    pub fn new(file: &str, port: &str) -> Self {
        Self {
            file: file.to_string(),
            port: port.to_string(),
        }
    }
}

impl fmt::Display for FilePortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.port)
    }
}

impl FromStr for FilePortName {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((file, port)) if !file.is_empty() && !port.is_empty() && !port.contains(':') => {
                Ok(FilePortName::new(file, port))
            }
            _ => Err(PortfolioError::ParseError(format!(
                "invalid fileportname '{}', expected <file>:<port>",
                s
            ))),
        }
    }
}

/// Grouping key for combining transactions into one position
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PositionTrait {
    pub symbol: String,
    pub descriptor: Descriptor,
    pub strike: Option<Decimal>,
    pub expiration: Option<NaiveDate>,
}

impl PositionTrait {
    /// Symbol used for quotes and display; options use the OCC form
    pub fn display_symbol(&self) -> String {
        match (self.descriptor, self.expiration, self.strike) {
            (Descriptor::Call | Descriptor::Put, Some(expiration), Some(strike)) => {
                option_symbol(&self.symbol, self.descriptor, expiration, strike)
            }
            _ => self.symbol.clone(),
        }
    }
}

/// Build an OCC option symbol: `AAPL240119C00150500`
pub fn option_symbol(
    underlying: &str,
    descriptor: Descriptor,
    expiration: NaiveDate,
    strike: Decimal,
) -> String {
    let kind = if descriptor == Descriptor::Put { 'P' } else { 'C' };
    let thousandths = (strike * Decimal::from(1000))
        .trunc()
        .to_i64()
        .unwrap_or(0);
    format!(
        "{}{}{}{:08}",
        underlying.to_uppercase(),
        expiration.format("%y%m%d"),
        kind,
        thousandths
    )
}

/// Row of the transaction list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Option<i64>,
    pub fileportname: String,
    pub symbol: String,
    pub sector: Option<String>,
    pub position: PositionKind,
    pub descriptor: Descriptor,
    pub shares: Decimal,
    pub open_price: Decimal, // amount for cash rows
    pub open_date: NaiveDate,
    pub closed: bool,
    pub close_price: Option<Decimal>,
    pub close_date: Option<NaiveDate>,
    pub expiration: Option<NaiveDate>,
    pub strike: Option<Decimal>,
}

impl Transaction {
    /// New open long (stock or option) transaction
    pub fn open_long(
        fileportname: &str,
        symbol: &str,
        descriptor: Descriptor,
        shares: Decimal,
        open_price: Decimal,
        open_date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            fileportname: fileportname.to_string(),
            symbol: symbol.to_uppercase(),
            sector: None,
            position: PositionKind::Long,
            descriptor,
            shares,
            open_price,
            open_date,
            closed: false,
            close_price: None,
            close_date: None,
            expiration: None,
            strike: None,
        }
    }

    /// New cash movement; the amount travels in `open_price`
    pub fn cash(
        fileportname: &str,
        descriptor: Descriptor,
        amount: Decimal,
        open_date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            fileportname: fileportname.to_string(),
            symbol: "CASH".to_string(),
            sector: None,
            position: PositionKind::Cash,
            descriptor,
            shares: Decimal::ONE,
            open_price: amount,
            open_date,
            closed: false,
            close_price: None,
            close_date: None,
            expiration: None,
            strike: None,
        }
    }

    pub fn with_option(mut self, expiration: NaiveDate, strike: Decimal) -> Self {
        self.expiration = Some(expiration);
        self.strike = Some(strike);
        self
    }

    pub fn with_sector(mut self, sector: Option<String>) -> Self {
        self.sector = sector;
        self
    }

    pub fn closed_at(mut self, close_price: Decimal, close_date: NaiveDate) -> Self {
        self.closed = true;
        self.close_price = Some(close_price);
        self.close_date = Some(close_date);
        self
    }

    pub fn trait_key(&self) -> PositionTrait {
        PositionTrait {
            symbol: self.symbol.clone(),
            descriptor: self.descriptor,
            strike: self.strike,
            expiration: self.expiration,
        }
    }

    pub fn is_option(&self) -> bool {
        self.expiration.is_some()
    }

    /// Realized gain of a closed row: shares × (close − open)
    pub fn realized_gain(&self) -> Decimal {
        match (self.closed, self.close_price) {
            (true, Some(close)) => self.shares * (close - self.open_price),
            _ => Decimal::ZERO,
        }
    }

    /// Check structural rules before a row is stored
    pub fn validate(&self) -> Result<(), PortfolioError> {
        self.fileportname.parse::<FilePortName>()?;

        match self.position {
            PositionKind::Cash => {
                if !self.descriptor.is_cash() {
                    return Err(PortfolioError::ValidationError(format!(
                        "cash rows must be initial or intermediate, got {}",
                        self.descriptor.as_str()
                    )));
                }
                if self.closed {
                    return Err(PortfolioError::ValidationError(
                        "cash rows cannot be closed".to_string(),
                    ));
                }
            }
            PositionKind::Long => {
                if self.descriptor.is_cash() {
                    return Err(PortfolioError::ValidationError(format!(
                        "long rows cannot use descriptor {}",
                        self.descriptor.as_str()
                    )));
                }
                if self.symbol.trim().is_empty() {
                    return Err(PortfolioError::ValidationError(
                        "symbol is required".to_string(),
                    ));
                }
                if self.shares.is_zero() {
                    return Err(PortfolioError::ValidationError(format!(
                        "{}: shares must be non-zero",
                        self.symbol
                    )));
                }
                if self.open_price <= Decimal::ZERO {
                    return Err(PortfolioError::ValidationError(format!(
                        "{}: open price must be positive",
                        self.symbol
                    )));
                }
                if self.descriptor.is_option()
                    && (self.expiration.is_none() || self.strike.is_none())
                {
                    return Err(PortfolioError::ValidationError(format!(
                        "{}: options need expiration and strike",
                        self.symbol
                    )));
                }
            }
        }

        if self.closed {
            let close_date = self.close_date.ok_or_else(|| {
                PortfolioError::ValidationError(format!("{}: close date required", self.symbol))
            })?;
            match self.close_price {
                None => {
                    return Err(PortfolioError::ValidationError(format!(
                        "{}: close price required",
                        self.symbol
                    )))
                }
                Some(price) if price < Decimal::ZERO => {
                    return Err(PortfolioError::ValidationError(format!(
                        "{}: close price must not be negative",
                        self.symbol
                    )))
                }
                Some(_) => {}
            }
            if close_date < self.open_date {
                return Err(PortfolioError::ValidationError(format!(
                    "{}: close date {} is before open date {}",
                    self.symbol, close_date, self.open_date
                )));
            }
        }

        Ok(())
    }
}

/// Cached quote for a symbol
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub name: Option<String>,
    pub last: Decimal,
    pub close: Option<Decimal>, // previous close
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub low52: Option<Decimal>,
    pub high52: Option<Decimal>,
    pub net: Decimal,
    pub p_change: Decimal,
    pub volume: Option<i64>,
    pub avg_vol: Option<i64>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub eps: Option<Decimal>,
    pub pe: Option<Decimal>,
    pub cap: Option<i64>,
    pub dividend: Option<Decimal>,
    pub div_yield: Option<Decimal>,
    pub ex_div: Option<NaiveDate>,
    pub quote_date: Option<NaiveDate>,
    pub method: String,
    pub success: bool,
    pub errormsg: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Fill `net` and `p_change` from last and previous close
    pub fn derive_change(&mut self) {
        if let Some(close) = self.close {
            self.net = self.last - close;
            self.p_change = if close.is_zero() {
                Decimal::ZERO
            } else {
                (self.last / close - Decimal::ONE) * Decimal::from(100)
            };
        }
    }

    /// False for a failure row that never held a real price
    pub fn has_price(&self) -> bool {
        self.success || !self.last.is_zero()
    }

    /// Placeholder row recording a failed fetch
    pub fn failed(symbol: &str, method: &str, message: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            method: method.to_string(),
            success: false,
            errormsg: Some(message.to_string()),
            ..Default::default()
        }
    }
}

/// Daily portfolio snapshot
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PortSnapshot {
    pub fileportname: String,
    pub date: NaiveDate,
    pub total: Decimal,
    pub cash: Decimal,
    pub open_value: Decimal,
    pub day_gain: Option<Decimal>,
}

/// Latest computed figures for a portfolio
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PortParam {
    pub fileportname: String,
    pub cash: Decimal,
    pub open_value: Decimal,
    pub total_value: Decimal,
    pub realized: Decimal,
    pub day_gain: Option<Decimal>,
    pub day_gain_pct: Option<Decimal>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Exchange holiday
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MarketHoliday {
    pub date: NaiveDate,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_descriptor_conversions() {
        assert_eq!("stock".parse::<Descriptor>().ok(), Some(Descriptor::Stock));
        assert_eq!("CALL".parse::<Descriptor>().ok(), Some(Descriptor::Call));
        assert_eq!("p".parse::<Descriptor>().ok(), Some(Descriptor::Put));
        assert_eq!(
            "dividend".parse::<Descriptor>().ok(),
            Some(Descriptor::Intermediate)
        );
        assert_eq!("bond".parse::<Descriptor>().ok(), None);
        assert!(Descriptor::Call.is_option());
        assert!(!Descriptor::Stock.is_option());
        assert!(Descriptor::Initial.is_cash());
    }

    #[test]
    fn test_fileportname_parsing() {
        let fpn: FilePortName = "port:fluffgazer".parse().unwrap();
        assert_eq!(fpn.file, "port");
        assert_eq!(fpn.port, "fluffgazer");
        assert_eq!(fpn.to_string(), "port:fluffgazer");

        assert!("fluffgazer".parse::<FilePortName>().is_err());
        assert!(":x".parse::<FilePortName>().is_err());
        assert!("port:".parse::<FilePortName>().is_err());
        assert!("a:b:c".parse::<FilePortName>().is_err());
    }

    #[test]
    fn test_option_symbol_occ_format() {
        assert_eq!(
            option_symbol("aapl", Descriptor::Call, d(2024, 1, 19), dec!(150.5)),
            "AAPL240119C00150500"
        );
        assert_eq!(
            option_symbol("SPY", Descriptor::Put, d(2025, 12, 19), dec!(7)),
            "SPY251219P00007000"
        );
    }

    #[test]
    fn test_trait_display_symbol() {
        let stock = Transaction::open_long(
            "port:a",
            "msft",
            Descriptor::Stock,
            dec!(10),
            dec!(300),
            d(2024, 3, 1),
        );
        assert_eq!(stock.trait_key().display_symbol(), "MSFT");

        let call = Transaction::open_long(
            "port:a",
            "msft",
            Descriptor::Call,
            dec!(1),
            dec!(2.5),
            d(2024, 3, 1),
        )
        .with_option(d(2024, 6, 21), dec!(400));
        assert_eq!(call.trait_key().display_symbol(), "MSFT240621C00400000");
    }

    #[test]
    fn test_validate_rejects_option_without_strike() {
        let tx = Transaction::open_long(
            "port:a",
            "MSFT",
            Descriptor::Put,
            dec!(1),
            dec!(3),
            d(2024, 3, 1),
        );
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_close_before_open() {
        let tx = Transaction::open_long(
            "port:a",
            "MSFT",
            Descriptor::Stock,
            dec!(1),
            dec!(3),
            d(2024, 3, 1),
        )
        .closed_at(dec!(4), d(2024, 2, 1));
        let err = tx.validate().unwrap_err();
        assert!(err.to_string().contains("before open date"));
    }

    #[test]
    fn test_validate_rejects_non_positive_prices() {
        let free = Transaction::open_long(
            "port:a",
            "MSFT",
            Descriptor::Stock,
            dec!(1),
            dec!(0),
            d(2024, 3, 1),
        );
        let err = free.validate().unwrap_err();
        assert!(err.to_string().contains("open price must be positive"));

        let negative_close = Transaction::open_long(
            "port:a",
            "MSFT",
            Descriptor::Stock,
            dec!(1),
            dec!(3),
            d(2024, 3, 1),
        )
        .closed_at(dec!(-4), d(2024, 4, 1));
        let err = negative_close.validate().unwrap_err();
        assert!(err.to_string().contains("close price must not be negative"));

        let worthless = Transaction::open_long(
            "port:a",
            "MSFT",
            Descriptor::Put,
            dec!(1),
            dec!(3),
            d(2024, 3, 1),
        )
        .with_option(d(2024, 6, 21), dec!(400))
        .closed_at(dec!(0), d(2024, 6, 21));
        assert!(worthless.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_negative_cash() {
        let tx = Transaction::cash("port:a", Descriptor::Intermediate, dec!(-9.99), d(2024, 1, 2));
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_realized_gain() {
        let tx = Transaction::open_long(
            "port:a",
            "IBM",
            Descriptor::Stock,
            dec!(10),
            dec!(100),
            d(2024, 1, 2),
        )
        .closed_at(dec!(112.5), d(2024, 2, 2));
        assert_eq!(tx.realized_gain(), dec!(125));
    }

    #[test]
    fn test_failed_quote_has_no_price() {
        assert!(!Quote::failed("ZZZZ", "finviz", "404").has_price());

        let stale = Quote {
            last: dec!(42),
            success: false,
            ..Default::default()
        };
        assert!(stale.has_price());
    }

    #[test]
    fn test_quote_derive_change() {
        let mut quote = Quote {
            symbol: "IBM".to_string(),
            last: dec!(110),
            close: Some(dec!(100)),
            ..Default::default()
        };
        quote.derive_change();
        assert_eq!(quote.net, dec!(10));
        assert_eq!(quote.p_change, dec!(10));
    }
}
