use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{PositionTrait, Transaction};

/// Open holding built from one or more transactions sharing a trait
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub key: PositionTrait,
    pub symbol: String, // display symbol (OCC form for options)
    pub sector: Option<String>,
    pub shares: Decimal,
    pub basis: Decimal,
    pub open_price: Decimal,
    pub open_date: Option<NaiveDate>,
    #[serde(skip)]
    pub transactions: Vec<Transaction>,
}

impl Position {
    pub fn new(key: PositionTrait) -> Self {
        let symbol = key.display_symbol();
        Self {
            key,
            symbol,
            sector: None,
            shares: Decimal::ZERO,
            basis: Decimal::ZERO,
            open_price: Decimal::ZERO,
            open_date: None,
            transactions: Vec::new(),
        }
    }

    /// Fold a transaction in: shares and basis accumulate, the
    /// weighted open price follows, and the earliest open date wins.
    pub fn add_transaction(&mut self, tx: &Transaction) {
        self.shares += tx.shares;
        self.basis += tx.shares * tx.open_price;
        self.open_price = if self.shares.is_zero() {
            Decimal::ZERO
        } else {
            self.basis / self.shares
        };
        self.open_date = Some(match self.open_date {
            Some(date) if date <= tx.open_date => date,
            _ => tx.open_date,
        });
        if self.sector.is_none() {
            self.sector = tx.sector.clone();
        }
        self.transactions.push(tx.clone());
    }
}

/// Running cash balance from initial and intermediate rows
#[derive(Debug, Clone, Default, Serialize)]
pub struct CashPosition {
    pub amount: Decimal,
    pub open_date: Option<NaiveDate>,
    #[serde(skip)]
    pub transactions: Vec<Transaction>,
}

impl CashPosition {
    pub fn add_transaction(&mut self, tx: &Transaction) {
        self.amount += tx.open_price;
        self.open_date = Some(match self.open_date {
            Some(date) if date <= tx.open_date => date,
            _ => tx.open_date,
        });
        self.transactions.push(tx.clone());
    }

    /// Cash is its own basis
    pub fn basis(&self) -> Decimal {
        self.amount
    }

    pub fn open_price(&self) -> Decimal {
        Decimal::ONE
    }
}

/// Realized result of closed rows for one symbol
#[derive(Debug, Clone, Serialize)]
pub struct ClosedPosition {
    pub symbol: String,
    pub shares: Decimal,
    pub basis: Decimal,
    pub proceeds: Decimal,
    pub first_open: Option<NaiveDate>,
    pub last_close: Option<NaiveDate>,
    #[serde(skip)]
    pub transactions: Vec<Transaction>,
}

impl ClosedPosition {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            shares: Decimal::ZERO,
            basis: Decimal::ZERO,
            proceeds: Decimal::ZERO,
            first_open: None,
            last_close: None,
            transactions: Vec::new(),
        }
    }

    pub fn add_transaction(&mut self, tx: &Transaction) {
        let close_price = tx.close_price.unwrap_or(Decimal::ZERO);
        self.shares += tx.shares;
        self.basis += tx.shares * tx.open_price;
        self.proceeds += tx.shares * close_price;

        self.first_open = Some(match self.first_open {
            Some(date) if date <= tx.open_date => date,
            _ => tx.open_date,
        });
        if let Some(close_date) = tx.close_date {
            self.last_close = Some(match self.last_close {
                Some(date) if date >= close_date => date,
                _ => close_date,
            });
        }
        self.transactions.push(tx.clone());
    }

    pub fn realized(&self) -> Decimal {
        self.proceeds - self.basis
    }

    pub fn realized_pct(&self) -> Decimal {
        if self.basis.is_zero() {
            Decimal::ZERO
        } else {
            self.realized() * Decimal::from(100) / self.basis.abs()
        }
    }
}
