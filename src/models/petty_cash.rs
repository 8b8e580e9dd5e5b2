use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashKind {
    /// Påfyllning av kassan
    TopUp,
    Expense,
}

impl CashKind {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "top_up" => Some(Self::TopUp),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TopUp => "Påfyllning",
            Self::Expense => "Utgift",
        }
    }
}

impl fmt::Display for CashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopUp => write!(f, "top_up"),
            Self::Expense => write!(f, "expense"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PettyCashTransaction {
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub kind: CashKind,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub receipt_url: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl PettyCashTransaction {
    pub fn new(date: NaiveDate, kind: CashKind, amount: f64, category: impl Into<String>) -> Self {
        Self {
            id: None,
            date,
            kind,
            amount,
            category: category.into(),
            description: None,
            receipt_url: None,
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Belopp med tecken: påfyllning positiv, utgift negativ
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            CashKind::TopUp => self.amount,
            CashKind::Expense => -self.amount,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(AppError::validation("Beloppet måste vara större än 0"));
        }
        if self.category.trim().is_empty() {
            return Err(AppError::validation("Kategori saknas"));
        }
        Ok(())
    }
}

/// Kassasaldo: summa påfyllningar minus summa utgifter
pub fn balance(transactions: &[PettyCashTransaction]) -> f64 {
    transactions.iter().map(|t| t.signed_amount()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    }

    #[test]
    fn test_balance() {
        let txs = vec![
            PettyCashTransaction::new(date(), CashKind::TopUp, 1000.0, "Påfyllning"),
            PettyCashTransaction::new(date(), CashKind::Expense, 120.0, "Kontor"),
            PettyCashTransaction::new(date(), CashKind::Expense, 80.5, "Fika"),
        ];
        assert_eq!(balance(&txs), 799.5);
    }

    #[test]
    fn test_validate_amount() {
        let tx = PettyCashTransaction::new(date(), CashKind::Expense, 0.0, "Kontor");
        assert!(tx.validate().is_err());
        let tx = PettyCashTransaction::new(date(), CashKind::Expense, 10.0, " ");
        assert!(tx.validate().is_err());
    }
}
