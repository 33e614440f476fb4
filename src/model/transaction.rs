use crate::model::Amount;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The booking state of a bank transaction in the accounting service.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Not yet linked to any voucher. Only open transactions are planned by default.
    #[default]
    Open,
    /// Linked to a voucher but not booked.
    Linked,
    /// Booked.
    Booked,
}

serde_plain::derive_display_from_serialize!(TransactionStatus);
serde_plain::derive_fromstr_from_deserialize!(TransactionStatus);

impl TransactionStatus {
    /// Maps the numeric status used by the accounting service. Returns `None` for unknown codes.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            100 => Some(Self::Open),
            200 => Some(Self::Linked),
            300 | 1000 => Some(Self::Booked),
            _ => None,
        }
    }

    /// The numeric status used by the accounting service.
    pub fn code(&self) -> i64 {
        match self {
            Self::Open => 100,
            Self::Linked => 200,
            Self::Booked => 1000,
        }
    }
}

/// A bank transaction as cached from the accounting service. Positive amounts are incoming money.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    pub(crate) id: String,
    pub(crate) value_date: NaiveDate,
    pub(crate) amount: Amount,
    /// The free-text payment purpose ("Verwendungszweck").
    pub(crate) purpose: String,
    /// The free-text payee or payer name.
    pub(crate) payee: String,
    pub(crate) status: TransactionStatus,
    /// The check account this transaction was booked on.
    pub(crate) check_account_id: String,
    /// The accounting service client that owns the check account.
    pub(crate) sev_client_id: String,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        value_date: NaiveDate,
        amount: Amount,
        purpose: impl Into<String>,
        payee: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            value_date,
            amount,
            purpose: purpose.into(),
            payee: payee.into(),
            status: TransactionStatus::Open,
            check_account_id: String::new(),
            sev_client_id: String::new(),
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_accounts(
        mut self,
        check_account_id: impl Into<String>,
        sev_client_id: impl Into<String>,
    ) -> Self {
        self.check_account_id = check_account_id.into();
        self.sev_client_id = sev_client_id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value_date(&self) -> NaiveDate {
        self.value_date
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn payee(&self) -> &str {
        &self.payee
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn check_account_id(&self) -> &str {
        &self.check_account_id
    }

    pub fn sev_client_id(&self) -> &str {
        &self.sev_client_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_codes() {
        assert_eq!(TransactionStatus::from_code(100), Some(TransactionStatus::Open));
        assert_eq!(TransactionStatus::from_code(200), Some(TransactionStatus::Linked));
        assert_eq!(TransactionStatus::from_code(300), Some(TransactionStatus::Booked));
        assert_eq!(TransactionStatus::from_code(1000), Some(TransactionStatus::Booked));
        assert_eq!(TransactionStatus::from_code(42), None);
        assert_eq!(TransactionStatus::Open.code(), 100);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TransactionStatus::Linked.to_string(), "linked");
        assert_eq!(
            TransactionStatus::from_str("booked").unwrap(),
            TransactionStatus::Booked
        );
    }

    #[test]
    fn test_transaction_builder() {
        let tx = Transaction::new(
            "tx1",
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            Amount::from_str("50.00").unwrap(),
            "Spende",
            "Max Mustermann",
        )
        .with_accounts("ca1", "client1")
        .with_status(TransactionStatus::Linked);
        assert_eq!(tx.check_account_id(), "ca1");
        assert_eq!(tx.sev_client_id(), "client1");
        assert_eq!(tx.status(), TransactionStatus::Linked);
    }
}
