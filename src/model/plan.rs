use crate::model::{AccountingType, Amount, Contact, CostCentre, Transaction};
use crate::vouchers::VoucherType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a voucher books incoming or outgoing money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Income,
    Expense,
}

serde_plain::derive_display_from_serialize!(Direction);
serde_plain::derive_fromstr_from_deserialize!(Direction);

impl Direction {
    /// Positive amounts are income, everything else is an expense.
    pub fn from_amount(amount: Amount) -> Self {
        if amount.is_positive() {
            Direction::Income
        } else {
            Direction::Expense
        }
    }

    /// The `creditDebit` flag of a voucher.
    pub fn credit_debit(&self) -> &'static str {
        match self {
            Direction::Income => "D",
            Direction::Expense => "C",
        }
    }
}

/// A fully resolved voucher for a single transaction. Missing cost centres and contacts are kept
/// as `None` so that they can be reported before anything is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VoucherPlanEntry {
    pub(crate) number: String,
    pub(crate) transaction: Transaction,
    pub(crate) bucket: Option<String>,
    pub(crate) cost_centre: Option<CostCentre>,
    /// False when the voucher type deliberately assigns no cost centre to this transaction.
    pub(crate) cost_centre_expected: bool,
    pub(crate) contact: Option<Contact>,
    pub(crate) accounting_type: AccountingType,
    pub(crate) direction: Direction,
    pub(crate) description: Option<String>,
}

impl VoucherPlanEntry {
    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn cost_centre(&self) -> Option<&CostCentre> {
        self.cost_centre.as_ref()
    }

    pub fn contact(&self) -> Option<&Contact> {
        self.contact.as_ref()
    }

    pub fn accounting_type(&self) -> &AccountingType {
        &self.accounting_type
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The voucher description, which is the reference number unless the voucher type sets one.
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.number)
    }

    /// True if a cost centre was wanted but none was found.
    pub fn is_missing_cost_centre(&self) -> bool {
        self.cost_centre_expected && self.cost_centre.is_none()
    }

    pub fn is_missing_contact(&self) -> bool {
        self.contact.is_none()
    }
}

/// Count and sum of the entries in one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    pub count: usize,
    pub total: Amount,
}

/// The ordered plan for one voucher type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VoucherPlan {
    pub(crate) voucher_type: VoucherType,
    pub(crate) accounting_type: AccountingType,
    pub(crate) entries: Vec<VoucherPlanEntry>,
}

impl VoucherPlan {
    pub fn voucher_type(&self) -> VoucherType {
        self.voucher_type
    }

    pub fn accounting_type(&self) -> &AccountingType {
        &self.accounting_type
    }

    pub fn entries(&self) -> &[VoucherPlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn missing_cost_centres(&self) -> impl Iterator<Item = &VoucherPlanEntry> {
        self.entries.iter().filter(|e| e.is_missing_cost_centre())
    }

    pub fn missing_contacts(&self) -> impl Iterator<Item = &VoucherPlanEntry> {
        self.entries.iter().filter(|e| e.is_missing_contact())
    }

    /// Per-bucket statistics, keyed by bucket label. Entries without a bucket are not counted.
    pub fn bucket_stats(&self) -> BTreeMap<String, BucketStats> {
        let mut stats: BTreeMap<String, BucketStats> = BTreeMap::new();
        for entry in &self.entries {
            if let Some(bucket) = entry.bucket() {
                let s = stats.entry(bucket.to_string()).or_default();
                s.count += 1;
                s.total = s.total + entry.transaction.amount;
            }
        }
        stats
    }

    /// The sum of all entry amounts.
    pub fn total(&self) -> Amount {
        self.entries.iter().map(|e| e.transaction.amount).sum()
    }
}
