//! Types that represent the core data model, such as `Transaction`, `Contact` and
//! `VoucherPlanEntry`.
mod accounting_type;
mod amount;
mod contact;
mod cost_centre;
mod plan;
mod rule;
mod transaction;

pub use accounting_type::{find_accounting_type, similar_accounting_types, AccountingType};
pub use amount::{Amount, AmountFormat, REPORT_FORMAT};
pub use contact::{display_name, Contact};
pub use cost_centre::CostCentre;
pub use plan::{BucketStats, Direction, VoucherPlan, VoucherPlanEntry};
pub use rule::{ClassificationRule, MatchMode, RuleKind};
use serde::{Deserialize, Serialize};
pub use transaction::{Transaction, TransactionStatus};

/// A consistent copy of everything the classification needs, loaded from the local cache or
/// fetched from the accounting service.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Snapshot {
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) contacts: Vec<Contact>,
    pub(crate) cost_centres: Vec<CostCentre>,
    pub(crate) accounting_types: Vec<AccountingType>,
}

impl Snapshot {
    pub fn new(
        transactions: Vec<Transaction>,
        contacts: Vec<Contact>,
        cost_centres: Vec<CostCentre>,
        accounting_types: Vec<AccountingType>,
    ) -> Self {
        Self {
            transactions,
            contacts,
            cost_centres,
            accounting_types,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn cost_centres(&self) -> &[CostCentre] {
        &self.cost_centres
    }

    pub fn accounting_types(&self) -> &[AccountingType] {
        &self.accounting_types
    }
}
