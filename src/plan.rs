//! Builds the voucher plan for one voucher type from a snapshot.
//!
//! Required entities (the accounting type, fixed and rule-named cost centres, fixed contacts) are
//! checked before any transaction is looked at, so a broken configuration aborts the voucher type
//! without consuming reference numbers. After that, a missing cost centre or contact for a single
//! transaction is not an error. It is recorded as `None` on the entry and shows up in the report.

use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::model::{
    find_accounting_type, similar_accounting_types, AccountingType, Contact, CostCentre, Snapshot,
    Transaction, TransactionStatus, VoucherPlan, VoucherPlanEntry,
};
use crate::numbering::NumberingState;
use crate::resolve::{ContactResolver, CostCentreResolver, Overrides};
use crate::rules::RuleEngine;
use crate::vouchers::{CostCentreQuery, FixedCostCentre, VoucherType, VoucherTypeSettings};
use anyhow::{anyhow, bail};
use tracing::{debug, info};

/// Orchestrates eligibility, classification and resolution over a snapshot. The builder borrows
/// the snapshot and never changes it, so it can be run any number of times.
#[derive(Debug)]
pub struct PlanBuilder<'a> {
    snapshot: &'a Snapshot,
    rules: &'a RuleEngine,
    contacts: ContactResolver<'a>,
    cost_centres: CostCentreResolver<'a>,
    all_statuses: bool,
}

/// The entities a voucher type needs for every entry, resolved up front.
struct Required<'a> {
    accounting_type: &'a AccountingType,
    fixed_cost_centre: Option<&'a CostCentre>,
    fixed_contact: Option<&'a Contact>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(snapshot: &'a Snapshot, rules: &'a RuleEngine) -> Self {
        Self {
            snapshot,
            rules,
            contacts: ContactResolver::new(snapshot.contacts()),
            cost_centres: CostCentreResolver::new(snapshot.cost_centres()),
            all_statuses: false,
        }
    }

    /// By default only open transactions are planned. With `true`, linked and booked
    /// transactions are planned too.
    pub fn all_statuses(mut self, all_statuses: bool) -> Self {
        self.all_statuses = all_statuses;
        self
    }

    /// Builds the plan for `voucher_type`. Eligible transactions keep their snapshot order and get
    /// consecutive numbers from `numbering`.
    pub fn build(
        &self,
        voucher_type: VoucherType,
        settings: &VoucherTypeSettings,
        numbering: &mut NumberingState,
    ) -> Result<VoucherPlan> {
        if voucher_type.uses_rules() {
            self.rules.ensure_type_rules().pub_result(ErrorType::Rules)?;
        }
        let required = self
            .required(voucher_type)
            .pub_result(ErrorType::Configuration)?;

        let no_overrides = Overrides::new();
        let mut entries = Vec::new();
        for tx in self.eligible(voucher_type) {
            let number = numbering.next();
            let (bucket, cost_centre, cost_centre_expected) = self
                .cost_centre(voucher_type, tx, settings, &no_overrides, &required)
                .pub_result(ErrorType::Rules)?;
            let contact = match required.fixed_contact {
                Some(contact) => Some(contact),
                None => self.contacts.resolve_first(
                    voucher_type.contact_queries(tx),
                    settings.preferred_category.as_deref(),
                    &settings.contact_overrides,
                ),
            };
            debug!(
                "{number}: transaction {} bucket={} cost_centre={} contact={}",
                tx.id(),
                bucket.as_deref().unwrap_or("-"),
                cost_centre.map(CostCentre::name).unwrap_or("-"),
                contact.map(Contact::name).unwrap_or("-"),
            );
            entries.push(VoucherPlanEntry {
                number,
                transaction: tx.clone(),
                bucket,
                cost_centre: cost_centre.cloned(),
                cost_centre_expected,
                contact: contact.cloned(),
                accounting_type: required.accounting_type.clone(),
                direction: voucher_type.direction(tx),
                description: voucher_type.description(tx),
            });
        }

        let plan = VoucherPlan {
            voucher_type,
            accounting_type: required.accounting_type.clone(),
            entries,
        };
        info!(
            "Planned {} {voucher_type} vouchers, {} without cost centre, {} without contact",
            plan.len(),
            plan.missing_cost_centres().count(),
            plan.missing_contacts().count()
        );
        Ok(plan)
    }

    /// Transactions that the voucher type books, in snapshot order.
    fn eligible(&self, voucher_type: VoucherType) -> impl Iterator<Item = &'a Transaction> + '_ {
        self.snapshot
            .transactions()
            .iter()
            .filter(move |tx| self.all_statuses || tx.status() == TransactionStatus::Open)
            .filter(move |tx| voucher_type.is_eligible(tx, self.rules))
    }

    /// Looks up everything that must exist before the voucher type can be planned.
    fn required(&self, voucher_type: VoucherType) -> Res<Required<'a>> {
        let accounting_types = self.snapshot.accounting_types();
        let needle = voucher_type.accounting_type_name();
        let Some(accounting_type) = find_accounting_type(accounting_types, needle) else {
            let similar = similar_accounting_types(accounting_types, needle);
            if similar.is_empty() {
                bail!("No accounting type contains '{needle}', which {voucher_type} requires");
            }
            bail!(
                "No accounting type contains '{needle}', which {voucher_type} requires. \
                Similar accounting types: {}",
                similar.join(", ")
            );
        };

        if voucher_type.uses_rules() {
            let missing: Vec<&str> = self
                .rules
                .cost_centre_names()
                .into_iter()
                .filter(|name| self.cost_centres.find_exact(name).is_none())
                .collect();
            if !missing.is_empty() {
                bail!(
                    "The rules name cost centres that do not exist: {}",
                    missing.join(", ")
                );
            }
        }

        let fixed_cost_centre = voucher_type
            .fixed_cost_centre()
            .map(|fixed| {
                let found = match fixed {
                    FixedCostCentre::Exact(name) => self.cost_centres.find_exact(name),
                    FixedCostCentre::Resolved(name) => {
                        self.cost_centres.resolve(name, &Overrides::new())
                    }
                };
                found.ok_or_else(|| {
                    anyhow!(
                        "The cost centre '{}', which {voucher_type} requires, is missing",
                        fixed.name()
                    )
                })
            })
            .transpose()?;

        let fixed_contact = voucher_type
            .fixed_contact()
            .map(|name| {
                self.snapshot
                    .contacts()
                    .iter()
                    .filter(|c| c.name().trim() == name)
                    .min_by(|a, b| a.id().cmp(b.id()))
                    .ok_or_else(|| {
                        anyhow!("The contact '{name}', which {voucher_type} requires, is missing")
                    })
            })
            .transpose()?;

        Ok(Required {
            accounting_type,
            fixed_cost_centre,
            fixed_contact,
        })
    }

    /// Returns the bucket, the cost centre and whether a cost centre was expected at all.
    fn cost_centre(
        &self,
        voucher_type: VoucherType,
        tx: &Transaction,
        settings: &VoucherTypeSettings,
        no_overrides: &Overrides,
        required: &Required<'a>,
    ) -> Res<(Option<String>, Option<&'a CostCentre>, bool)> {
        let result = match voucher_type.cost_centre_query(tx) {
            CostCentreQuery::None => (None, None, false),
            CostCentreQuery::Fixed(_) => (None, required.fixed_cost_centre, true),
            CostCentreQuery::Rule => {
                let classification = self.rules.classify(tx.payee(), tx.purpose())?;
                let name = classification.cost_centre();
                let cost_centre = if name.is_empty() {
                    None
                } else {
                    self.cost_centres.find_exact(name)
                };
                (
                    Some(classification.bucket().to_string()),
                    cost_centre,
                    !name.is_empty(),
                )
            }
            CostCentreQuery::Resolve {
                query,
                apply_overrides,
            } => {
                let overrides = if apply_overrides {
                    &settings.cost_centre_overrides
                } else {
                    no_overrides
                };
                (None, self.cost_centres.resolve(query, overrides), true)
            }
        };
        Ok(result)
    }
}
