//! The catalogue of voucher types.
//!
//! Each voucher type knows which transactions it books (its eligibility predicate), which
//! accounting type it books them to, and how it finds the cost centre and the contact for a
//! transaction. The resolver settings (overrides and preferred contact category) are
//! configuration data, see `VoucherTypeSettings`.

use crate::model::{Direction, Transaction};
use crate::resolve::Overrides;
use crate::rules::RuleEngine;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The name of the contact used for internal money transfers and as the fallback for fees.
pub const TRANSIT_CONTACT: &str = "70000";

const PAYPAL_EUROPE: &str = "PayPal (Europe) S.a r.l. et Cie, S. C.A.";
const CHURCH_DONATIONS: &str =
    "Zuwendungen, Spenden für kirchliche, religiöse und gemeinnützige Zwecke";

/// A kind of voucher that can be planned and submitted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum VoucherType {
    /// Salary payments.
    Gehalt,
    /// Volunteer allowances (Übungsleiterpauschale, Ehrenamtspauschale).
    Ulp,
    /// Incoming donations, classified by the rules file.
    Spenden,
    /// Health insurance contributions.
    Krankenkassen,
    /// Donations to Grace Baptist for the Wilhelmsson mission.
    GraceBaptist,
    /// Donations to Kontaktmission.
    Kontaktmission,
    /// Donations to the European Bible Training Center.
    Ebtc,
    /// Payments for JEK youth camps, passed through.
    JekFreizeit,
    /// Money moving between the church's own accounts.
    Geldtransit,
    /// Bank and payment provider fees.
    Fees,
}

serde_plain::derive_display_from_serialize!(VoucherType);
serde_plain::derive_fromstr_from_deserialize!(VoucherType);

const LOHNNEBENKOSTEN: FixedCostCentre = FixedCostCentre::Exact("Lohnnebenkosten");
const WILHELMSON: FixedCostCentre = FixedCostCentre::Resolved("Wilhelmson");
const SPENDENAUSGAENGE: FixedCostCentre = FixedCostCentre::Resolved("Spendenausgänge");
const JEK_FREIZEITEN: FixedCostCentre = FixedCostCentre::Resolved("JEK Freizeiten");
const BANK_FEES: FixedCostCentre = FixedCostCentre::Resolved("Buchführung, Bankgebühren");

/// A cost centre that every voucher of a type books to. It is looked up once before any
/// transaction is resolved, and the voucher type cannot be planned without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedCostCentre {
    /// The cost centre has exactly this name.
    Exact(&'static str),
    /// The cost centre is found by the cost-centre resolver, without overrides, so a name that
    /// extends this one (e.g. with an account suffix) also matches.
    Resolved(&'static str),
}

impl FixedCostCentre {
    pub fn name(&self) -> &'static str {
        match self {
            FixedCostCentre::Exact(name) | FixedCostCentre::Resolved(name) => name,
        }
    }
}

/// How a voucher type finds the cost centre for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostCentreQuery<'a> {
    /// The voucher gets no cost centre.
    None,
    /// Every voucher gets the same cost centre, see `VoucherType::fixed_cost_centre`.
    Fixed(FixedCostCentre),
    /// The matching type rule names the cost centre exactly.
    Rule,
    /// Search with the cost-centre resolver. `apply_overrides` is false when the configured
    /// overrides must be ignored for this transaction.
    Resolve {
        query: &'a str,
        apply_overrides: bool,
    },
}

impl VoucherType {
    pub const ALL: [VoucherType; 10] = [
        VoucherType::Gehalt,
        VoucherType::Ulp,
        VoucherType::Spenden,
        VoucherType::Krankenkassen,
        VoucherType::GraceBaptist,
        VoucherType::Kontaktmission,
        VoucherType::Ebtc,
        VoucherType::JekFreizeit,
        VoucherType::Geldtransit,
        VoucherType::Fees,
    ];

    /// The accounting type is the first one, sorted by name, whose name contains this.
    pub fn accounting_type_name(&self) -> &'static str {
        match self {
            VoucherType::Gehalt => "Lohn / Gehalt",
            VoucherType::Ulp => "pauschale",
            VoucherType::Spenden => "Spendeneingang",
            VoucherType::Krankenkassen => "Krankenkasse",
            VoucherType::GraceBaptist | VoucherType::Kontaktmission | VoucherType::Ebtc => {
                CHURCH_DONATIONS
            }
            VoucherType::JekFreizeit => "Durchlaufende Posten",
            VoucherType::Geldtransit => "Geldtransit",
            VoucherType::Fees => "Kontoführung / Kartengebühren",
        }
    }

    /// Whether `tx` belongs to this voucher type. The transaction status is not considered here.
    pub fn is_eligible(&self, tx: &Transaction, rules: &RuleEngine) -> bool {
        let amount = tx.amount();
        let payee = tx.payee();
        let purpose = tx.purpose();
        match self {
            VoucherType::Gehalt => purpose.to_lowercase().contains("gehalt"),
            VoucherType::Ulp => {
                let purpose = purpose.to_lowercase();
                ["ülp", "übungsleiterpauschale", "ehrenamtspauschale"]
                    .iter()
                    .any(|k| purpose.contains(k))
            }
            VoucherType::Spenden => amount.is_positive() && rules.is_in_scope(payee, purpose),
            VoucherType::Krankenkassen => [
                "Techniker Krankenkasse",
                "Knappschaft-Bahn-See",
                "Knappschaft",
                "Verwaltungs-Berufsgenossenschaft",
            ]
            .iter()
            .any(|k| payee.contains(k)),
            VoucherType::GraceBaptist => {
                amount.is_negative()
                    && either_contains_upper(payee, purpose, "GRACE BAPTIST")
                    && purpose.to_uppercase().contains("WILHELMSSON")
            }
            VoucherType::Kontaktmission => {
                amount.is_negative() && either_contains_upper(payee, purpose, "KONTAKTMISSION")
            }
            VoucherType::Ebtc => {
                amount.is_negative()
                    && either_contains_upper(payee, purpose, "EBTC")
                    && purpose.to_uppercase().contains("SPENDE")
            }
            VoucherType::JekFreizeit => {
                let purpose = purpose.to_uppercase();
                amount.is_positive()
                    && (purpose.contains("JEK FREIZEIT") || purpose.contains("JEK LEISURE"))
            }
            VoucherType::Geldtransit => {
                payee.to_lowercase().contains("bankeinzug")
                    || (payee.contains(PAYPAL_EUROPE) && purpose.contains("Ihr Einkauf bei"))
            }
            VoucherType::Fees => {
                (payee.contains("Paypal Inc.") && purpose.contains("Gebühren zu"))
                    || purpose.contains("Saldo der Abschlussposten QM")
            }
        }
    }

    pub fn direction(&self, tx: &Transaction) -> Direction {
        match self {
            VoucherType::Spenden | VoucherType::JekFreizeit => Direction::Income,
            VoucherType::Geldtransit => Direction::from_amount(tx.amount()),
            _ => Direction::Expense,
        }
    }

    /// True if the voucher type takes its bucket and cost centre from the type rules.
    pub fn uses_rules(&self) -> bool {
        matches!(self, VoucherType::Spenden)
    }

    pub fn cost_centre_query<'a>(&self, tx: &'a Transaction) -> CostCentreQuery<'a> {
        match self {
            VoucherType::Gehalt => CostCentreQuery::Resolve {
                query: tx.payee(),
                apply_overrides: true,
            },
            VoucherType::Ulp => CostCentreQuery::Resolve {
                query: tx.payee(),
                apply_overrides: tx.purpose().contains("ÜLP"),
            },
            VoucherType::Spenden => CostCentreQuery::Rule,
            VoucherType::Krankenkassen => CostCentreQuery::Fixed(LOHNNEBENKOSTEN),
            VoucherType::GraceBaptist => CostCentreQuery::Fixed(WILHELMSON),
            VoucherType::Kontaktmission => {
                let purpose = tx.purpose().to_uppercase();
                let query = if purpose.contains("HODZI") {
                    "Hodzi"
                } else if purpose.contains("JEAN") || purpose.contains("RICHARDS") {
                    "Jean Richards"
                } else {
                    return CostCentreQuery::None;
                };
                CostCentreQuery::Resolve {
                    query,
                    apply_overrides: true,
                }
            }
            VoucherType::Ebtc => CostCentreQuery::Fixed(SPENDENAUSGAENGE),
            VoucherType::JekFreizeit => CostCentreQuery::Fixed(JEK_FREIZEITEN),
            VoucherType::Geldtransit => CostCentreQuery::None,
            VoucherType::Fees => CostCentreQuery::Fixed(BANK_FEES),
        }
    }

    /// Cost centres that must exist for the voucher type to be planned at all.
    pub fn fixed_cost_centre(&self) -> Option<FixedCostCentre> {
        match self {
            VoucherType::Krankenkassen => Some(LOHNNEBENKOSTEN),
            VoucherType::GraceBaptist => Some(WILHELMSON),
            VoucherType::Ebtc => Some(SPENDENAUSGAENGE),
            VoucherType::JekFreizeit => Some(JEK_FREIZEITEN),
            VoucherType::Fees => Some(BANK_FEES),
            _ => None,
        }
    }

    /// A contact that must exist and is used for every voucher of this type.
    pub fn fixed_contact(&self) -> Option<&'static str> {
        match self {
            VoucherType::Geldtransit => Some(TRANSIT_CONTACT),
            _ => None,
        }
    }

    /// The names to look up, in order, when resolving the contact. The first one that resolves
    /// wins.
    pub fn contact_queries<'a>(&self, tx: &'a Transaction) -> Vec<&'a str> {
        match self {
            VoucherType::GraceBaptist => vec!["GRACE BAPTIST TAMPERE RY"],
            VoucherType::Kontaktmission => vec!["KONTAKTMISSION DEUTSCHLAND"],
            VoucherType::Ebtc => vec![
                "EBTC",
                "Europäisches Bibel Trainings Centrum",
                tx.payee(),
            ],
            VoucherType::Geldtransit => vec![TRANSIT_CONTACT],
            VoucherType::Fees => vec![tx.payee(), TRANSIT_CONTACT],
            _ => vec![tx.payee()],
        }
    }

    /// A description that replaces the reference number on the voucher.
    pub fn description(&self, tx: &Transaction) -> Option<String> {
        match self {
            VoucherType::Krankenkassen => Some(tx.value_date().format("%Y%m").to_string()),
            VoucherType::Geldtransit | VoucherType::Fees => Some(tx.purpose().to_string()),
            _ => None,
        }
    }

    /// The built-in resolver settings.
    pub fn default_settings(&self) -> VoucherTypeSettings {
        let category = |id: &str| Some(id.to_string());
        match self {
            VoucherType::Gehalt => VoucherTypeSettings {
                contact_overrides: overrides(&[("gwendolyn ruth dewhurst", "gwen dewhurst")]),
                cost_centre_overrides: overrides(&[
                    ("gwendolyn dewhurst", "gwen dewhurst"),
                    ("samuel jeanrichard", "samuel jeanrichard (intern)"),
                ]),
                preferred_category: category("3"),
            },
            VoucherType::Ulp => VoucherTypeSettings {
                cost_centre_overrides: overrides(&[(
                    "tobias zimmermann",
                    "tobias zimmermann (ülp)",
                )]),
                preferred_category: category("3"),
                ..Default::default()
            },
            VoucherType::Spenden => VoucherTypeSettings {
                preferred_category: category("2"),
                ..Default::default()
            },
            VoucherType::Krankenkassen => VoucherTypeSettings {
                contact_overrides: overrides(&[
                    ("knappschaft-bahn-see", "Bundesknappschaft Ost"),
                    ("knappschaft", "Bundesknappschaft Ost"),
                ]),
                preferred_category: category("3"),
                ..Default::default()
            },
            VoucherType::Kontaktmission => VoucherTypeSettings {
                cost_centre_overrides: overrides(&[
                    ("hodzi", "Hodzi"),
                    ("jean richards", "Samuel Jeanrichard (intern)"),
                    ("jeanrichard", "Samuel Jeanrichard (intern)"),
                ]),
                preferred_category: category("3"),
                ..Default::default()
            },
            VoucherType::GraceBaptist | VoucherType::Ebtc => VoucherTypeSettings {
                preferred_category: category("3"),
                ..Default::default()
            },
            VoucherType::JekFreizeit => VoucherTypeSettings {
                preferred_category: category("1"),
                ..Default::default()
            },
            VoucherType::Geldtransit | VoucherType::Fees => VoucherTypeSettings::default(),
        }
    }

    /// The built-in settings for every voucher type, as written to a new `config.json`.
    pub fn all_default_settings() -> BTreeMap<VoucherType, VoucherTypeSettings> {
        Self::ALL
            .iter()
            .map(|t| (*t, t.default_settings()))
            .collect()
    }
}

/// Resolver settings for one voucher type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VoucherTypeSettings {
    /// Maps a payee phrase to the name of the contact to use instead.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contact_overrides: Overrides,
    /// Maps a substring of the cost-centre query to a substring of the cost centre to use.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cost_centre_overrides: Overrides,
    /// Contacts in this category win over all others.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_category: Option<String>,
}

fn overrides(pairs: &[(&str, &str)]) -> Overrides {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn either_contains_upper(payee: &str, purpose: &str, needle: &str) -> bool {
    payee.to_uppercase().contains(needle) || purpose.to_uppercase().contains(needle)
}
