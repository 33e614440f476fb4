//! The JSON shapes of the sevDesk API and their conversion into model types.
//!
//! sevDesk wraps every response in `{"objects": ...}` and is not consistent about whether numbers
//! arrive as JSON numbers or strings, so every scalar is read leniently as an optional string.
//! Records that cannot be converted are skipped with a warning instead of failing the refresh.

use crate::error::Res;
use crate::model::{
    display_name, AccountingType, Amount, Contact, CostCentre, Transaction, TransactionStatus,
};
use crate::numbering::RecentVoucher;
use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// The envelope around every sevDesk response.
#[derive(Debug, Deserialize)]
pub(super) struct Objects<T> {
    pub(super) objects: T,
}

/// A reference to another sevDesk object, e.g. `{"id": "5", "objectName": "CheckAccount"}`.
#[derive(Debug, Default, Deserialize)]
pub(super) struct WireRef {
    #[serde(default, deserialize_with = "lenient")]
    pub(super) id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireTransaction {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    value_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    amount: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    paymt_purpose: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    payee_payer_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    status: Option<String>,
    #[serde(default)]
    check_account: Option<WireRef>,
    #[serde(default)]
    sev_client: Option<WireRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireContact {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    surename: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    familyname: Option<String>,
    #[serde(default)]
    category: Option<WireRef>,
    #[serde(default, deserialize_with = "lenient")]
    customer_number: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    supplier_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireCostCentre {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireAccountingType {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireVoucher {
    #[serde(default, deserialize_with = "lenient")]
    voucher_number: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    description: Option<String>,
}

/// Conversion of a wire record into a model record.
pub(super) trait IntoModel {
    type Model;
    fn into_model(self) -> Res<Self::Model>;
}

impl IntoModel for WireTransaction {
    type Model = Transaction;

    fn into_model(self) -> Res<Transaction> {
        let id = required(self.id, "id")?;
        let value_date = parse_date(&required(self.value_date, "valueDate")?)?;
        let amount = required(self.amount, "amount")?;
        let amount =
            Amount::from_str(&amount).map_err(|e| anyhow!("Invalid amount '{amount}': {e}"))?;
        let status = required(self.status, "status")?;
        let code = status
            .parse::<i64>()
            .with_context(|| format!("Invalid status '{status}'"))?;
        let status = TransactionStatus::from_code(code)
            .ok_or_else(|| anyhow!("Unknown transaction status {code}"))?;
        let check_account_id = self.check_account.and_then(|r| r.id).unwrap_or_default();
        let sev_client_id = self.sev_client.and_then(|r| r.id).unwrap_or_default();
        Ok(Transaction::new(
            id,
            value_date,
            amount,
            self.paymt_purpose.unwrap_or_default(),
            self.payee_payer_name.unwrap_or_default(),
        )
        .with_status(status)
        .with_accounts(check_account_id, sev_client_id))
    }
}

impl IntoModel for WireContact {
    type Model = Contact;

    fn into_model(self) -> Res<Contact> {
        let id = required(self.id, "id")?;
        let name = display_name(
            self.name.as_deref(),
            self.surename.as_deref(),
            self.familyname.as_deref(),
        );
        let mut contact =
            Contact::new(id, name).with_numbers(self.customer_number, self.supplier_number);
        if let Some(category) = self.category.and_then(|r| r.id) {
            contact = contact.with_category(category);
        }
        Ok(contact)
    }
}

impl IntoModel for WireCostCentre {
    type Model = CostCentre;

    fn into_model(self) -> Res<CostCentre> {
        let id = required(self.id, "id")?;
        let name = required(self.name, "name")?;
        let active = match self.status {
            Some(s) => CostCentre::active_from_code(
                s.parse::<i64>()
                    .with_context(|| format!("Invalid status '{s}'"))?,
            ),
            None => true,
        };
        Ok(CostCentre::new(id, name).with_active(active))
    }
}

impl IntoModel for WireAccountingType {
    type Model = AccountingType;

    fn into_model(self) -> Res<AccountingType> {
        Ok(AccountingType::new(
            required(self.id, "id")?,
            required(self.name, "name")?,
        ))
    }
}

impl IntoModel for WireVoucher {
    type Model = RecentVoucher;

    fn into_model(self) -> Res<RecentVoucher> {
        Ok(RecentVoucher {
            voucher_number: self.voucher_number,
            description: self.description,
        })
    }
}

/// Converts every object in `values` into a model record, skipping the ones that are malformed.
pub(super) fn convert_all<W>(kind: &str, values: Vec<Value>) -> Vec<W::Model>
where
    W: DeserializeOwned + IntoModel,
{
    values
        .into_iter()
        .filter_map(|value| {
            let id = value
                .get("id")
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "?".to_string());
            let converted = serde_json::from_value::<W>(value)
                .context("Unexpected JSON shape")
                .and_then(IntoModel::into_model);
            match converted {
                Ok(model) => Some(model),
                Err(e) => {
                    warn!("Skipping malformed {kind} '{id}': {e:#}");
                    None
                }
            }
        })
        .collect()
}

/// Extracts the id of a newly created voucher from a `saveVoucher` response.
pub(super) fn created_voucher_id(response: &Value) -> Res<String> {
    let id = response
        .pointer("/objects/voucher/id")
        .ok_or_else(|| anyhow!("The response contains no voucher id: {response}"))?;
    match id {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(anyhow!("Invalid voucher id {other}")),
    }
}

/// Reads a scalar that may be a string, a number, a boolean or null.
fn lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {other}"
        ))),
    }
}

fn required(value: Option<String>, field: &str) -> Res<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(anyhow!("Missing {field}")),
    }
}

/// sevDesk sends dates as RFC 3339 timestamps, e.g. `2025-01-15T00:00:00+01:00`. The date is
/// taken in the timestamp's own offset.
fn parse_date(s: &str) -> Res<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{s}'"))
}
