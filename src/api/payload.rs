//! Request bodies for creating a voucher and booking it against its bank transaction.

use crate::model::{Direction, VoucherPlanEntry};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A reference to another sevDesk object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub id: String,
    pub object_name: String,
}

impl ObjectRef {
    fn new(id: &str, object_name: &str) -> Self {
        Self {
            id: id.to_string(),
            object_name: object_name.to_string(),
        }
    }

    /// `None` when `id` is empty.
    fn non_empty(id: &str, object_name: &str) -> Option<Self> {
        (!id.is_empty()).then(|| Self::new(id, object_name))
    }
}

/// The body of `POST /Voucher/Factory/saveVoucher`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherPayload {
    pub voucher: Voucher,
    pub voucher_pos_save: Vec<VoucherPosition>,
    pub voucher_pos_delete: Option<Vec<ObjectRef>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub object_name: String,
    pub map_all: bool,
    pub voucher_date: String,
    pub pay_date: String,
    pub payment_deadline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    pub description: String,
    pub status: i64,
    pub tax_type: String,
    pub credit_debit: String,
    pub voucher_type: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sev_client: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_centre: Option<ObjectRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherPosition {
    pub object_name: String,
    pub map_all: bool,
    pub accounting_type: ObjectRef,
    pub tax_rate: f64,
    pub sum_tax: f64,
    pub sum_net: f64,
    pub sum_gross: f64,
    pub net: bool,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_centre: Option<ObjectRef>,
}

impl VoucherPayload {
    /// Builds the voucher for `entry`. The voucher amount is always positive, the direction is
    /// carried by `creditDebit`.
    pub fn from_entry(entry: &VoucherPlanEntry) -> Self {
        let tx = entry.transaction();
        let date = tx.value_date().format(DATE_FORMAT).to_string();
        let sum = tx.amount().abs().to_f64();
        let cost_centre = entry
            .cost_centre()
            .map(|cc| ObjectRef::new(cc.id(), "CostCentre"));
        let contact = entry.contact().map(|c| ObjectRef::new(c.id(), "Contact"));

        let (delivery_date, customer, supplier, supplier_name) = match entry.direction() {
            Direction::Income => (Some(date.clone()), contact, None, None),
            Direction::Expense => (None, None, contact, Some(tx.payee().to_string())),
        };

        let voucher = Voucher {
            object_name: "Voucher".to_string(),
            map_all: true,
            voucher_date: date.clone(),
            pay_date: date.clone(),
            payment_deadline: date,
            delivery_date,
            description: entry.description().to_string(),
            status: 100,
            tax_type: "ss".to_string(),
            credit_debit: entry.direction().credit_debit().to_string(),
            voucher_type: "VOU".to_string(),
            currency: "EUR".to_string(),
            sev_client: ObjectRef::non_empty(tx.sev_client_id(), "SevClient"),
            customer,
            supplier,
            supplier_name,
            cost_centre: cost_centre.clone(),
        };

        let position = VoucherPosition {
            object_name: "VoucherPos".to_string(),
            map_all: true,
            accounting_type: ObjectRef::new(entry.accounting_type().id(), "AccountingType"),
            tax_rate: 0.0,
            sum_tax: 0.0,
            sum_net: sum,
            sum_gross: sum,
            net: false,
            comment: tx.purpose().to_string(),
            cost_centre,
        };

        Self {
            voucher,
            voucher_pos_save: vec![position],
            voucher_pos_delete: None,
        }
    }
}

/// The body of `PUT /Voucher/{id}/bookAmount`, which pays the voucher with its bank transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub amount: f64,
    pub date: String,
    #[serde(rename = "type")]
    pub booking_type: String,
    pub check_account: ObjectRef,
    pub check_account_transaction: ObjectRef,
    pub create_feed: bool,
}

impl BookingPayload {
    pub fn from_entry(entry: &VoucherPlanEntry) -> Self {
        let tx = entry.transaction();
        Self {
            amount: tx.amount().abs().to_f64(),
            date: tx.value_date().format(DATE_FORMAT).to_string(),
            booking_type: "N".to_string(),
            check_account: ObjectRef::new(tx.check_account_id(), "CheckAccount"),
            check_account_transaction: ObjectRef::new(tx.id(), "CheckAccountTransaction"),
            create_feed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountingType, Amount, Contact, CostCentre, Transaction};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::str::FromStr;

    fn make_entry(amount: &str, direction: Direction) -> VoucherPlanEntry {
        VoucherPlanEntry {
            number: "B-2025-3".to_string(),
            transaction: Transaction::new(
                "4711",
                NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                Amount::from_str(amount).unwrap(),
                "Spende Mission",
                "Max Mustermann",
            )
            .with_accounts("5001", "77"),
            bucket: Some("mission".to_string()),
            cost_centre: Some(CostCentre::new("12", "Spendeneingänge Missionare")),
            cost_centre_expected: true,
            contact: Some(Contact::new("900", "Max Mustermann")),
            accounting_type: AccountingType::new("26", "Spendeneingang"),
            direction,
            description: None,
        }
    }

    #[test]
    fn test_income_voucher_payload() {
        let payload = VoucherPayload::from_entry(&make_entry("50.00", Direction::Income));
        let value = serde_json::to_value(&payload).unwrap();
        let voucher = &value["voucher"];
        assert_eq!(voucher["objectName"], "Voucher");
        assert_eq!(voucher["mapAll"], true);
        assert_eq!(voucher["voucherDate"], "2025-01-15");
        assert_eq!(voucher["deliveryDate"], "2025-01-15");
        assert_eq!(voucher["description"], "B-2025-3");
        assert_eq!(voucher["status"], 100);
        assert_eq!(voucher["taxType"], "ss");
        assert_eq!(voucher["creditDebit"], "D");
        assert_eq!(voucher["voucherType"], "VOU");
        assert_eq!(voucher["currency"], "EUR");
        assert_eq!(voucher["sevClient"], json!({"id": "77", "objectName": "SevClient"}));
        assert_eq!(voucher["customer"], json!({"id": "900", "objectName": "Contact"}));
        assert!(voucher.get("supplier").is_none());
        assert_eq!(voucher["costCentre"]["id"], "12");

        let pos = &value["voucherPosSave"][0];
        assert_eq!(pos["accountingType"]["id"], "26");
        assert_eq!(pos["sumNet"], 50.0);
        assert_eq!(pos["sumGross"], 50.0);
        assert_eq!(pos["taxRate"], 0.0);
        assert_eq!(pos["comment"], "Spende Mission");
        assert!(value["voucherPosDelete"].is_null());
    }

    #[test]
    fn test_expense_voucher_payload() {
        let payload = VoucherPayload::from_entry(&make_entry("-12.50", Direction::Expense));
        let value = serde_json::to_value(&payload).unwrap();
        let voucher = &value["voucher"];
        assert_eq!(voucher["creditDebit"], "C");
        assert!(voucher.get("deliveryDate").is_none());
        assert!(voucher.get("customer").is_none());
        assert_eq!(voucher["supplier"]["id"], "900");
        assert_eq!(voucher["supplierName"], "Max Mustermann");
        assert_eq!(value["voucherPosSave"][0]["sumGross"], 12.5);
    }

    #[test]
    fn test_booking_payload() {
        let payload = BookingPayload::from_entry(&make_entry("-12.50", Direction::Expense));
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "amount": 12.5,
                "date": "2025-01-15",
                "type": "N",
                "checkAccount": {"id": "5001", "objectName": "CheckAccount"},
                "checkAccountTransaction": {"id": "4711", "objectName": "CheckAccountTransaction"},
                "createFeed": true
            })
        );
    }
}
