//! Implements the `Remote` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without talking to sevDesk.

use crate::api::payload::{BookingPayload, VoucherPayload};
use crate::api::Remote;
use crate::error::Res;
use crate::model::{AccountingType, Amount, Contact, CostCentre, Transaction, TransactionStatus};
use crate::numbering::RecentVoucher;
use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

/// An implementation of the `Remote` trait that holds its data in memory. It records every
/// voucher that is created and every booking, and marks booked transactions as linked.
#[derive(Debug, Clone, Default)]
pub(crate) struct TestRemote {
    transactions: Vec<Transaction>,
    contacts: Vec<Contact>,
    cost_centres: Vec<CostCentre>,
    accounting_types: Vec<AccountingType>,
    recent: Vec<RecentVoucher>,
    created: Vec<(String, VoucherPayload)>,
    bookings: Vec<(String, BookingPayload)>,
    fail_on: Option<String>,
    next_id: u64,
}

impl TestRemote {
    /// A remote with the seed data from this module. Recent vouchers are numbered in `year`.
    pub(crate) fn seeded(year: i32) -> Res<Self> {
        Ok(Self {
            transactions: seed_transactions()?,
            contacts: seed_contacts()?,
            cost_centres: seed_cost_centres()?,
            accounting_types: seed_accounting_types()?,
            recent: vec![
                RecentVoucher::new(Some(&format!("B-{year}-41")), None),
                RecentVoucher::new(None, Some(&format!("B-{year}-40"))),
                RecentVoucher::new(Some(&format!("B-{}-99", year - 1)), None),
                RecentVoucher::new(Some("RE-1001"), None),
            ],
            next_id: 9000,
            ..Default::default()
        })
    }

    /// Replaces the transactions.
    pub(crate) fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = transactions;
        self
    }

    /// Makes `create_voucher` fail for vouchers with this description.
    pub(crate) fn fail_on(mut self, description: impl Into<String>) -> Self {
        self.fail_on = Some(description.into());
        self
    }

    pub(crate) fn created(&self) -> &[(String, VoucherPayload)] {
        &self.created
    }

    pub(crate) fn bookings(&self) -> &[(String, BookingPayload)] {
        &self.bookings
    }
}

#[async_trait::async_trait]
impl Remote for TestRemote {
    async fn transactions(&mut self) -> Res<Vec<Transaction>> {
        Ok(self.transactions.clone())
    }

    async fn contacts(&mut self) -> Res<Vec<Contact>> {
        Ok(self.contacts.clone())
    }

    async fn cost_centres(&mut self) -> Res<Vec<CostCentre>> {
        Ok(self.cost_centres.clone())
    }

    async fn accounting_types(&mut self) -> Res<Vec<AccountingType>> {
        Ok(self.accounting_types.clone())
    }

    async fn recent_voucher_numbers(&mut self) -> Res<Vec<RecentVoucher>> {
        Ok(self.recent.clone())
    }

    async fn create_voucher(&mut self, payload: &VoucherPayload) -> Res<String> {
        if self.fail_on.as_deref() == Some(payload.voucher.description.as_str()) {
            bail!(
                "POST Voucher/Factory/saveVoucher returned 400 Bad Request: voucher '{}' rejected",
                payload.voucher.description
            );
        }
        self.next_id += 1;
        let id = self.next_id.to_string();
        debug!("Created test voucher {id} '{}'", payload.voucher.description);
        self.created.push((id.clone(), payload.clone()));
        Ok(id)
    }

    async fn book_amount(&mut self, voucher_id: &str, payload: &BookingPayload) -> Res<()> {
        if !self.created.iter().any(|(id, _)| id == voucher_id) {
            bail!("PUT Voucher/{voucher_id}/bookAmount returned 404 Not Found");
        }
        let tx_id = &payload.check_account_transaction.id;
        let tx = self
            .transactions
            .iter_mut()
            .find(|t| &t.id == tx_id)
            .ok_or_else(|| anyhow!("Unknown transaction '{tx_id}'"))?;
        tx.status = TransactionStatus::Linked;
        self.bookings.push((voucher_id.to_string(), payload.clone()));
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    id: String,
    value_date: String,
    amount: String,
    purpose: String,
    payee: String,
    status: i64,
    check_account_id: String,
    sev_client_id: String,
}

#[derive(Debug, Deserialize)]
struct ContactRow {
    id: String,
    name: String,
    category_id: String,
    customer_number: String,
    supplier_number: String,
}

#[derive(Debug, Deserialize)]
struct CostCentreRow {
    id: String,
    name: String,
    status: i64,
}

#[derive(Debug, Deserialize)]
struct AccountingTypeRow {
    id: String,
    name: String,
}

/// Reads every row of a CSV-formatted string.
fn load_csv<T: DeserializeOwned>(csv_data: &str) -> Res<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.deserialize::<T>() {
        rows.push(result.context("Invalid seed data")?);
    }
    Ok(rows)
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn seed_transactions() -> Res<Vec<Transaction>> {
    load_csv::<TransactionRow>(TRANSACTION_DATA)?
        .into_iter()
        .map(|row| {
            let date = NaiveDate::parse_from_str(&row.value_date, "%Y-%m-%d")
                .with_context(|| format!("Invalid seed date '{}'", row.value_date))?;
            let amount = Amount::from_str(&row.amount)
                .map_err(|e| anyhow!("Invalid seed amount '{}': {e}", row.amount))?;
            let status = TransactionStatus::from_code(row.status)
                .ok_or_else(|| anyhow!("Invalid seed status {}", row.status))?;
            Ok(Transaction::new(row.id, date, amount, row.purpose, row.payee)
                .with_status(status)
                .with_accounts(row.check_account_id, row.sev_client_id))
        })
        .collect()
}

fn seed_contacts() -> Res<Vec<Contact>> {
    Ok(load_csv::<ContactRow>(CONTACT_DATA)?
        .into_iter()
        .map(|row| {
            Contact::new(row.id, row.name)
                .with_category(row.category_id)
                .with_numbers(non_empty(row.customer_number), non_empty(row.supplier_number))
        })
        .collect())
}

fn seed_cost_centres() -> Res<Vec<CostCentre>> {
    Ok(load_csv::<CostCentreRow>(COST_CENTRE_DATA)?
        .into_iter()
        .map(|row| {
            CostCentre::new(row.id, row.name).with_active(CostCentre::active_from_code(row.status))
        })
        .collect())
}

fn seed_accounting_types() -> Res<Vec<AccountingType>> {
    Ok(load_csv::<AccountingTypeRow>(ACCOUNTING_TYPE_DATA)?
        .into_iter()
        .map(|row| AccountingType::new(row.id, row.name))
        .collect())
}

/// Seed transaction data.
const TRANSACTION_DATA: &str = r##"id,value_date,amount,purpose,payee,status,check_account_id,sev_client_id
1001,2025-01-03,50.00,Spende Mission Januar,Max Mustermann,100,5001,77
1002,2025-01-05,25.00,Spende Tobias Zimmermann,Erika Musterfrau,100,5001,77
1003,2025-01-10,-2100.00,Gehalt Januar 2025,Gwen Dewhurst,100,5001,77
1004,2025-01-15,-250.00,ÜLP Januar,Tobias Zimmermann,100,5001,77
1005,2025-01-20,-480.12,Beitrag 01/2025,Techniker Krankenkasse,100,5001,77
1006,2025-01-22,-300.00,Missionsspende Wilhelmsson,GRACE BAPTIST TAMPERE RY,100,5001,77
1007,2025-01-25,-150.00,Spende Hodzi,KONTAKTMISSION e.V.,100,5001,77
1008,2025-01-28,-100.00,Spende Ausbildung,EBTC,100,5001,77
1009,2025-02-01,120.00,JEK Freizeit Anmeldung,Erika Musterfrau,100,5001,77
1010,2025-02-03,-40.00,Bargeld Kasse,Bankeinzug,100,5001,77
1011,2025-02-05,-1.20,Gebühren zu Zahlung 4711,Paypal Inc.,100,5002,77
1012,2025-02-07,30.00,Spende,Max Mustermann,200,5001,77
1013,2025-02-08,-19.99,Ihr Einkauf bei Buchladen,"PayPal (Europe) S.a r.l. et Cie, S. C.A.",100,5002,77
1014,2025-02-10,75.00,Monatsspende Februar,Unbekannter Spender,100,5001,77
"##;

/// Seed contact data.
const CONTACT_DATA: &str = r##"id,name,category_id,customer_number,supplier_number
100,70000,3,,
101,Max Mustermann,2,1001,
102,Gwen Dewhurst,3,,2001
103,Tobias Zimmermann,3,,2002
104,Techniker Krankenkasse,3,,2003
105,Bundesknappschaft Ost,3,,2004
106,GRACE BAPTIST TAMPERE RY,3,,2005
107,KONTAKTMISSION DEUTSCHLAND,3,,2006
108,EBTC,3,,2007
109,Erika Musterfrau,2,1002,
110,Paypal Inc.,3,,2008
"##;

/// Seed cost centre data.
const COST_CENTRE_DATA: &str = r##"id,name,status
1,Jeske (Durchlaufende Posten),100
2,Tobias Zimmermann (Spende für Tobias),100
3,Spendeneingänge Missionare,100
4,Spendeneingänge Konto,100
5,Lohnnebenkosten,100
6,JEK Freizeiten,100
7,"Buchführung, Bankgebühren",100
8,Gwen Dewhurst,100
9,Tobias Zimmermann (ÜLP),100
10,Hodzi,100
11,Samuel Jeanrichard (intern),100
12,Wilhelmson,100
13,Spendenausgänge,100
14,Alte Kostenstelle,0
"##;

/// Seed accounting type data.
const ACCOUNTING_TYPE_DATA: &str = r##"id,name
20,Lohn / Gehalt
21,Übungsleiterpauschale
22,Spendeneingang
23,Krankenkasse
24,"Zuwendungen, Spenden für kirchliche, religiöse und gemeinnützige Zwecke"
25,Durchlaufende Posten
26,Geldtransit
27,Kontoführung / Kartengebühren
28,Bürobedarf
"##;
