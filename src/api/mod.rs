//! The remote accounting service.
//!
//! `Remote` is the seam between the app and sevDesk. `SevDesk` talks to the real API over HTTP and
//! `TestRemote` holds seed data in memory so that the whole app can run without the network.

mod payload;
mod sevdesk;
mod test_client;
mod wire;

use crate::error::Res;
use crate::model::{AccountingType, Contact, CostCentre, Snapshot, Transaction};
use crate::numbering::RecentVoucher;
use crate::Config;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use payload::{BookingPayload, VoucherPayload};
pub(crate) use test_client::TestRemote;

/// When this environment variable is set and non-empty the app uses `TestRemote`.
pub const TEST_MODE_ENV: &str = "VOUCHER_SYNC_IN_TEST_MODE";

/// Which implementation of `Remote` to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Talk to the sevDesk API.
    #[default]
    SevDesk,
    /// Use in-memory seed data.
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// Returns `Mode::Test` when `VOUCHER_SYNC_IN_TEST_MODE` is set and non-empty, otherwise
    /// `Mode::SevDesk`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::SevDesk,
        }
    }
}

/// The operations the app needs from the accounting service.
#[async_trait::async_trait]
pub(crate) trait Remote {
    /// All bank transactions.
    async fn transactions(&mut self) -> Res<Vec<Transaction>>;

    /// All contacts, people and organisations.
    async fn contacts(&mut self) -> Res<Vec<Contact>>;

    async fn cost_centres(&mut self) -> Res<Vec<CostCentre>>;

    async fn accounting_types(&mut self) -> Res<Vec<AccountingType>>;

    /// The most recent vouchers, used to continue the reference numbering.
    async fn recent_voucher_numbers(&mut self) -> Res<Vec<RecentVoucher>>;

    /// Creates a voucher and returns its id.
    async fn create_voucher(&mut self, payload: &VoucherPayload) -> Res<String>;

    /// Books the voucher against its bank transaction.
    async fn book_amount(&mut self, voucher_id: &str, payload: &BookingPayload) -> Res<()>;
}

/// Creates the `Remote` for `mode`.
pub(crate) async fn remote(config: &Config, mode: Mode) -> Res<Box<dyn Remote + Send>> {
    Ok(match mode {
        Mode::SevDesk => Box::new(sevdesk::SevDesk::new(config).await?),
        Mode::Test => Box::new(TestRemote::seeded(chrono::Local::now().year())?),
    })
}

/// Fetches everything the plan builder needs.
pub(crate) async fn fetch_snapshot(remote: &mut (dyn Remote + Send)) -> Res<Snapshot> {
    let transactions = remote.transactions().await?;
    let contacts = remote.contacts().await?;
    let cost_centres = remote.cost_centres().await?;
    let accounting_types = remote.accounting_types().await?;
    info!(
        "Fetched {} transactions, {} contacts, {} cost centres and {} accounting types",
        transactions.len(),
        contacts.len(),
        cost_centres.len(),
        accounting_types.len()
    );
    Ok(Snapshot::new(
        transactions,
        contacts,
        cost_centres,
        accounting_types,
    ))
}
