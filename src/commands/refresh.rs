use crate::api::{self, Mode, Remote};
use crate::commands::Out;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{Snapshot, TransactionStatus};
use crate::{Config, Result};
use anyhow::anyhow;
use serde::Serialize;
use tracing::debug;

/// What a refresh loaded into the cache.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub transactions: usize,
    pub open_transactions: usize,
    pub contacts: usize,
    pub cost_centres: usize,
    pub accounting_types: usize,
}

impl RefreshSummary {
    fn new(snapshot: &Snapshot) -> Self {
        Self {
            transactions: snapshot.transactions().len(),
            open_transactions: snapshot
                .transactions()
                .iter()
                .filter(|t| t.status() == TransactionStatus::Open)
                .count(),
            contacts: snapshot.contacts().len(),
            cost_centres: snapshot.cost_centres().len(),
            accounting_types: snapshot.accounting_types().len(),
        }
    }
}

/// Reloads the local cache from the remote service. Everything in the cache is replaced.
pub async fn refresh(config: Config, mode: Mode) -> Result<Out<RefreshSummary>> {
    let mut remote = api::remote(&config, mode)
        .await
        .pub_result(ErrorType::Config)?;
    refresh_inner(&config, remote.as_mut()).await
}

pub(crate) async fn refresh_inner(
    config: &Config,
    remote: &mut (dyn Remote + Send),
) -> Result<Out<RefreshSummary>> {
    let snapshot = refresh_snapshot(config, remote).await?;
    let summary = RefreshSummary::new(&snapshot);
    Ok(Out::new(
        format!(
            "Refreshed the cache: {} transactions ({} open), {} contacts, {} cost centres, {} \
            accounting types",
            summary.transactions,
            summary.open_transactions,
            summary.contacts,
            summary.cost_centres,
            summary.accounting_types
        ),
        summary,
    ))
}

/// Fetches a snapshot, replaces the cache with it and returns the snapshot as cached.
pub(crate) async fn refresh_snapshot(
    config: &Config,
    remote: &mut (dyn Remote + Send),
) -> Result<Snapshot> {
    let fetched = api::fetch_snapshot(remote)
        .await
        .pub_result(ErrorType::Request)?;
    config
        .db()
        .save_snapshot(&fetched)
        .await
        .pub_result(ErrorType::Database)?;
    debug!("Saved the snapshot to {}", config.sqlite_path().display());
    load_cached(config).await
}

/// Loads the snapshot from the cache. Fails if the cache has never been filled.
pub(crate) async fn load_cached(config: &Config) -> Result<Snapshot> {
    let db = config.db();
    let count = db
        .count_transactions()
        .await
        .pub_result(ErrorType::Database)?;
    if count == 0 {
        return Err(Error::new(
            ErrorType::Database,
            anyhow!("The cache has no transactions, run 'vouchers refresh' to load them"),
        ));
    }
    db.load_snapshot().await.pub_result(ErrorType::Database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_refresh() {
        let mut env = TestEnv::new().await;
        let config = env.config();
        let out = refresh_inner(&config, &mut env.remote).await.unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.transactions, 14);
        assert_eq!(summary.open_transactions, 13);
        assert_eq!(summary.contacts, 11);
        assert_eq!(summary.cost_centres, 14);
        assert_eq!(summary.accounting_types, 9);
        assert!(out.message().starts_with("Refreshed the cache: 14 transactions (13 open)"));

        let cached = load_cached(&config).await.unwrap();
        assert_eq!(cached.transactions().len(), 14);
    }

    #[tokio::test]
    async fn test_load_cached_requires_refresh() {
        let env = TestEnv::new().await;
        let e = load_cached(&env.config()).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Database);
        assert!(e.to_string().contains("vouchers refresh"));
    }

    #[tokio::test]
    async fn test_refresh_in_test_mode() {
        let env = TestEnv::new().await;
        let out = refresh(env.config(), Mode::Test).await.unwrap();
        assert_eq!(out.structure().unwrap().transactions, 14);
    }
}
