use crate::api::{self, BookingPayload, Mode, Remote, VoucherPayload};
use crate::commands::plan::{prepare, PlanOptions, PlanSummary};
use crate::commands::Out;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{TransactionStatus, VoucherPlanEntry};
use crate::vouchers::VoucherType;
use crate::{Config, Result};
use anyhow::{anyhow, Context};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// A voucher that was created in sevDesk.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedVoucher {
    pub number: String,
    pub transaction_id: String,
    pub voucher_id: String,
    /// False if the voucher was created but booking it against the transaction failed.
    pub booked: bool,
}

/// The outcome of a submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitSummary {
    pub plan: PlanSummary,
    pub dry_run: bool,
    pub created: Vec<SubmittedVoucher>,
    /// Reference numbers of the entries that could not be created.
    pub failed: Vec<String>,
    /// How many of the submitted transactions are no longer open after re-fetching.
    pub left_open: usize,
}

/// Builds the plan for `voucher_type` and, if `yes` is true, creates and books every voucher in it.
/// Without `yes` this only writes the report.
pub async fn submit(
    config: Config,
    mode: Mode,
    voucher_type: VoucherType,
    yes: bool,
    no_refresh: bool,
) -> Result<Out<SubmitSummary>> {
    let mut remote = api::remote(&config, mode)
        .await
        .pub_result(ErrorType::Config)?;
    let options = PlanOptions::new(voucher_type, false, no_refresh);
    submit_inner(&config, remote.as_mut(), options, yes).await
}

pub(crate) async fn submit_inner(
    config: &Config,
    remote: &mut (dyn Remote + Send),
    options: PlanOptions,
    yes: bool,
) -> Result<Out<SubmitSummary>> {
    let (plan, report) = prepare(config, remote, options).await?;
    let summary = PlanSummary::new(&plan, report);

    if !yes {
        let message = format!(
            "Dry run: {} Pass --yes to submit.",
            summary.describe()
        );
        return Ok(Out::new(
            message,
            SubmitSummary {
                plan: summary,
                dry_run: true,
                created: Vec::new(),
                failed: Vec::new(),
                left_open: 0,
            },
        ));
    }

    let mut created = Vec::new();
    let mut failed = Vec::new();
    for entry in plan.entries() {
        match submit_entry(remote, entry).await {
            Ok(submitted) => created.push(submitted),
            Err(e) => {
                warn!("Unable to create voucher {}: {e:#}", entry.number());
                failed.push(entry.number().to_string());
            }
        }
    }

    if created.is_empty() && !failed.is_empty() {
        return Err(Error::new(
            ErrorType::Submission,
            anyhow!(
                "None of the {} {} vouchers could be created, see the warnings above",
                failed.len(),
                plan.voucher_type()
            ),
        ));
    }

    let left_open = update_statuses(config, remote, &created).await?;
    let message = format!(
        "Submitted {} {} vouchers: {} created, {} failed, {} transactions no longer open",
        plan.len(),
        plan.voucher_type(),
        created.len(),
        failed.len(),
        left_open
    );
    Ok(Out::new(
        message,
        SubmitSummary {
            plan: summary,
            dry_run: false,
            created,
            failed,
            left_open,
        },
    ))
}

/// Creates the voucher for `entry` and books it. A failed booking is logged and the voucher still
/// counts as created.
async fn submit_entry(
    remote: &mut (dyn Remote + Send),
    entry: &VoucherPlanEntry,
) -> anyhow::Result<SubmittedVoucher> {
    let voucher_id = remote
        .create_voucher(&VoucherPayload::from_entry(entry))
        .await
        .with_context(|| format!("Failed to create voucher {}", entry.number()))?;
    info!("Created voucher {} with id {voucher_id}", entry.number());

    let booked = match remote
        .book_amount(&voucher_id, &BookingPayload::from_entry(entry))
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Voucher {} ({voucher_id}) was created but booking it failed: {e:#}",
                entry.number()
            );
            false
        }
    };

    Ok(SubmittedVoucher {
        number: entry.number().to_string(),
        transaction_id: entry.transaction().id().to_string(),
        voucher_id,
        booked,
    })
}

/// Re-fetches the transactions, writes the new statuses of the submitted ones to the cache and
/// returns how many of them are no longer open.
async fn update_statuses(
    config: &Config,
    remote: &mut (dyn Remote + Send),
    created: &[SubmittedVoucher],
) -> Result<usize> {
    if created.is_empty() {
        return Ok(0);
    }
    let submitted: BTreeSet<&str> = created.iter().map(|s| s.transaction_id.as_str()).collect();
    let transactions = remote
        .transactions()
        .await
        .context("Unable to re-fetch transactions after submitting")
        .pub_result(ErrorType::Request)?;

    let db = config.db();
    let mut left_open = 0;
    for tx in transactions
        .iter()
        .filter(|t| submitted.contains(t.id()))
    {
        if !db
            .set_transaction_status(tx.id(), tx.status())
            .await
            .pub_result(ErrorType::Database)?
        {
            debug!("Transaction {} is not in the cache", tx.id());
        }
        if tx.status() != TransactionStatus::Open {
            left_open += 1;
        }
    }
    Ok(left_open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::refresh::load_cached;
    use crate::test::{TestEnv, SEED_YEAR};

    fn options(voucher_type: VoucherType) -> PlanOptions {
        PlanOptions {
            voucher_type,
            all_statuses: false,
            no_refresh: false,
            year: SEED_YEAR,
        }
    }

    #[tokio::test]
    async fn test_submit_dry_run() {
        let mut env = TestEnv::new().await;
        let config = env.config();
        let out = submit_inner(&config, &mut env.remote, options(VoucherType::Spenden), false)
            .await
            .unwrap();
        let summary = out.structure().unwrap();
        assert!(summary.dry_run);
        assert!(summary.created.is_empty());
        assert!(env.remote.created().is_empty());
        assert!(out.message().starts_with("Dry run: Planned 3 spenden vouchers"));
        assert_eq!(env.reports().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_creates_and_books() {
        let mut env = TestEnv::new().await;
        let config = env.config();
        let out = submit_inner(&config, &mut env.remote, options(VoucherType::Spenden), true)
            .await
            .unwrap();
        let summary = out.structure().unwrap();
        assert!(!summary.dry_run);
        assert_eq!(summary.created.len(), 3);
        assert!(summary.failed.is_empty());
        assert_eq!(summary.left_open, 3);
        assert!(summary.created.iter().all(|s| s.booked));

        let numbers: Vec<&str> = summary.created.iter().map(|s| s.number.as_str()).collect();
        assert_eq!(numbers, vec!["B-2025-42", "B-2025-43", "B-2025-44"]);
        assert_eq!(env.remote.created().len(), 3);
        assert_eq!(env.remote.bookings().len(), 3);

        let (_, first) = &env.remote.created()[0];
        assert_eq!(first.voucher.credit_debit, "D");
        assert_eq!(first.voucher_pos_save.len(), 1);

        let cached = load_cached(&config).await.unwrap();
        let linked = cached
            .transactions()
            .iter()
            .filter(|t| t.status() == TransactionStatus::Linked)
            .count();
        assert_eq!(linked, 4);
    }

    #[tokio::test]
    async fn test_submit_continues_after_a_failure() {
        let mut env = TestEnv::new().await;
        env.remote = env.remote.clone().fail_on("B-2025-43");
        let config = env.config();
        let out = submit_inner(&config, &mut env.remote, options(VoucherType::Spenden), true)
            .await
            .unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.created.len(), 2);
        assert_eq!(summary.failed, vec!["B-2025-43".to_string()]);
        assert_eq!(summary.left_open, 2);
        assert_eq!(
            out.message(),
            "Submitted 3 spenden vouchers: 2 created, 1 failed, 2 transactions no longer open"
        );
    }

    #[tokio::test]
    async fn test_submit_all_failed_is_a_submission_error() {
        let mut env = TestEnv::new().await;
        env.remote = env.remote.clone().fail_on("B-2025-42");
        let config = env.config();
        let e = submit_inner(&config, &mut env.remote, options(VoucherType::Gehalt), true)
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Submission);
        assert!(env.remote.created().is_empty());
    }

    #[tokio::test]
    async fn test_submit_expense_uses_description() {
        let mut env = TestEnv::new().await;
        let config = env.config();
        let out = submit_inner(
            &config,
            &mut env.remote,
            options(VoucherType::Krankenkassen),
            true,
        )
        .await
        .unwrap();
        assert_eq!(out.structure().unwrap().created.len(), 1);
        let (_, payload) = &env.remote.created()[0];
        assert_eq!(payload.voucher.description, "202501");
        assert_eq!(payload.voucher.credit_debit, "C");
        assert_eq!(
            payload.voucher.supplier_name.as_deref(),
            Some("Techniker Krankenkasse")
        );
    }

    #[tokio::test]
    async fn test_submit_nothing_eligible() {
        let mut env = TestEnv::new().await;
        let without_fees = env
            .remote
            .transactions()
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.id() != "1011")
            .collect();
        env.remote = env.remote.clone().with_transactions(without_fees);
        let config = env.config();
        let out = submit_inner(&config, &mut env.remote, options(VoucherType::Fees), true)
            .await
            .unwrap();
        let summary = out.structure().unwrap();
        assert!(summary.created.is_empty());
        assert_eq!(summary.left_open, 0);
    }
}
