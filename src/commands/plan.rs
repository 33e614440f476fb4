use crate::api::{self, Mode, Remote};
use crate::commands::refresh::{load_cached, refresh_snapshot};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::{VoucherPlan, REPORT_FORMAT};
use crate::numbering::NumberingState;
use crate::plan::PlanBuilder;
use crate::rules::RuleEngine;
use crate::vouchers::VoucherType;
use crate::{report, utils, Config, Result};
use chrono::Datelike;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// The outcome of planning one voucher type.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub voucher_type: VoucherType,
    pub accounting_type: String,
    pub vouchers: usize,
    pub missing_cost_centres: usize,
    pub missing_contacts: usize,
    pub total: String,
    pub first_number: Option<String>,
    pub last_number: Option<String>,
    pub report: PathBuf,
}

impl PlanSummary {
    pub(crate) fn new(plan: &VoucherPlan, report: PathBuf) -> Self {
        Self {
            voucher_type: plan.voucher_type(),
            accounting_type: plan.accounting_type().name().to_string(),
            vouchers: plan.len(),
            missing_cost_centres: plan.missing_cost_centres().count(),
            missing_contacts: plan.missing_contacts().count(),
            total: plan.total().with_format(REPORT_FORMAT).to_string(),
            first_number: plan.entries().first().map(|e| e.number().to_string()),
            last_number: plan.entries().last().map(|e| e.number().to_string()),
            report,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match (&self.first_number, &self.last_number) {
            (Some(first), Some(last)) => format!(
                "Planned {} {} vouchers ({first} to {last}, {}), {} missing cost centres, {} \
                missing contacts. Report: {}",
                self.vouchers,
                self.voucher_type,
                self.total,
                self.missing_cost_centres,
                self.missing_contacts,
                self.report.display()
            ),
            _ => format!(
                "No eligible {} transactions. Report: {}",
                self.voucher_type,
                self.report.display()
            ),
        }
    }
}

/// Options shared by `plan` and `submit`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlanOptions {
    pub(crate) voucher_type: VoucherType,
    pub(crate) all_statuses: bool,
    pub(crate) no_refresh: bool,
    /// The year reference numbers are allocated in.
    pub(crate) year: i32,
}

impl PlanOptions {
    pub(crate) fn new(voucher_type: VoucherType, all_statuses: bool, no_refresh: bool) -> Self {
        Self {
            voucher_type,
            all_statuses,
            no_refresh,
            year: chrono::Local::now().year(),
        }
    }
}

/// Builds the voucher plan for `voucher_type` and writes it as a markdown report.
pub async fn plan(
    config: Config,
    mode: Mode,
    voucher_type: VoucherType,
    all_statuses: bool,
    no_refresh: bool,
) -> Result<Out<PlanSummary>> {
    let mut remote = api::remote(&config, mode)
        .await
        .pub_result(ErrorType::Config)?;
    let options = PlanOptions::new(voucher_type, all_statuses, no_refresh);
    plan_inner(&config, remote.as_mut(), options).await
}

pub(crate) async fn plan_inner(
    config: &Config,
    remote: &mut (dyn Remote + Send),
    options: PlanOptions,
) -> Result<Out<PlanSummary>> {
    let (plan, report) = prepare(config, remote, options).await?;
    let summary = PlanSummary::new(&plan, report);
    for entry in plan.missing_cost_centres() {
        warn!(
            "{}: no cost centre for '{}' / '{}'",
            entry.number(),
            entry.transaction().payee(),
            entry.transaction().purpose()
        );
    }
    for entry in plan.missing_contacts() {
        warn!(
            "{}: no contact for '{}'",
            entry.number(),
            entry.transaction().payee()
        );
    }
    Ok(Out::new(summary.describe(), summary))
}

/// Loads the snapshot (refreshing it first unless `no_refresh`), builds the plan and writes the
/// report. Returns the plan and the path of the report.
pub(crate) async fn prepare(
    config: &Config,
    remote: &mut (dyn Remote + Send),
    options: PlanOptions,
) -> Result<(VoucherPlan, PathBuf)> {
    let snapshot = if options.no_refresh {
        load_cached(config).await?
    } else {
        refresh_snapshot(config, remote).await?
    };

    let rules = RuleEngine::load(&config.rules_path())
        .await
        .pub_result(ErrorType::Rules)?;

    let recent = remote.recent_voucher_numbers().await;
    let mut numbering =
        NumberingState::discover_or_start(config.number_prefix(), options.year, recent);
    debug!("The first reference number is {}", numbering.peek());

    let settings = config.voucher_settings(options.voucher_type);
    let plan = PlanBuilder::new(&snapshot, &rules)
        .all_statuses(options.all_statuses)
        .build(options.voucher_type, &settings, &mut numbering)?;

    let report_path = config.reports().join(report::file_name(
        &plan,
        chrono::Local::now().naive_local(),
    ));
    utils::write(&report_path, report::render(&plan))
        .await
        .pub_result(ErrorType::Config)?;
    debug!("Wrote the plan report to {}", report_path.display());
    Ok((plan, report_path))
}

#[cfg(test)]
mod tests {
    use super::*;
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
    async fn test_plan_spenden() {
        let mut env = TestEnv::new().await;
        let config = env.config();
        let out = plan_inner(&config, &mut env.remote, options(VoucherType::Spenden))
            .await
            .unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.vouchers, 3);
        assert_eq!(summary.accounting_type, "Spendeneingang");
        assert_eq!(summary.first_number.as_deref(), Some("B-2025-42"));
        assert_eq!(summary.last_number.as_deref(), Some("B-2025-44"));
        assert_eq!(summary.missing_cost_centres, 0);
        assert_eq!(summary.missing_contacts, 1);
        assert!(summary.report.is_file());

        let md = std::fs::read_to_string(&summary.report).unwrap();
        assert!(md.starts_with("# Voucher plan: spenden"));
        assert!(md.contains("Tobias Zimmermann (Spende für Tobias)"));
        assert!(md.contains("## Missing contacts"));
        assert_eq!(env.reports().len(), 1);
    }

    #[tokio::test]
    async fn test_plan_no_refresh_requires_cache() {
        let mut env = TestEnv::new().await;
        let config = env.config();
        let mut opts = options(VoucherType::Gehalt);
        opts.no_refresh = true;
        let e = plan_inner(&config, &mut env.remote, opts)
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Database);

        opts.no_refresh = false;
        plan_inner(&config, &mut env.remote, opts).await.unwrap();
        opts.no_refresh = true;
        let out = plan_inner(&config, &mut env.remote, opts).await.unwrap();
        assert_eq!(out.structure().unwrap().vouchers, 1);
    }

    #[tokio::test]
    async fn test_plan_all_statuses() {
        let mut env = TestEnv::new().await;
        let config = env.config();
        let mut opts = options(VoucherType::Spenden);
        opts.all_statuses = true;
        let out = plan_inner(&config, &mut env.remote, opts).await.unwrap();
        assert_eq!(out.structure().unwrap().vouchers, 4);
    }

    #[tokio::test]
    async fn test_plan_without_type_rules_is_a_rules_error() {
        let mut env = TestEnv::new().await;
        env.write_rules("kind,payer_pattern,purpose_pattern,bucket,cost_centre,priority,match_mode\nfilter,,Spende,,,,contains\n");
        let config = env.config();
        let e = plan_inner(&config, &mut env.remote, options(VoucherType::Spenden))
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Rules);
        assert!(env.reports().is_empty());
    }

    #[tokio::test]
    async fn test_plan_every_voucher_type() {
        let mut env = TestEnv::new().await;
        let config = env.config();
        for vt in VoucherType::ALL {
            let out = plan_inner(&config, &mut env.remote, options(vt))
                .await
                .unwrap();
            assert!(out.structure().unwrap().vouchers > 0, "{vt}");
        }
        assert_eq!(env.reports().len(), VoucherType::ALL.len());
    }

    #[tokio::test]
    async fn test_plan_numbering_starts_at_one_for_a_new_year() {
        let mut env = TestEnv::new().await;
        let config = env.config();
        let mut opts = options(VoucherType::Gehalt);
        opts.year = SEED_YEAR + 1;
        let out = plan_inner(&config, &mut env.remote, opts).await.unwrap();
        assert_eq!(
            out.structure().unwrap().first_number.as_deref(),
            Some("B-2026-1")
        );
    }

    #[test]
    fn test_describe_empty_plan() {
        let summary = PlanSummary {
            voucher_type: VoucherType::Fees,
            accounting_type: "Kontoführung / Kartengebühren".to_string(),
            vouchers: 0,
            missing_cost_centres: 0,
            missing_contacts: 0,
            total: "0.00 €".to_string(),
            first_number: None,
            last_number: None,
            report: PathBuf::from("/tmp/plan-fees.md"),
        };
        assert_eq!(
            summary.describe(),
            "No eligible fees transactions. Report: /tmp/plan-fees.md"
        );
    }
}
