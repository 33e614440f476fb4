//! Renders a voucher plan as a markdown report so it can be reviewed before submission.

use crate::model::{VoucherPlan, VoucherPlanEntry, REPORT_FORMAT};
use std::fmt::Write;

const PURPOSE_WIDTH: usize = 40;

/// Renders `plan` as a markdown document.
pub fn render(plan: &VoucherPlan) -> String {
    // Writing to a String cannot fail.
    let mut md = String::new();
    let _ = write_report(&mut md, plan);
    md
}

/// The file name a report for `plan` is written to, e.g. `plan-spenden-20250301-120000.md`.
pub fn file_name(plan: &VoucherPlan, timestamp: chrono::NaiveDateTime) -> String {
    format!(
        "plan-{}-{}.md",
        plan.voucher_type(),
        timestamp.format("%Y%m%d-%H%M%S")
    )
}

fn write_report(md: &mut String, plan: &VoucherPlan) -> std::fmt::Result {
    let missing_cc: Vec<&VoucherPlanEntry> = plan.missing_cost_centres().collect();
    let missing_contacts: Vec<&VoucherPlanEntry> = plan.missing_contacts().collect();

    writeln!(md, "# Voucher plan: {}", plan.voucher_type())?;
    writeln!(md)?;
    writeln!(
        md,
        "- Accounting type: {} ({})",
        plan.accounting_type().name(),
        plan.accounting_type().id()
    )?;
    writeln!(md, "- Vouchers: {}", plan.len())?;
    writeln!(md, "- Missing cost centres: {}", missing_cc.len())?;
    writeln!(md, "- Missing contacts: {}", missing_contacts.len())?;
    writeln!(md)?;

    if plan.is_empty() {
        writeln!(md, "No eligible transactions.")?;
        return Ok(());
    }

    writeln!(md, "## Vouchers")?;
    writeln!(md)?;
    writeln!(
        md,
        "| # | Number | Date | Amount | Payee | Purpose | Bucket | Cost centre | Contact |"
    )?;
    writeln!(md, "|---|---|---|---:|---|---|---|---|---|")?;
    for (i, entry) in plan.entries().iter().enumerate() {
        let tx = entry.transaction();
        let cost_centre = match entry.cost_centre() {
            Some(cc) => cell(cc.name()),
            None if entry.is_missing_cost_centre() => "**missing**".to_string(),
            None => "-".to_string(),
        };
        let contact = match entry.contact() {
            Some(c) => cell(c.name()),
            None => "**missing**".to_string(),
        };
        writeln!(
            md,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            i + 1,
            entry.number(),
            tx.value_date(),
            tx.amount().with_format(REPORT_FORMAT),
            cell(tx.payee()),
            cell(&truncate(tx.purpose(), PURPOSE_WIDTH)),
            entry.bucket().unwrap_or("-"),
            cost_centre,
            contact,
        )?;
    }
    writeln!(md)?;

    if !missing_cc.is_empty() {
        writeln!(md, "## Missing cost centres")?;
        writeln!(md)?;
        for entry in &missing_cc {
            write_missing(md, entry)?;
        }
        writeln!(md)?;
    }

    if !missing_contacts.is_empty() {
        writeln!(md, "## Missing contacts")?;
        writeln!(md)?;
        for entry in &missing_contacts {
            write_missing(md, entry)?;
        }
        writeln!(md)?;
    }

    let stats = plan.bucket_stats();
    if !stats.is_empty() {
        writeln!(md, "## Buckets")?;
        writeln!(md)?;
        writeln!(md, "| Bucket | Count | Total |")?;
        writeln!(md, "|---|---:|---:|")?;
        for (bucket, s) in &stats {
            writeln!(
                md,
                "| {bucket} | {} | {} |",
                s.count,
                s.total.with_format(REPORT_FORMAT)
            )?;
        }
        writeln!(md)?;
    }

    writeln!(md, "## Totals")?;
    writeln!(md)?;
    writeln!(md, "- Vouchers: {}", plan.len())?;
    writeln!(md, "- Sum: {}", plan.total().with_format(REPORT_FORMAT))?;
    Ok(())
}

fn write_missing(md: &mut String, entry: &VoucherPlanEntry) -> std::fmt::Result {
    let tx = entry.transaction();
    writeln!(
        md,
        "- {} ({}, {}): {} / {}",
        entry.number(),
        tx.value_date(),
        tx.amount().with_format(REPORT_FORMAT),
        if tx.payee().is_empty() { "-" } else { tx.payee() },
        truncate(tx.purpose(), PURPOSE_WIDTH)
    )
}

/// Shortens `s` to at most `width` characters, marking the cut with an ellipsis.
fn truncate(s: &str, width: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Makes `s` safe to use inside a markdown table cell.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}
