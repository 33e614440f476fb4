//! Allocation of voucher reference numbers of the form `PREFIX-YEAR-N`, e.g. `B-2025-17`.
//!
//! The next number is one more than the highest number already used this year by the vouchers the
//! accounting service returns as most recent.

use crate::error::Res;
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The identifying text of a voucher that already exists in the accounting service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecentVoucher {
    pub voucher_number: Option<String>,
    pub description: Option<String>,
}

impl RecentVoucher {
    pub fn new(voucher_number: Option<&str>, description: Option<&str>) -> Self {
        Self {
            voucher_number: voucher_number.map(str::to_string),
            description: description.map(str::to_string),
        }
    }

    /// The voucher number, or the description when the number is empty.
    fn reference(&self) -> Option<&str> {
        match self.voucher_number.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => Some(n),
            _ => self.description.as_deref(),
        }
    }
}

/// Hands out consecutive reference numbers within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingState {
    prefix: String,
    year: i32,
    next: u64,
}

impl NumberingState {
    /// Starts numbering at `first`.
    pub fn new(prefix: impl Into<String>, year: i32, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            year,
            next: first.max(1),
        }
    }

    /// Scans `recent` for numbers of `year` with this prefix and continues after the highest.
    pub fn discover(prefix: &str, year: i32, recent: &[RecentVoucher]) -> Res<Self> {
        let re = Regex::new(&format!(r"^{}-(\d{{4}})-(\d+)", regex::escape(prefix)))
            .context("Unable to build the voucher number pattern")?;
        let highest = recent
            .iter()
            .filter_map(RecentVoucher::reference)
            .filter_map(|r| re.captures(r.trim()))
            .filter_map(|caps| {
                let y = caps.get(1)?.as_str().parse::<i32>().ok()?;
                let n = caps.get(2)?.as_str().parse::<u64>().ok()?;
                (y == year).then_some(n)
            })
            .max()
            .unwrap_or(0);
        debug!("Highest voucher number for {prefix}-{year} is {highest}");
        Ok(Self::new(prefix, year, highest + 1))
    }

    /// Like `discover`, but a failed lookup starts at 1 with a warning instead of failing.
    pub fn discover_or_start(prefix: &str, year: i32, recent: Res<Vec<RecentVoucher>>) -> Self {
        let found = recent.and_then(|recent| Self::discover(prefix, year, &recent));
        match found {
            Ok(state) => state,
            Err(e) => {
                warn!("Unable to determine the last voucher number, starting at 1: {e:#}");
                Self::new(prefix, year, 1)
            }
        }
    }

    /// The number the next call to `next` returns, without consuming it.
    pub fn peek(&self) -> String {
        self.format(self.next)
    }

    /// Returns the next reference number.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> String {
        let n = self.next;
        self.next += 1;
        self.format(n)
    }

    fn format(&self, n: u64) -> String {
        format!("{}-{}-{}", self.prefix, self.year, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn make_recent(numbers: &[&str]) -> Vec<RecentVoucher> {
        numbers
            .iter()
            .map(|n| RecentVoucher::new(Some(n), None))
            .collect()
    }

    #[test]
    fn test_discover_continues_after_highest() {
        let recent = make_recent(&["B-2025-3", "B-2025-12", "B-2025-7", "B-2024-99"]);
        let mut state = NumberingState::discover("B", 2025, &recent).unwrap();
        assert_eq!(state.next(), "B-2025-13");
        assert_eq!(state.next(), "B-2025-14");
    }

    #[test]
    fn test_discover_ignores_other_years_and_prefixes() {
        let recent = make_recent(&["B-2024-99", "X-2025-50", "RE-1001", "", "xB-2025-40"]);
        let mut state = NumberingState::discover("B", 2025, &recent).unwrap();
        assert_eq!(state.next(), "B-2025-1");
    }

    #[test]
    fn test_discover_uses_description_when_number_is_empty() {
        let recent = vec![
            RecentVoucher::new(Some(""), Some("B-2025-8")),
            RecentVoucher::new(None, Some("B-2025-9 Spende")),
            RecentVoucher::new(Some("B-2025-2"), Some("B-2025-50")),
        ];
        let state = NumberingState::discover("B", 2025, &recent).unwrap();
        assert_eq!(state.peek(), "B-2025-10");
    }

    #[test]
    fn test_prefix_is_escaped() {
        let recent = make_recent(&["A.B-2025-4", "AxB-2025-90"]);
        let state = NumberingState::discover("A.B", 2025, &recent).unwrap();
        assert_eq!(state.peek(), "A.B-2025-5");
    }

    #[test]
    fn test_failed_lookup_starts_at_one() {
        let mut state = NumberingState::discover_or_start("B", 2025, Err(anyhow!("timeout")));
        assert_eq!(state.next(), "B-2025-1");
    }
}
