use serde::{Deserialize, Serialize};

/// Whether a rule decides eligibility or classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// A transaction is in scope if any filter rule matches it.
    Filter,
    /// The first matching type rule, by ascending priority, assigns bucket and cost centre.
    Type,
}

serde_plain::derive_display_from_serialize!(RuleKind);
serde_plain::derive_fromstr_from_deserialize!(RuleKind);

/// How a pattern is compared with a transaction field. Only `icontains` ignores case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The pattern is a substring of the field.
    #[default]
    Contains,
    /// The field starts with the pattern.
    StartsWith,
    /// The field equals the pattern.
    Exact,
    /// Like `contains`, but both sides are lowercased first.
    IContains,
}

serde_plain::derive_display_from_serialize!(MatchMode);
serde_plain::derive_fromstr_from_deserialize!(MatchMode);

impl MatchMode {
    pub fn matches(&self, field: &str, pattern: &str) -> bool {
        match self {
            MatchMode::Contains => field.contains(pattern),
            MatchMode::StartsWith => field.starts_with(pattern),
            MatchMode::Exact => field == pattern,
            MatchMode::IContains => field.to_lowercase().contains(&pattern.to_lowercase()),
        }
    }
}

/// A declarative classification rule, usually loaded from the rules CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClassificationRule {
    pub(crate) kind: RuleKind,
    pub(crate) payer_pattern: Option<String>,
    pub(crate) purpose_pattern: Option<String>,
    pub(crate) match_mode: MatchMode,
    /// The bucket label assigned by a type rule, e.g. `mission`.
    pub(crate) bucket: String,
    /// The exact name of the cost centre assigned by a type rule.
    pub(crate) cost_centre: String,
    /// Lower priorities are evaluated first.
    pub(crate) priority: i64,
}

impl ClassificationRule {
    /// A filter rule matching on the payment purpose.
    pub fn filter(purpose_pattern: impl Into<String>, match_mode: MatchMode) -> Self {
        Self {
            kind: RuleKind::Filter,
            payer_pattern: None,
            purpose_pattern: non_empty(purpose_pattern.into()),
            match_mode,
            bucket: String::new(),
            cost_centre: String::new(),
            priority: 0,
        }
    }

    /// A type rule with no patterns, which therefore matches everything until patterns are added.
    pub fn type_rule(
        bucket: impl Into<String>,
        cost_centre: impl Into<String>,
        priority: i64,
    ) -> Self {
        Self {
            kind: RuleKind::Type,
            payer_pattern: None,
            purpose_pattern: None,
            match_mode: MatchMode::Contains,
            bucket: bucket.into(),
            cost_centre: cost_centre.into(),
            priority,
        }
    }

    pub fn with_payer(mut self, pattern: impl Into<String>) -> Self {
        self.payer_pattern = non_empty(pattern.into());
        self
    }

    pub fn with_purpose(mut self, pattern: impl Into<String>) -> Self {
        self.purpose_pattern = non_empty(pattern.into());
        self
    }

    pub fn with_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn payer_pattern(&self) -> Option<&str> {
        self.payer_pattern.as_deref()
    }

    pub fn purpose_pattern(&self) -> Option<&str> {
        self.purpose_pattern.as_deref()
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn cost_centre(&self) -> &str {
        &self.cost_centre
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Every specified pattern must match its field. A rule without patterns matches everything.
    pub fn matches(&self, payer: &str, purpose: &str) -> bool {
        let payer_ok = self
            .payer_pattern
            .as_deref()
            .map_or(true, |p| self.match_mode.matches(payer, p));
        let purpose_ok = self
            .purpose_pattern
            .as_deref()
            .map_or(true, |p| self.match_mode.matches(purpose, p));
        payer_ok && purpose_ok
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_match_modes() {
        assert!(MatchMode::Contains.matches("Monatsspende Januar", "spende"));
        assert!(!MatchMode::Contains.matches("Monatsspende Januar", "Spende"));
        assert!(MatchMode::StartsWith.matches("Monatsspende Januar", "Monatsspende"));
        assert!(!MatchMode::StartsWith.matches("Die Monatsspende", "Monatsspende"));
        assert!(MatchMode::Exact.matches("Offering", "Offering"));
        assert!(!MatchMode::Exact.matches("Offering 2025", "Offering"));
        assert!(MatchMode::IContains.matches("Spende MIssionar", "mission"));
        assert!(MatchMode::IContains.matches("spende für missionare", "MISSION"));
        assert!(!MatchMode::IContains.matches("Spende Gemeinde", "mission"));
    }

    #[test]
    fn test_match_mode_parse() {
        assert_eq!(MatchMode::from_str("startswith").unwrap(), MatchMode::StartsWith);
        assert_eq!(MatchMode::from_str("exact").unwrap(), MatchMode::Exact);
        assert_eq!(MatchMode::from_str("icontains").unwrap(), MatchMode::IContains);
        assert!(MatchMode::from_str("regex").is_err());
        assert_eq!(RuleKind::from_str("type").unwrap(), RuleKind::Type);
    }

    #[test]
    fn test_rule_without_patterns_matches_everything() {
        let rule = ClassificationRule::type_rule("general", "Spendeneingänge Konto", 99);
        assert!(rule.matches("", ""));
        assert!(rule.matches("Max Mustermann", "anything"));
    }

    #[test]
    fn test_rule_patterns_are_and_combined() {
        let rule = ClassificationRule::type_rule("jeske", "Jeske", 1)
            .with_payer("Jeske")
            .with_purpose("Spende");
        assert!(rule.matches("Artur Jeske", "Spende Januar"));
        assert!(!rule.matches("Artur Jeske", "Miete"));
        assert!(!rule.matches("Max Mustermann", "Spende Januar"));
    }

    #[test]
    fn test_empty_pattern_is_unspecified() {
        let rule = ClassificationRule::filter("", MatchMode::Exact).with_payer("");
        assert!(rule.payer_pattern().is_none());
        assert!(rule.purpose_pattern().is_none());
        assert!(rule.matches("x", "y"));
    }
}
