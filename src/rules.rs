//! The classification rule engine.
//!
//! Rules are loaded from a CSV file with the columns
//! `kind,payer_pattern,purpose_pattern,bucket,cost_centre,priority,match_mode`. Lines starting
//! with `#` are comments. Rows that cannot be parsed are skipped with a warning so that one typo
//! does not block a whole run.

use crate::error::Res;
use crate::model::{ClassificationRule, MatchMode, RuleKind};
use crate::utils;
use anyhow::{bail, ensure, Context};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// The built-in donation rules. `init` writes these to the home directory, where they can be
/// edited.
pub const DEFAULT_RULES_CSV: &str = include_str!("rules/default.csv");

/// The outcome of classifying a transaction with the type rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification<'a> {
    rule: &'a ClassificationRule,
    fallback: bool,
}

impl<'a> Classification<'a> {
    pub fn bucket(&self) -> &'a str {
        self.rule.bucket()
    }

    pub fn cost_centre(&self) -> &'a str {
        self.rule.cost_centre()
    }

    /// True if no type rule matched and the first bucket was used instead.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

/// Holds filter rules and priority-ordered type rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleEngine {
    filters: Vec<ClassificationRule>,
    types: Vec<ClassificationRule>,
}

impl RuleEngine {
    /// Builds an engine from `rules`. Type rules are ordered by ascending priority. Rules with
    /// equal priority keep their relative order.
    pub fn new(rules: impl IntoIterator<Item = ClassificationRule>) -> Self {
        let (filters, mut types): (Vec<_>, Vec<_>) = rules
            .into_iter()
            .partition(|r| r.kind() == RuleKind::Filter);
        types.sort_by_key(|r| r.priority());
        Self { filters, types }
    }

    /// Parses the built-in rules.
    pub fn builtin() -> Res<Self> {
        Self::from_csv(DEFAULT_RULES_CSV.as_bytes())
    }

    /// Loads rules from the CSV file at `path`.
    pub async fn load(path: &Path) -> Res<Self> {
        let content = utils::read(path).await?;
        let engine = Self::from_csv(content.as_bytes())
            .with_context(|| format!("Unable to parse rules file '{}'", path.display()))?;
        debug!(
            "Loaded {} filter rules and {} type rules from {}",
            engine.filters.len(),
            engine.types.len(),
            path.display()
        );
        Ok(engine)
    }

    /// Parses rules from CSV data. Malformed rows are skipped with a warning, a missing header row
    /// is an error.
    pub fn from_csv(reader: impl Read) -> Res<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = rdr.headers().context("Unable to read rules header")?.clone();
        ensure!(
            headers.iter().any(|h| h == "kind"),
            "The rules file has no 'kind' column"
        );

        let mut rules = Vec::new();
        for result in rdr.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable rule row: {e}");
                    continue;
                }
            };
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            let parsed = record
                .deserialize::<RuleRow>(Some(&headers))
                .context("Unable to deserialize row")
                .and_then(RuleRow::into_rule);
            match parsed {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!("Skipping malformed rule on line {line}: {e:#}"),
            }
        }
        Ok(Self::new(rules))
    }

    pub fn filters(&self) -> &[ClassificationRule] {
        &self.filters
    }

    /// Type rules in evaluation order.
    pub fn type_rules(&self) -> &[ClassificationRule] {
        &self.types
    }

    /// True if any filter rule matches.
    pub fn is_in_scope(&self, payer: &str, purpose: &str) -> bool {
        self.filters.iter().any(|r| r.matches(payer, purpose))
    }

    /// Returns the first type rule that matches. If none does, a warning is logged and the first
    /// type rule is used. Fails only when there are no type rules at all.
    pub fn classify(&self, payer: &str, purpose: &str) -> Res<Classification<'_>> {
        if let Some(rule) = self.types.iter().find(|r| r.matches(payer, purpose)) {
            return Ok(Classification {
                rule,
                fallback: false,
            });
        }
        let Some(first) = self.types.first() else {
            bail!("The rules contain no type rules, so no bucket can be assigned");
        };
        warn!(
            "No type rule matches payer '{payer}' with purpose '{purpose}', falling back to \
            bucket '{}'. Consider adding a catch-all type rule.",
            first.bucket()
        );
        Ok(Classification {
            rule: first,
            fallback: true,
        })
    }

    /// Fails if there are no type rules.
    pub fn ensure_type_rules(&self) -> Res<()> {
        ensure!(
            !self.types.is_empty(),
            "The rules contain no type rules, so no bucket can be assigned"
        );
        Ok(())
    }

    /// The distinct cost centre names that type rules assign, in evaluation order.
    pub fn cost_centre_names(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.types
            .iter()
            .map(|r| r.cost_centre())
            .filter(|name| !name.is_empty() && seen.insert(*name))
            .collect()
    }
}

/// A row of the rules CSV file before validation.
#[derive(Debug, Deserialize)]
struct RuleRow {
    kind: String,
    #[serde(default)]
    payer_pattern: String,
    #[serde(default)]
    purpose_pattern: String,
    #[serde(default)]
    bucket: String,
    #[serde(default)]
    cost_centre: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    match_mode: String,
}

impl RuleRow {
    fn into_rule(self) -> Res<ClassificationRule> {
        let kind = RuleKind::from_str(self.kind.trim())
            .with_context(|| format!("Invalid rule kind '{}'", self.kind))?;

        let match_mode = match self.match_mode.trim() {
            "" => MatchMode::default(),
            s => MatchMode::from_str(s).with_context(|| format!("Invalid match mode '{s}'"))?,
        };

        let priority = match self.priority.trim() {
            "" => 0,
            s => s
                .parse::<i64>()
                .with_context(|| format!("Invalid priority '{s}'"))?,
        };

        let rule = match kind {
            RuleKind::Filter => {
                if self.payer_pattern.is_empty() && self.purpose_pattern.is_empty() {
                    warn!("A filter rule without patterns puts every transaction in scope");
                }
                ClassificationRule::filter(self.purpose_pattern, match_mode)
                    .with_payer(self.payer_pattern)
            }
            RuleKind::Type => {
                let bucket = self.bucket.trim();
                ensure!(!bucket.is_empty(), "A type rule needs a bucket");
                ClassificationRule::type_rule(bucket, self.cost_centre.trim(), priority)
                    .with_payer(self.payer_pattern)
                    .with_purpose(self.purpose_pattern)
                    .with_mode(match_mode)
            }
        };
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rules(csv: &str) -> RuleEngine {
        RuleEngine::from_csv(csv.as_bytes()).unwrap()
    }

    const HEADER: &str = "kind,payer_pattern,purpose_pattern,bucket,cost_centre,priority,match_mode\n";

    #[test]
    fn test_builtin_rules_parse() {
        let engine = RuleEngine::builtin().unwrap();
        assert_eq!(engine.filters().len(), 13);
        assert_eq!(engine.type_rules().len(), 5);
        assert_eq!(engine.type_rules().last().unwrap().bucket(), "general");
        assert_eq!(
            engine.cost_centre_names(),
            vec![
                "Jeske (Durchlaufende Posten)",
                "Tobias Zimmermann (Spende für Tobias)",
                "Spendeneingänge Missionare",
                "Spendeneingänge Konto",
            ]
        );
    }

    #[test]
    fn test_builtin_tobias_classification() {
        let engine = RuleEngine::builtin().unwrap();
        let purpose = "Spende Tobias Zimmermann Januar";
        assert!(engine.is_in_scope("Max Mustermann", purpose));
        let c = engine.classify("Max Mustermann", purpose).unwrap();
        assert_eq!(c.bucket(), "tobias");
        assert_eq!(c.cost_centre(), "Tobias Zimmermann (Spende für Tobias)");
        assert!(!c.is_fallback());

        // Other keywords in the purpose do not change the bucket.
        let purpose = "MONATLICHE SPENDE Spende Tobias Zimmermann Mission";
        let c = engine.classify("Max Mustermann", purpose).unwrap();
        assert_eq!(c.bucket(), "tobias");
    }

    #[test]
    fn test_builtin_mission_and_general() {
        let engine = RuleEngine::builtin().unwrap();
        assert_eq!(
            engine.classify("", "Spende für Missionare").unwrap().bucket(),
            "mission"
        );
        assert_eq!(
            engine.classify("", "SPENDE MISSIONSWERK").unwrap().bucket(),
            "mission"
        );
        assert_eq!(
            engine.classify("", "Spende MIssion Peru").unwrap().bucket(),
            "mission"
        );
        assert_eq!(engine.classify("", "Spende").unwrap().bucket(), "general");
        assert_eq!(
            engine.classify("", "Spende Artur Jeske").unwrap().bucket(),
            "jeske"
        );
    }

    #[test]
    fn test_builtin_filters() {
        let engine = RuleEngine::builtin().unwrap();
        assert!(engine.is_in_scope("", "Monatsspende Mai"));
        assert!(!engine.is_in_scope("", "Die Monatsspende"));
        assert!(engine.is_in_scope("", "Sunday Offering"));
        assert!(!engine.is_in_scope("", "Miete Mai"));
        assert!(!engine.is_in_scope("", "spende"));
    }

    #[test]
    fn test_priority_order() {
        let csv = format!(
            "{HEADER}type,,Spende,second,CC Two,2,contains\ntype,,Spende,first,CC One,1,contains\n"
        );
        let engine = make_rules(&csv);
        let c = engine.classify("", "Spende").unwrap();
        assert_eq!(c.bucket(), "first");
        assert_eq!(c.cost_centre(), "CC One");
    }

    #[test]
    fn test_payer_and_purpose_are_and_combined() {
        let csv = format!(
            "{HEADER}type,Jeske,Spende,jeske,Jeske,1,contains\ntype,,,general,Konto,9,contains\n"
        );
        let engine = make_rules(&csv);
        assert_eq!(engine.classify("Artur Jeske", "Spende").unwrap().bucket(), "jeske");
        assert_eq!(engine.classify("Artur Jeske", "Miete").unwrap().bucket(), "general");
        assert_eq!(engine.classify("Max", "Spende").unwrap().bucket(), "general");
    }

    #[test]
    fn test_fallback_to_first_bucket() {
        let csv = format!(
            "{HEADER}type,,Mission,mission,Missionare,5,contains\ntype,,Jeske,jeske,Jeske,1,contains\n"
        );
        let engine = make_rules(&csv);
        let c = engine.classify("", "Spende").unwrap();
        assert!(c.is_fallback());
        assert_eq!(c.bucket(), "jeske");
    }

    #[test]
    fn test_no_type_rules_is_an_error() {
        let csv = format!("{HEADER}filter,,Spende,,,,contains\n");
        let engine = make_rules(&csv);
        assert!(engine.classify("", "Spende").is_err());
        assert!(engine.ensure_type_rules().is_err());
    }

    #[test]
    fn test_malformed_and_comment_rows_are_skipped() {
        let csv = format!(
            "{HEADER}\
            # a comment\n\
            bogus,,Spende,,,,contains\n\
            filter,,Spende,,,,regex\n\
            type,,Spende,,Konto,1,contains\n\
            type,,Spende,general,Konto,high,contains\n\
            filter,,Spende,,,,exact\n\
            \n\
            type,,,general,Konto,9\n"
        );
        let engine = make_rules(&csv);
        assert_eq!(engine.filters().len(), 1);
        assert_eq!(engine.filters()[0].match_mode(), MatchMode::Exact);
        assert_eq!(engine.type_rules().len(), 1);
        assert_eq!(engine.type_rules()[0].match_mode(), MatchMode::Contains);
        assert_eq!(engine.type_rules()[0].priority(), 9);
    }

    #[test]
    fn test_filter_without_patterns_accepts_everything() {
        let csv = format!("{HEADER}filter,,,,,,contains\ntype,,,general,Konto,9,contains\n");
        let engine = make_rules(&csv);
        assert_eq!(engine.filters().len(), 1);
        assert!(engine.is_in_scope("", ""));
        assert!(engine.is_in_scope("Stadtwerke", "Miete Mai"));
    }

    #[test]
    fn test_missing_header_is_an_error() {
        assert!(RuleEngine::from_csv("filter,,Spende,,,,contains\n".as_bytes()).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rules.csv");
        utils::write(&path, DEFAULT_RULES_CSV).await.unwrap();
        let engine = RuleEngine::load(&path).await.unwrap();
        assert_eq!(engine, RuleEngine::builtin().unwrap());
    }
}
