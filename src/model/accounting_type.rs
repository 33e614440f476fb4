use serde::{Deserialize, Serialize};

/// A ledger booking category ("Buchungskonto") that a voucher position is booked against.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountingType {
    pub(crate) id: String,
    pub(crate) name: String,
}

impl AccountingType {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Returns the first accounting type, ordered by name then id, whose name contains `needle`.
pub fn find_accounting_type<'a>(
    types: &'a [AccountingType],
    needle: &str,
) -> Option<&'a AccountingType> {
    let mut sorted: Vec<&AccountingType> = types.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    sorted.into_iter().find(|t| t.name.contains(needle))
}

/// Lists accounting types that share a word with `needle`, for diagnosing a missing type.
pub fn similar_accounting_types<'a>(types: &'a [AccountingType], needle: &str) -> Vec<&'a str> {
    let needle_words: Vec<String> = needle
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect();
    let mut similar: Vec<&str> = types
        .iter()
        .map(|t| t.name.as_str())
        .filter(|name| {
            let lower = name.to_lowercase();
            needle_words.iter().any(|w| lower.contains(w.as_str()))
        })
        .collect();
    similar.sort_unstable();
    similar.dedup();
    similar
}
