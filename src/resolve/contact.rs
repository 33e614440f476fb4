use crate::model::Contact;
use crate::normalize::{normalize, words};
use crate::resolve::Overrides;
use std::collections::BTreeSet;
use tracing::trace;

const EXACT: i64 = 1000;
const SUBSTRING: i64 = 500;
const SUBSET_BONUS: i64 = 10;
const CATEGORY_BONUS: i64 = 10_000;

/// A contact together with its normalized name.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    contact: &'a Contact,
    normalized: String,
}

/// Finds the contact that best matches a payee or payer string.
///
/// Matching happens on normalized names (see `normalize`) in three tiers, where the first tier
/// that fires for a candidate decides its score:
/// - exact: an alternative form of the query equals the contact name
/// - substring: an alternative form contains the contact name or vice versa
/// - word overlap: the number of shared words, plus a bonus if all of the contact's words occur in
///   the query
///
/// A contact in the preferred category gets a bonus that outranks every tier, so for an expense
/// voucher a supplier that matches by substring beats a customer with the exact same name.
#[derive(Debug, Clone)]
pub struct ContactResolver<'a> {
    candidates: Vec<Candidate<'a>>,
}

impl<'a> ContactResolver<'a> {
    /// Prepares `contacts` for resolution. Contacts whose name normalizes to nothing are ignored.
    pub fn new(contacts: &'a [Contact]) -> Self {
        let mut sorted: Vec<&Contact> = contacts.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        let candidates = sorted
            .into_iter()
            .map(|contact| Candidate {
                contact,
                normalized: normalize(&contact.name),
            })
            .filter(|c| !c.normalized.is_empty())
            .collect();
        Self { candidates }
    }

    /// Returns the best match for `query`, or `None`.
    ///
    /// `overrides` are checked first: when the normalized query equals the normalized key, the
    /// contact whose normalized name equals the normalized value is returned regardless of its
    /// category.
    pub fn resolve(
        &self,
        query: &str,
        preferred_category: Option<&str>,
        overrides: &Overrides,
    ) -> Option<&'a Contact> {
        let normalized = normalize(query);
        if normalized.is_empty() {
            return None;
        }

        if let Some(contact) = self.resolve_override(&normalized, overrides) {
            trace!("Contact '{query}' resolved by override to '{}'", contact.name);
            return Some(contact);
        }

        let alternatives = alternatives(query, &normalized);
        let query_words = words(&normalized);
        let query_set: BTreeSet<&str> = query_words.iter().copied().collect();

        let mut best: Option<(i64, &'a Contact)> = None;
        for candidate in &self.candidates {
            let Some(mut score) = score(candidate, &alternatives, &query_words, &query_set) else {
                continue;
            };
            if preferred_category.is_some() && candidate.contact.category_id() == preferred_category
            {
                score += CATEGORY_BONUS;
            }
            // Strictly greater, so the first candidate with the highest score wins.
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, candidate.contact));
            }
        }

        match best {
            Some((score, contact)) => {
                trace!("Contact '{query}' resolved to '{}' (score {score})", contact.name);
                Some(contact)
            }
            None => {
                trace!("No contact found for '{query}'");
                None
            }
        }
    }

    /// Tries each query in turn and returns the first that resolves.
    pub fn resolve_first<'q>(
        &self,
        queries: impl IntoIterator<Item = &'q str>,
        preferred_category: Option<&str>,
        overrides: &Overrides,
    ) -> Option<&'a Contact> {
        queries
            .into_iter()
            .find_map(|q| self.resolve(q, preferred_category, overrides))
    }

    fn resolve_override(&self, normalized: &str, overrides: &Overrides) -> Option<&'a Contact> {
        overrides
            .iter()
            .filter(|(trigger, _)| normalize(trigger) == normalized)
            .find_map(|(_, target)| {
                let target = normalize(target);
                self.candidates
                    .iter()
                    .find(|c| c.normalized == target)
                    .map(|c| c.contact)
            })
    }
}

/// Builds the normalized forms of `query` to try, highest priority first.
fn alternatives(query: &str, normalized: &str) -> Vec<String> {
    let mut alternatives = vec![normalized.to_string()];

    // "Last, First"
    let parts: Vec<&str> = query.split(',').map(str::trim).collect();
    if parts.len() == 2 {
        alternatives.push(normalize(&format!("{} {}", parts[1], parts[0])));
    }

    let words = words(normalized);

    // Two payers run together, e.g. "THOMAS MEIER NINA MEIER".
    if words.len() >= 4 {
        alternatives.insert(0, words[..words.len() / 2].join(" "));
    }

    // "Adrian und Diane Meier" is tried as "adrian meier" before anything else.
    if words.len() >= 3 {
        if let Some(ix) = words.iter().position(|w| *w == "und") {
            if ix > 0 && ix < words.len() - 1 {
                alternatives.insert(0, format!("{} {}", words[0], words[words.len() - 1]));
            }
        }
    }

    alternatives.retain(|a| !a.is_empty());
    alternatives
}

/// Scores a candidate without the category bonus. Returns `None` if it does not match at all.
fn score(
    candidate: &Candidate<'_>,
    alternatives: &[String],
    query_words: &[&str],
    query_set: &BTreeSet<&str>,
) -> Option<i64> {
    let name = candidate.normalized.as_str();

    if let Some(ix) = alternatives.iter().position(|a| a == name) {
        return Some(EXACT - ix as i64);
    }

    if let Some(ix) = alternatives
        .iter()
        .position(|a| name.contains(a.as_str()) || a.contains(name))
    {
        return Some(SUBSTRING - ix as i64);
    }

    let name_words = words(name);
    let name_set: BTreeSet<&str> = name_words.iter().copied().collect();
    let common = query_set.intersection(&name_set).count();
    let mut score = common as i64;
    if name_set.is_subset(query_set) {
        score += SUBSET_BONUS;
    }

    // Only a shared surname: two different people.
    if query_set.len() >= 2 && name_set.len() >= 2 && common > 0 {
        let query_first_shared = query_words
            .first()
            .is_some_and(|w| name_set.contains(w));
        let name_first_shared = name_words
            .first()
            .is_some_and(|w| query_set.contains(w));
        if !query_first_shared && !name_first_shared {
            score = 0;
        }
    }

    (score > 0).then_some(score)
}
