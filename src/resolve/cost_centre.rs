use crate::model::CostCentre;
use crate::resolve::Overrides;
use tracing::trace;

/// Finds cost centres by name.
///
/// Cost centre names are a small, curated vocabulary, so matching is plain case-insensitive
/// substring containment and the first match wins.
#[derive(Debug, Clone)]
pub struct CostCentreResolver<'a> {
    candidates: Vec<&'a CostCentre>,
}

impl<'a> CostCentreResolver<'a> {
    pub fn new(cost_centres: &'a [CostCentre]) -> Self {
        let mut candidates: Vec<&CostCentre> = cost_centres.iter().collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Self { candidates }
    }

    /// Resolves `query` to a cost centre.
    ///
    /// For each override whose key occurs in the lower-cased query, the first cost centre whose
    /// lower-cased name contains the override value is returned. Otherwise the first cost centre
    /// whose lower-cased name contains the query, or is contained in it, is returned.
    pub fn resolve(&self, query: &str, overrides: &Overrides) -> Option<&'a CostCentre> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return None;
        }

        for (key, target) in overrides {
            if !q.contains(&key.to_lowercase()) {
                continue;
            }
            let target = target.to_lowercase();
            if let Some(cc) = self
                .candidates
                .iter()
                .copied()
                .find(|cc| cc.name.to_lowercase().contains(&target))
            {
                trace!("Cost centre '{query}' resolved by override to '{}'", cc.name);
                return Some(cc);
            }
        }

        let found = self.candidates.iter().copied().find(|cc| {
            let name = cc.name.trim().to_lowercase();
            // An empty name would be contained in every query.
            !name.is_empty() && (name.contains(&q) || q.contains(&name))
        });
        match found {
            Some(cc) => trace!("Cost centre '{query}' resolved to '{}'", cc.name),
            None => trace!("No cost centre found for '{query}'"),
        }
        found
    }

    /// Returns the cost centre whose name is exactly `name`.
    pub fn find_exact(&self, name: &str) -> Option<&'a CostCentre> {
        self.candidates.iter().copied().find(|cc| cc.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cc(id: &str, name: &str) -> CostCentre {
        CostCentre::new(id, name)
    }

    fn overrides(pairs: &[(&str, &str)]) -> Overrides {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substring_both_directions() {
        let ccs = vec![make_cc("1", "Wilhelmson"), make_cc("2", "Lohnnebenkosten")];
        let resolver = CostCentreResolver::new(&ccs);
        assert_eq!(resolver.resolve("wilhelm", &Overrides::new()).unwrap().id(), "1");
        assert_eq!(
            resolver
                .resolve("Missionar Wilhelmson Finnland", &Overrides::new())
                .unwrap()
                .id(),
            "1"
        );
        assert!(resolver.resolve("Gemeindebau", &Overrides::new()).is_none());
    }

    #[test]
    fn test_empty_query() {
        let ccs = vec![make_cc("1", "Wilhelmson")];
        assert!(CostCentreResolver::new(&ccs).resolve("  ", &Overrides::new()).is_none());
    }

    #[test]
    fn test_empty_names_never_match() {
        let ccs = vec![make_cc("1", ""), make_cc("2", "Hodzi")];
        let resolver = CostCentreResolver::new(&ccs);
        assert!(resolver.resolve("Gemeindebau", &Overrides::new()).is_none());
        assert_eq!(resolver.resolve("hodzi", &Overrides::new()).unwrap().id(), "2");
    }

    #[test]
    fn test_override_takes_precedence() {
        let ccs = vec![
            make_cc("1", "Gwendolyn Dewhurst (alt)"),
            make_cc("2", "Gwen Dewhurst"),
        ];
        let resolver = CostCentreResolver::new(&ccs);
        let o = overrides(&[("gwendolyn dewhurst", "gwen dewhurst")]);
        assert_eq!(resolver.resolve("Gwendolyn Dewhurst", &o).unwrap().id(), "2");
        assert_eq!(
            resolver
                .resolve("Gwendolyn Dewhurst", &Overrides::new())
                .unwrap()
                .id(),
            "1"
        );
    }

    #[test]
    fn test_override_without_target_falls_back() {
        let ccs = vec![make_cc("1", "Tobias Zimmermann")];
        let resolver = CostCentreResolver::new(&ccs);
        let o = overrides(&[("tobias zimmermann", "tobias zimmermann (ülp)")]);
        assert_eq!(resolver.resolve("Tobias Zimmermann", &o).unwrap().id(), "1");
    }

    #[test]
    fn test_first_match_in_name_order() {
        // Both contain the query. The first by name wins, not the best match.
        let ccs = vec![
            make_cc("1", "Samuel Jeanrichard (intern)"),
            make_cc("2", "Samuel Jeanrichard"),
        ];
        let resolver = CostCentreResolver::new(&ccs);
        assert_eq!(
            resolver
                .resolve("samuel jeanrichard", &Overrides::new())
                .unwrap()
                .id(),
            "2"
        );
        let reversed: Vec<CostCentre> = ccs.into_iter().rev().collect();
        let resolver = CostCentreResolver::new(&reversed);
        assert_eq!(
            resolver
                .resolve("samuel jeanrichard", &Overrides::new())
                .unwrap()
                .id(),
            "2"
        );
    }

    #[test]
    fn test_find_exact() {
        let ccs = vec![
            make_cc("1", "Spendeneingänge Konto"),
            make_cc("2", "Spendeneingänge Missionare"),
        ];
        let resolver = CostCentreResolver::new(&ccs);
        assert_eq!(resolver.find_exact("Spendeneingänge Konto").unwrap().id(), "1");
        assert!(resolver.find_exact("spendeneingänge konto").is_none());
        assert!(resolver.find_exact("Spendeneingänge").is_none());
    }
}
