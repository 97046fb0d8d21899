use std::collections::BTreeMap;

use once_cell::sync::Lazy;

/// The canonical signal-source → owned-signal-type table. Codes are
/// externally assigned; source 100 owns the 10x types, source 200 the 20x
/// types.
static DEFAULT_SIGNALS: Lazy<BTreeMap<String, Vec<String>>> = Lazy::new(|| {
    let mut owned = BTreeMap::new();
    owned.insert(
        "100".to_string(),
        vec!["101", "102", "103", "104"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    owned.insert(
        "200".to_string(),
        vec!["201", "202", "203"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    owned
});

/// Immutable ownership mapping from signal sources to the signal types they
/// emit. Constructed once at startup and shared read-only across requests;
/// alternate taxonomies can be injected for testing.
#[derive(Debug, Clone)]
pub struct SignalTaxonomy {
    owned_types: BTreeMap<String, Vec<String>>,
}

/// The source and type filter sets a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSelection {
    pub sources: Vec<String>,
    pub types: Vec<String>,
}

impl Default for SignalTaxonomy {
    fn default() -> Self {
        SignalTaxonomy {
            owned_types: DEFAULT_SIGNALS.clone(),
        }
    }
}

impl SignalTaxonomy {
    pub fn new(owned_types: BTreeMap<String, Vec<String>>) -> Self {
        SignalTaxonomy { owned_types }
    }

    pub fn all_sources(&self) -> Vec<String> {
        self.owned_types.keys().cloned().collect()
    }

    pub fn all_types(&self) -> Vec<String> {
        self.owned_types.values().flatten().cloned().collect()
    }

    pub fn is_known_source(&self, source: &str) -> bool {
        self.owned_types.contains_key(source)
    }

    pub fn is_known_type(&self, signal_type: &str) -> bool {
        self.owned_types
            .values()
            .any(|types| types.iter().any(|t| t == signal_type))
    }

    /// Resolves optional explicit source and type filters into the pair of
    /// filter sets to query with.
    ///
    /// With neither given, the full canonical sets are returned. Explicit
    /// `types` take precedence and derive the minimal covering source set;
    /// explicit `sources` alone expand to the union of their owned types,
    /// with unknown source codes contributing nothing.
    pub fn resolve(
        &self,
        sources: Option<&[String]>,
        types: Option<&[String]>,
    ) -> SignalSelection {
        let sources = sources.filter(|s| !s.is_empty());
        let types = types.filter(|t| !t.is_empty());

        match (sources, types) {
            (None, None) => SignalSelection {
                sources: self.all_sources(),
                types: self.all_types(),
            },
            (_, Some(requested_types)) => {
                let mut covering_sources = Vec::new();
                for (source, owned) in &self.owned_types {
                    if requested_types.iter().any(|t| owned.contains(t))
                        && !covering_sources.contains(source)
                    {
                        covering_sources.push(source.clone());
                    }
                }
                SignalSelection {
                    sources: covering_sources,
                    types: requested_types.to_vec(),
                }
            }
            (Some(requested_sources), None) => {
                let mut owned_union = Vec::new();
                for source in requested_sources {
                    if let Some(owned) = self.owned_types.get(source) {
                        owned_union.extend(owned.iter().cloned());
                    }
                }
                SignalSelection {
                    sources: requested_sources.to_vec(),
                    types: owned_union,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_filters_yield_full_sets() {
        let taxonomy = SignalTaxonomy::default();
        let selection = taxonomy.resolve(None, None);
        assert_eq!(selection.sources, strings(&["100", "200"]));
        assert_eq!(
            selection.types,
            strings(&["101", "102", "103", "104", "201", "202", "203"])
        );
    }

    #[test]
    fn types_derive_minimal_covering_sources() {
        let taxonomy = SignalTaxonomy::default();
        let requested = strings(&["101", "201"]);
        let selection = taxonomy.resolve(None, Some(&requested));
        assert_eq!(selection.sources, strings(&["100", "200"]));
        // Requested types stay exact, not expanded to the full owned sets.
        assert_eq!(selection.types, strings(&["101", "201"]));
    }

    #[test]
    fn types_take_precedence_over_sources() {
        let taxonomy = SignalTaxonomy::default();
        let sources = strings(&["200"]);
        let types = strings(&["101"]);
        let selection = taxonomy.resolve(Some(&sources), Some(&types));
        assert_eq!(selection.sources, strings(&["100"]));
        assert_eq!(selection.types, strings(&["101"]));
    }

    #[test]
    fn sources_expand_to_owned_types() {
        let taxonomy = SignalTaxonomy::default();
        let requested = strings(&["200"]);
        let selection = taxonomy.resolve(Some(&requested), None);
        assert_eq!(selection.sources, strings(&["200"]));
        assert_eq!(selection.types, strings(&["201", "202", "203"]));
    }

    #[test]
    fn unknown_sources_contribute_no_types() {
        let taxonomy = SignalTaxonomy::default();
        let requested = strings(&["999", "100"]);
        let selection = taxonomy.resolve(Some(&requested), None);
        assert_eq!(selection.sources, strings(&["999", "100"]));
        assert_eq!(selection.types, strings(&["101", "102", "103", "104"]));
    }
}
