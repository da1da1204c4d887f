//! Fuzzy carton lookup against a hand-maintained catalog.
//!
//! Stages, first hit wins:
//! 1. exact normalized reference
//! 2. mechanical variations (spaces dropped, spaces ↔ dashes)
//! 3. substring in either direction, closest key length first
//! 4. inner dimensions within a per-axis tolerance

use thiserror::Error;

use super::entities::{CartonCatalog, CartonEntry, Dimensions};

pub const DEFAULT_TOLERANCE_CM: f64 = 2.0;

/// Shorter queries would substring-match most of the catalog.
const MIN_SUBSTRING_LEN: usize = 3;

const LEADING_DECORATION: &[char] = &['/', '-', '\u{2013}', '\u{2014}'];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchStage {
    Exact,
    Variation,
    Substring,
    Dimensions,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CartonMatch {
    /// Catalog reference as displayed, decorations stripped.
    pub reference: String,
    pub price: f64,
    pub stage: MatchStage,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PackagingGap {
    #[error("no carton reference or dimensions supplied")]
    EmptyQuery,
    #[error("no carton matches `{reference}`")]
    Unresolved {
        reference: String,
        /// One line per stage tried, for logging.
        trail: Vec<String>,
    },
    #[error("carton `{reference}` has no catalog price")]
    Unpriced { reference: String, stage: MatchStage },
}

/// Reference with its decorative prefix removed, plus the comparison key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedReference {
    pub display: String,
    pub key: String,
}

pub fn normalize_reference(raw: &str) -> NormalizedReference {
    let display = raw
        .trim_start_matches(|c: char| c.is_whitespace() || LEADING_DECORATION.contains(&c))
        .trim_end()
        .to_string();
    let key = display.to_uppercase();
    NormalizedReference { display, key }
}

fn variations(key: &str) -> Vec<String> {
    let mut out = vec![
        key.replace(' ', ""),
        key.replace(' ', "-"),
        key.replace('-', " "),
        key.replace('-', ""),
    ];
    out.retain(|variant| variant != key && !variant.is_empty());
    out.dedup();
    out
}

fn compact(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

#[derive(Clone, Debug)]
pub struct PackagingPriceResolver {
    tolerance_cm: f64,
}

impl Default for PackagingPriceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_CM)
    }
}

impl PackagingPriceResolver {
    pub fn new(tolerance_cm: f64) -> Self {
        Self { tolerance_cm }
    }

    pub fn resolve(
        &self,
        catalog: &CartonCatalog,
        reference: &str,
        dimensions: Option<&Dimensions>,
    ) -> Result<CartonMatch, PackagingGap> {
        let query = normalize_reference(reference);
        let dimensions = dimensions.filter(|dims| dims.is_complete());
        if query.key.is_empty() && dimensions.is_none() {
            return Err(PackagingGap::EmptyQuery);
        }

        let entries: Vec<(NormalizedReference, &CartonEntry)> = catalog
            .active()
            .map(|entry| (normalize_reference(&entry.reference), entry))
            .filter(|(normalized, _)| !normalized.key.is_empty())
            .collect();

        let mut trail = Vec::new();

        if !query.key.is_empty() {
            if let Some((normalized, entry)) = entries.iter().find(|(n, _)| n.key == query.key) {
                return hit(normalized, entry, MatchStage::Exact);
            }
            trail.push(format!("exact: no entry keyed `{}`", query.key));

            let variants = variations(&query.key);
            let compact_query = compact(&query.key);
            if let Some((normalized, entry)) = entries.iter().find(|(n, _)| {
                variants.iter().any(|variant| *variant == n.key) || compact(&n.key) == compact_query
            }) {
                return hit(normalized, entry, MatchStage::Variation);
            }
            trail.push(format!("variation: none of {variants:?} matched"));

            if query.key.chars().count() >= MIN_SUBSTRING_LEN {
                let query_len = query.key.chars().count();
                let best = entries
                    .iter()
                    .filter(|(n, _)| query.key.contains(&n.key) || n.key.contains(&query.key))
                    .min_by_key(|(n, _)| n.key.chars().count().abs_diff(query_len));
                if let Some((normalized, entry)) = best {
                    return hit(normalized, entry, MatchStage::Substring);
                }
                trail.push("substring: no overlapping reference".to_string());
            } else {
                trail.push(format!(
                    "substring: skipped, reference shorter than {MIN_SUBSTRING_LEN} characters"
                ));
            }
        }

        match dimensions {
            Some(wanted) => {
                if let Some((normalized, entry)) = entries.iter().find(|(_, entry)| {
                    entry
                        .inner
                        .as_ref()
                        .map(|inner| inner.within(wanted, self.tolerance_cm))
                        .unwrap_or(false)
                }) {
                    return hit(normalized, entry, MatchStage::Dimensions);
                }
                trail.push(format!(
                    "dimensions: nothing within ±{} cm of {}×{}×{}",
                    self.tolerance_cm, wanted.length_cm, wanted.width_cm, wanted.height_cm
                ));
            }
            None => trail.push("dimensions: not supplied".to_string()),
        }

        Err(PackagingGap::Unresolved {
            reference: query.display,
            trail,
        })
    }
}

fn hit(
    normalized: &NormalizedReference,
    entry: &CartonEntry,
    stage: MatchStage,
) -> Result<CartonMatch, PackagingGap> {
    match entry.price {
        Some(price) => Ok(CartonMatch {
            reference: normalized.display.clone(),
            price,
            stage,
        }),
        None => Err(PackagingGap::Unpriced {
            reference: normalized.display.clone(),
            stage,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carton(reference: &str, price: f64, inner: Option<(f64, f64, f64)>) -> CartonEntry {
        CartonEntry {
            reference: reference.to_string(),
            price: Some(price),
            inner: inner.map(|(l, w, h)| Dimensions::new(l, w, h)),
            active: true,
        }
    }

    fn catalog() -> CartonCatalog {
        CartonCatalog::new(vec![
            carton("CARTON-M-XL", 14.0, None),
            carton("— CARTON-M", 8.0, Some((50.0, 40.0, 30.0))),
            carton("Box Large", 11.0, Some((80.0, 60.0, 40.0))),
            carton("CARTON", 5.0, None),
            CartonEntry {
                active: false,
                ..carton("TUBE-90", 6.0, None)
            },
        ])
        .unwrap()
    }

    #[test]
    fn strips_decorative_prefix() {
        let normalized = normalize_reference("  / –\u{2014}- Carton-m ");
        assert_eq!(normalized.display, "Carton-m");
        assert_eq!(normalized.key, "CARTON-M");
    }

    #[test]
    fn exact_match_beats_substring() {
        let found = PackagingPriceResolver::default()
            .resolve(&catalog(), " / CARTON-M", None)
            .unwrap();
        assert_eq!(found.reference, "CARTON-M");
        assert_eq!(found.price, 8.0);
        assert_eq!(found.stage, MatchStage::Exact);
    }

    #[test]
    fn variations_bridge_formatting_differences() {
        let resolver = PackagingPriceResolver::default();

        let found = resolver.resolve(&catalog(), "box-large", None).unwrap();
        assert_eq!(found.price, 11.0);
        assert_eq!(found.stage, MatchStage::Variation);

        let found = resolver.resolve(&catalog(), "boxlarge", None).unwrap();
        assert_eq!(found.stage, MatchStage::Variation);
    }

    #[test]
    fn substring_prefers_closest_key_length() {
        let found = PackagingPriceResolver::default()
            .resolve(&catalog(), "CARTON-M-X", None)
            .unwrap();
        assert_eq!(found.stage, MatchStage::Substring);
        assert_eq!(found.reference, "CARTON-M-XL");
    }

    #[test]
    fn dimension_fallback_within_tolerance() {
        let resolver = PackagingPriceResolver::default();

        let found = resolver
            .resolve(&catalog(), "", Some(&Dimensions::new(51.0, 39.0, 31.0)))
            .unwrap();
        assert_eq!(found.price, 8.0);
        assert_eq!(found.stage, MatchStage::Dimensions);

        let missed = resolver.resolve(&catalog(), "", Some(&Dimensions::new(53.0, 40.0, 30.0)));
        assert!(matches!(missed, Err(PackagingGap::Unresolved { .. })));
    }

    #[test]
    fn inactive_entries_are_ignored() {
        let missed = PackagingPriceResolver::default().resolve(&catalog(), "TUBE-90", None);
        match missed {
            Err(PackagingGap::Unresolved { reference, trail }) => {
                assert_eq!(reference, "TUBE-90");
                assert_eq!(trail.len(), 4);
            }
            other => panic!("expected unresolved, got {other:?}"),
        }
    }

    #[test]
    fn empty_query_is_rejected() {
        assert_eq!(
            PackagingPriceResolver::default().resolve(&catalog(), " - ", None),
            Err(PackagingGap::EmptyQuery)
        );
    }

    #[test]
    fn zero_priced_carton_still_resolves() {
        let catalog = CartonCatalog::new(vec![carton("ENVELOPE", 0.0, None)]).unwrap();
        let found = PackagingPriceResolver::default()
            .resolve(&catalog, "envelope", None)
            .unwrap();
        assert_eq!(found.price, 0.0);
    }

    #[test]
    fn unpriced_carton_is_a_gap_not_free() {
        let catalog = CartonCatalog::new(vec![
            CartonEntry {
                price: None,
                ..carton("CARTON-M", 0.0, None)
            },
            carton("CARTON-M-XL", 14.0, None),
        ])
        .unwrap();

        assert_eq!(
            PackagingPriceResolver::default().resolve(&catalog, "carton-m", None),
            Err(PackagingGap::Unpriced {
                reference: "CARTON-M".to_string(),
                stage: MatchStage::Exact,
            })
        );
    }
}
