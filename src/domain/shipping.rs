//! Zone lookup and weight-bracket rate resolution.

use thiserror::Error;

use super::entities::{RateCell, RateKey, ShippingGrid, ShippingService, ShippingZone, WeightBracket};

/// Synthetic width of the heaviest bracket, in kg.
pub const DEFAULT_LAST_BRACKET_SPAN_KG: f64 = 10.0;

/// Configuration gaps an administrator has to close; none of these is a
/// zero price.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ShippingGap {
    #[error("no active shipping zone covers country `{country}`")]
    ZoneNotFound { country: String },
    #[error("shipping service `{service}` is missing or inactive")]
    ServiceNotFound { service: String },
    #[error("no weight brackets configured")]
    NoBrackets,
    #[error("no rate configured for zone `{zone}`, service `{service}`, bracket `{bracket}`")]
    NoRate {
        zone: String,
        service: String,
        bracket: String,
    },
    #[error("zone `{zone}` is not served by `{service}` in bracket `{bracket}`")]
    NotOffered {
        zone: String,
        service: String,
        bracket: String,
    },
    #[error("billable weight {0} kg cannot be priced")]
    InvalidWeight(f64),
}

/// How the billable weight landed in its bracket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BracketFit {
    /// Inside `[min, next.min)` or the synthetic last interval.
    Within,
    /// Lighter than the first configured minimum; billed at the first tier.
    BelowFirst,
    /// Beyond the last synthetic bound; the heaviest tier keeps applying.
    Extrapolated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BracketRange<'a> {
    pub bracket: &'a WeightBracket,
    /// Exclusive upper bound.
    pub upper_kg: f64,
}

impl BracketRange<'_> {
    pub fn contains(&self, weight_kg: f64) -> bool {
        weight_kg >= self.bracket.min_weight_kg && weight_kg < self.upper_kg
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShippingQuote {
    pub zone_id: String,
    pub zone_name: String,
    pub service_id: String,
    pub bracket_id: String,
    pub bracket_min_kg: f64,
    pub billable_weight_kg: f64,
    pub fit: BracketFit,
    pub price: f64,
}

/// First active zone, in configured order, whose country set contains
/// `country`. A country listed in two zones is a data error; the first wins.
pub fn resolve_zone<'a>(grid: &'a ShippingGrid, country: &str) -> Option<&'a ShippingZone> {
    let country = country.trim();
    if country.is_empty() {
        return None;
    }
    grid.zones()
        .iter()
        .filter(|zone| zone.active)
        .find(|zone| zone.covers(country))
}

/// Active service matched by name (case-insensitive) or by id.
pub fn resolve_service<'a>(grid: &'a ShippingGrid, service: &str) -> Option<&'a ShippingService> {
    grid.services()
        .iter()
        .filter(|candidate| candidate.active)
        .find(|candidate| candidate.name.eq_ignore_ascii_case(service) || candidate.id == service)
}

/// Half-open intervals `[b[i].min, b[i+1].min)`; the last one ends at
/// `min + last_span_kg`. `brackets` must already be sorted.
pub fn bracket_ranges(brackets: &[WeightBracket], last_span_kg: f64) -> Vec<BracketRange<'_>> {
    brackets
        .iter()
        .enumerate()
        .map(|(index, bracket)| BracketRange {
            bracket,
            upper_kg: brackets
                .get(index + 1)
                .map(|next| next.min_weight_kg)
                .unwrap_or(bracket.min_weight_kg + last_span_kg),
        })
        .collect()
}

pub fn select_bracket(
    brackets: &[WeightBracket],
    weight_kg: f64,
    last_span_kg: f64,
) -> Option<(&WeightBracket, BracketFit)> {
    let ranges = bracket_ranges(brackets, last_span_kg);
    if let Some(range) = ranges.iter().find(|range| range.contains(weight_kg)) {
        return Some((range.bracket, BracketFit::Within));
    }

    let first = ranges.first()?;
    if weight_kg < first.bracket.min_weight_kg {
        return Some((first.bracket, BracketFit::BelowFirst));
    }
    ranges
        .last()
        .map(|range| (range.bracket, BracketFit::Extrapolated))
}

#[derive(Clone, Debug)]
pub struct ShippingRateResolver {
    last_bracket_span_kg: f64,
}

impl Default for ShippingRateResolver {
    fn default() -> Self {
        Self::new(DEFAULT_LAST_BRACKET_SPAN_KG)
    }
}

impl ShippingRateResolver {
    pub fn new(last_bracket_span_kg: f64) -> Self {
        Self {
            last_bracket_span_kg,
        }
    }

    /// Zone, service and rate in one pass.
    pub fn quote(
        &self,
        grid: &ShippingGrid,
        country: &str,
        service: &str,
        billable_weight_kg: f64,
    ) -> Result<ShippingQuote, ShippingGap> {
        let zone = resolve_zone(grid, country).ok_or_else(|| ShippingGap::ZoneNotFound {
            country: country.trim().to_ascii_uppercase(),
        })?;
        let service = resolve_service(grid, service).ok_or_else(|| ShippingGap::ServiceNotFound {
            service: service.to_string(),
        })?;
        self.resolve(grid, zone, service, billable_weight_kg)
    }

    pub fn resolve(
        &self,
        grid: &ShippingGrid,
        zone: &ShippingZone,
        service: &ShippingService,
        billable_weight_kg: f64,
    ) -> Result<ShippingQuote, ShippingGap> {
        if !billable_weight_kg.is_finite() || billable_weight_kg <= 0.0 {
            return Err(ShippingGap::InvalidWeight(billable_weight_kg));
        }

        let (bracket, fit) =
            select_bracket(grid.brackets(), billable_weight_kg, self.last_bracket_span_kg)
                .ok_or(ShippingGap::NoBrackets)?;

        let key = RateKey::new(&zone.id, &service.id, &bracket.id);
        let price = match grid.rate(&key) {
            Some(RateCell::Price(price)) => price,
            Some(RateCell::NotOffered) => {
                return Err(ShippingGap::NotOffered {
                    zone: key.zone_id,
                    service: key.service_id,
                    bracket: key.bracket_id,
                })
            }
            None => {
                return Err(ShippingGap::NoRate {
                    zone: key.zone_id,
                    service: key.service_id,
                    bracket: key.bracket_id,
                })
            }
        };

        Ok(ShippingQuote {
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            service_id: service.id.clone(),
            bracket_id: bracket.id.clone(),
            bracket_min_kg: bracket.min_weight_kg,
            billable_weight_kg,
            fit,
            price,
        })
    }
}
