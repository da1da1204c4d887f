use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifiers as handed out by the catalog service.
pub type ZoneId = String;
pub type ServiceId = String;
pub type BracketId = String;

/// Inner or outer package dimensions, in centimeters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

impl Dimensions {
    pub fn new(length_cm: f64, width_cm: f64, height_cm: f64) -> Self {
        Self {
            length_cm,
            width_cm,
            height_cm,
        }
    }

    /// True when every axis carries a usable, strictly positive measurement.
    pub fn is_complete(&self) -> bool {
        [self.length_cm, self.width_cm, self.height_cm]
            .iter()
            .all(|axis| axis.is_finite() && *axis > 0.0)
    }

    /// Per-axis comparison; axis order matters, no rotation is attempted.
    pub fn within(&self, other: &Dimensions, tolerance_cm: f64) -> bool {
        (self.length_cm - other.length_cm).abs() <= tolerance_cm
            && (self.width_cm - other.width_cm).abs() <= tolerance_cm
            && (self.height_cm - other.height_cm).abs() <= tolerance_cm
    }
}

/// A named group of destination countries sharing one rate table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingZone {
    pub id: ZoneId,
    pub name: String,
    /// ISO-3166 alpha-2 codes, stored uppercase.
    pub countries: Vec<String>,
    pub active: bool,
}

impl ShippingZone {
    /// Case-insensitive exact membership test (no prefix matching).
    pub fn covers(&self, country: &str) -> bool {
        self.countries
            .iter()
            .any(|code| code.eq_ignore_ascii_case(country))
    }
}

/// Shipping speed/class tier, e.g. "EXPRESS".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingService {
    pub id: ServiceId,
    pub name: String,
    pub active: bool,
}

/// Lower bound (inclusive) of a weight tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightBracket {
    pub id: BracketId,
    pub min_weight_kg: f64,
    pub position: i32,
}

/// One cell of the rate grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RateCell {
    Price(f64),
    /// The account explicitly does not ship this combination.
    NotOffered,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingRate {
    pub zone_id: ZoneId,
    pub service_id: ServiceId,
    pub bracket_id: BracketId,
    pub cell: RateCell,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub zone_id: ZoneId,
    pub service_id: ServiceId,
    pub bracket_id: BracketId,
}

impl RateKey {
    pub fn new(zone_id: &str, service_id: &str, bracket_id: &str) -> Self {
        Self {
            zone_id: zone_id.to_string(),
            service_id: service_id.to_string(),
            bracket_id: bracket_id.to_string(),
        }
    }
}

/// Rejections raised while turning raw catalog records into value types.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CatalogValidationError {
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },
    #[error("weight bracket `{id}` has invalid minimum {min}")]
    InvalidBracket { id: String, min: f64 },
    #[error("weight brackets `{first}` and `{second}` share the same minimum")]
    OverlappingBrackets { first: String, second: String },
    #[error("rate references unknown {kind} `{id}`")]
    UnknownReference { kind: &'static str, id: String },
    #[error("duplicate rate for zone `{zone}`, service `{service}`, bracket `{bracket}`")]
    DuplicateRate {
        zone: String,
        service: String,
        bracket: String,
    },
    #[error("invalid price {price} for `{subject}`")]
    InvalidPrice { subject: String, price: f64 },
}

/// Validated snapshot of the zone/service/bracket/rate configuration.
///
/// Brackets are kept sorted ascending by minimum weight.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShippingGrid {
    zones: Vec<ShippingZone>,
    services: Vec<ShippingService>,
    brackets: Vec<WeightBracket>,
    rates: HashMap<RateKey, RateCell>,
}

impl ShippingGrid {
    pub fn new(
        zones: Vec<ShippingZone>,
        services: Vec<ShippingService>,
        mut brackets: Vec<WeightBracket>,
        rates: Vec<ShippingRate>,
    ) -> Result<Self, CatalogValidationError> {
        let zone_ids = unique_ids("zone", zones.iter().map(|z| z.id.as_str()))?;
        let service_ids = unique_ids("service", services.iter().map(|s| s.id.as_str()))?;
        let bracket_ids = unique_ids("bracket", brackets.iter().map(|b| b.id.as_str()))?;

        if let Some(bad) = brackets
            .iter()
            .find(|b| !b.min_weight_kg.is_finite() || b.min_weight_kg < 0.0)
        {
            return Err(CatalogValidationError::InvalidBracket {
                id: bad.id.clone(),
                min: bad.min_weight_kg,
            });
        }

        brackets.sort_by(|a, b| {
            a.min_weight_kg
                .total_cmp(&b.min_weight_kg)
                .then(a.position.cmp(&b.position))
        });
        if let Some(pair) = brackets
            .windows(2)
            .find(|pair| pair[0].min_weight_kg == pair[1].min_weight_kg)
        {
            return Err(CatalogValidationError::OverlappingBrackets {
                first: pair[0].id.clone(),
                second: pair[1].id.clone(),
            });
        }

        let mut table = HashMap::with_capacity(rates.len());
        for rate in rates {
            check_reference("zone", &zone_ids, &rate.zone_id)?;
            check_reference("service", &service_ids, &rate.service_id)?;
            check_reference("bracket", &bracket_ids, &rate.bracket_id)?;

            if let RateCell::Price(price) = rate.cell {
                if !price.is_finite() || price < 0.0 {
                    return Err(CatalogValidationError::InvalidPrice {
                        subject: format!("{}/{}/{}", rate.zone_id, rate.service_id, rate.bracket_id),
                        price,
                    });
                }
            }

            let key = RateKey {
                zone_id: rate.zone_id,
                service_id: rate.service_id,
                bracket_id: rate.bracket_id,
            };
            if table.contains_key(&key) {
                return Err(CatalogValidationError::DuplicateRate {
                    zone: key.zone_id,
                    service: key.service_id,
                    bracket: key.bracket_id,
                });
            }
            table.insert(key, rate.cell);
        }

        Ok(Self {
            zones,
            services,
            brackets,
            rates: table,
        })
    }

    /// Zones in configured order.
    pub fn zones(&self) -> &[ShippingZone] {
        &self.zones
    }

    pub fn services(&self) -> &[ShippingService] {
        &self.services
    }

    /// Brackets sorted ascending by minimum weight.
    pub fn brackets(&self) -> &[WeightBracket] {
        &self.brackets
    }

    pub fn rate(&self, key: &RateKey) -> Option<RateCell> {
        self.rates.get(key).copied()
    }

    pub fn rate_count(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty() && self.brackets.is_empty() && self.rates.is_empty()
    }
}

/// A packaging SKU.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartonEntry {
    /// Reference as maintained in the catalog, decorations included.
    pub reference: String,
    /// `None` when the catalog lists the carton without a price.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub inner: Option<Dimensions>,
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CartonCatalog {
    entries: Vec<CartonEntry>,
}

impl CartonCatalog {
    pub fn new(entries: Vec<CartonEntry>) -> Result<Self, CatalogValidationError> {
        if let Some((bad, price)) = entries.iter().find_map(|entry| {
            entry
                .price
                .filter(|price| !price.is_finite() || *price < 0.0)
                .map(|price| (entry, price))
        }) {
            return Err(CatalogValidationError::InvalidPrice {
                subject: bad.reference.clone(),
                price,
            });
        }
        Ok(Self { entries })
    }

    /// Entries in catalog order.
    pub fn entries(&self) -> &[CartonEntry] {
        &self.entries
    }

    pub fn active(&self) -> impl Iterator<Item = &CartonEntry> {
        self.entries.iter().filter(|entry| entry.active)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn unique_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashSet<String>, CatalogValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.to_string()) {
            return Err(CatalogValidationError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(seen)
}

fn check_reference(
    kind: &'static str,
    known: &HashSet<String>,
    id: &str,
) -> Result<(), CatalogValidationError> {
    if known.contains(id) {
        Ok(())
    } else {
        Err(CatalogValidationError::UnknownReference {
            kind,
            id: id.to_string(),
        })
    }
}
