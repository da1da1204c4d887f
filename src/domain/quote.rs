//! Quote inputs, change tracking and the priced snapshot.

use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::{entities::Dimensions, insurance::InsuranceOptions, outcome::PriceOutcome};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartonSelection {
    pub reference: String,
    /// Inner dimensions of the chosen carton, when known. They replace the
    /// freehand package dimensions for weight computation.
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteInputs {
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub actual_weight_kg: Option<f64>,
    /// ISO-3166 alpha-2 destination.
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub carton: Option<CartonSelection>,
    pub declared_value: f64,
    #[serde(default)]
    pub insurance: InsuranceOptions,
}

impl QuoteInputs {
    /// Carton dimensions take precedence over freehand entry.
    pub fn effective_dimensions(&self) -> Option<Dimensions> {
        self.carton
            .as_ref()
            .and_then(|carton| carton.dimensions)
            .filter(Dimensions::is_complete)
            .or_else(|| self.dimensions.filter(Dimensions::is_complete))
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Which inputs moved since the previous snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub dimensions: bool,
    pub destination: bool,
    pub carton: bool,
    pub declared_value: bool,
    pub insurance: bool,
}

impl ChangeSet {
    pub fn all() -> Self {
        Self {
            dimensions: true,
            destination: true,
            carton: true,
            declared_value: true,
            insurance: true,
        }
    }

    /// Diff two input sets field by field.
    pub fn between(previous: &QuoteInputs, next: &QuoteInputs) -> Self {
        Self {
            dimensions: previous.dimensions != next.dimensions
                || previous.actual_weight_kg != next.actual_weight_kg,
            destination: previous.destination() != next.destination(),
            carton: previous.carton != next.carton,
            declared_value: previous.declared_value != next.declared_value,
            insurance: previous.insurance != next.insurance,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Freehand dimensions feed the carton lookup's dimension fallback.
    pub fn affects_packaging(&self) -> bool {
        self.carton || self.dimensions
    }

    /// The carton can override the dimensions, so it feeds shipping too.
    pub fn affects_shipping(&self) -> bool {
        self.dimensions || self.destination || self.carton
    }

    pub fn affects_insurance(&self) -> bool {
        self.declared_value || self.insurance
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PricingSnapshot {
    pub volumetric_weight_kg: f64,
    pub billable_weight_kg: f64,
    pub shipping: PriceOutcome,
    pub packaging: PriceOutcome,
    pub insurance: PriceOutcome,
    pub total: f64,
    pub computed_at: OffsetDateTime,
}

impl PricingSnapshot {
    pub fn compose(
        volumetric_weight_kg: f64,
        billable_weight_kg: f64,
        shipping: PriceOutcome,
        packaging: PriceOutcome,
        insurance: PriceOutcome,
    ) -> Self {
        let total = round_money(packaging.amount() + shipping.amount() + insurance.amount());
        Self {
            volumetric_weight_kg,
            billable_weight_kg,
            shipping,
            packaging,
            insurance,
            total,
            computed_at: OffsetDateTime::now_utc(),
        }
    }

    /// True when every component is either resolved or was not asked for.
    pub fn is_complete(&self) -> bool {
        [&self.shipping, &self.packaging, &self.insurance]
            .iter()
            .all(|outcome| !outcome.needs_attention())
    }

    pub fn computed_at_rfc3339(&self) -> Option<String> {
        self.computed_at.format(&Rfc3339).ok()
    }
}

pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::Unresolved;

    #[test]
    fn carton_dimensions_override_freehand() {
        let mut inputs = QuoteInputs {
            dimensions: Some(Dimensions::new(40.0, 30.0, 20.0)),
            ..QuoteInputs::default()
        };
        assert_eq!(
            inputs.effective_dimensions(),
            Some(Dimensions::new(40.0, 30.0, 20.0))
        );

        inputs.carton = Some(CartonSelection {
            reference: "CARTON-L".to_string(),
            dimensions: Some(Dimensions::new(60.0, 40.0, 40.0)),
        });
        assert_eq!(
            inputs.effective_dimensions(),
            Some(Dimensions::new(60.0, 40.0, 40.0))
        );

        inputs.carton = Some(CartonSelection {
            reference: "CARTON-L".to_string(),
            dimensions: Some(Dimensions::new(0.0, 40.0, 40.0)),
        });
        assert_eq!(
            inputs.effective_dimensions(),
            Some(Dimensions::new(40.0, 30.0, 20.0))
        );
    }

    #[test]
    fn change_set_routes_to_dependents() {
        let before = QuoteInputs {
            destination: Some("DE".to_string()),
            declared_value: 300.0,
            ..QuoteInputs::default()
        };
        let mut after = before.clone();
        after.destination = Some(" DE ".to_string());
        assert!(ChangeSet::between(&before, &after).is_empty());

        after.carton = Some(CartonSelection::default());
        let changes = ChangeSet::between(&before, &after);
        assert!(changes.affects_packaging());
        assert!(changes.affects_shipping());
        assert!(!changes.affects_insurance());

        let mut resized = before.clone();
        resized.dimensions = Some(Dimensions::new(80.0, 60.0, 40.0));
        let changes = ChangeSet::between(&before, &resized);
        assert!(changes.affects_packaging());
        assert!(changes.affects_shipping());
        assert!(!changes.affects_insurance());
    }

    #[test]
    fn snapshot_sums_only_resolved_components() {
        let snapshot = PricingSnapshot::compose(
            5.0,
            5.0,
            PriceOutcome::Resolved(45.0),
            PriceOutcome::Unresolved(Unresolved::Undimensioned),
            PriceOutcome::Resolved(12.0),
        );
        assert_eq!(snapshot.total, 57.0);
        assert!(!snapshot.is_complete());
        assert!(snapshot.computed_at_rfc3339().is_some());
    }
}
