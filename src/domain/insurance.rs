//! Insurance premium: percentage of declared value with a floor and a
//! half-unit rounding law.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    /// Fraction of the declared value, 0.025 = 2.5 %.
    pub rate: f64,
    /// Minimum premium for declared values under `floor_threshold`.
    pub floor: f64,
    /// Exclusive upper bound for the floor to apply.
    pub floor_threshold: f64,
}

impl Default for InsurancePolicy {
    fn default() -> Self {
        Self {
            rate: 0.025,
            floor: 12.0,
            floor_threshold: 500.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InsuranceOptions {
    pub enabled: bool,
    /// Amount typed in by an operator; used instead of the computed premium
    /// when positive.
    #[serde(default)]
    pub override_amount: Option<f64>,
}

impl InsuranceOptions {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            override_amount: None,
        }
    }
}

/// Premium for `declared_value` under `policy`.
///
/// A declared value of zero (or NaN) insures nothing and costs nothing; the
/// floor only kicks in for positive values below the threshold.
pub fn insurance_premium(
    declared_value: f64,
    options: &InsuranceOptions,
    policy: &InsurancePolicy,
) -> f64 {
    if !options.enabled {
        return 0.0;
    }

    if let Some(amount) = options
        .override_amount
        .filter(|amount| amount.is_finite() && *amount > 0.0)
    {
        return round_premium(amount);
    }

    let value = if declared_value.is_finite() {
        declared_value
    } else {
        0.0
    };
    if value <= 0.0 {
        return 0.0;
    }

    let floor = if value < policy.floor_threshold {
        policy.floor
    } else {
        0.0
    };
    round_premium((value * policy.rate).max(floor))
}

/// Absorbs float noise such as 540 × 0.025 = 13.4999…; far below a cent so
/// sub-cent fractions still count.
const FRACTION_TOLERANCE: f64 = 1e-9;

/// Rounds up to the next unit from .5, to the half unit below that, and
/// leaves whole amounts untouched: 13.50 → 14, 13.49 → 13.5, 12.00 → 12.
pub fn round_premium(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0.0;
    }
    let whole = raw.floor();
    let fraction = raw - whole;
    if fraction >= 0.5 - FRACTION_TOLERANCE {
        whole + 1.0
    } else if fraction > FRACTION_TOLERANCE {
        whole + 0.5
    } else {
        whole
    }
}
