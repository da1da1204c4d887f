//! Volumetric and billable weight.

use super::entities::Dimensions;

/// Industry-standard divisor for cm³ → kg.
pub const DEFAULT_VOLUMETRIC_DIVISOR: f64 = 5000.0;

/// `ceil(L × W × H / divisor)` in kilograms.
///
/// Missing, negative or zero dimensions yield 0, which callers must read as
/// "undimensioned", never as "free".
pub fn volumetric_weight(dimensions: &Dimensions, divisor: f64) -> f64 {
    if !dimensions.is_complete() || !divisor.is_finite() || divisor <= 0.0 {
        return 0.0;
    }
    let volume = dimensions.length_cm * dimensions.width_cm * dimensions.height_cm;
    (volume / divisor).ceil()
}

/// Greater of volumetric and actual weight.
pub fn billable_weight(volumetric_kg: f64, actual_kg: Option<f64>) -> f64 {
    let actual = actual_kg
        .filter(|kg| kg.is_finite() && *kg > 0.0)
        .unwrap_or(0.0);
    volumetric_kg.max(actual)
}
