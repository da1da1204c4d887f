use std::fmt;

use super::{packaging::PackagingGap, shipping::ShippingGap};

/// Why a price component could not be resolved from the catalogs.
#[derive(Clone, Debug, PartialEq)]
pub enum Unresolved {
    Shipping(ShippingGap),
    Packaging(PackagingGap),
    /// No usable dimensions nor weight to bill from.
    Undimensioned,
    MissingDestination,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shipping(gap) => write!(f, "{gap}"),
            Self::Packaging(gap) => write!(f, "{gap}"),
            Self::Undimensioned => f.write_str("package has no dimensions or weight"),
            Self::MissingDestination => f.write_str("no destination country"),
        }
    }
}

/// Result of one price component.
///
/// `Resolved(0.0)` is a real free item; the other variants also sum as zero
/// but must be surfaced to the operator.
#[derive(Clone, Debug, PartialEq)]
pub enum PriceOutcome {
    Resolved(f64),
    /// Nothing was asked for, e.g. no carton selected.
    NotRequested,
    Unresolved(Unresolved),
    /// Catalog unavailable and nothing cached.
    Failed(String),
}

impl PriceOutcome {
    pub fn amount(&self) -> f64 {
        match self {
            Self::Resolved(amount) => *amount,
            _ => 0.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Whether the operator should be warned about this component.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::Unresolved(_) | Self::Failed(_))
    }
}

impl fmt::Display for PriceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(amount) => write!(f, "{amount:.2}"),
            Self::NotRequested => f.write_str("not requested"),
            Self::Unresolved(reason) => write!(f, "unresolved: {reason}"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resolved_contributes_an_amount() {
        assert_eq!(PriceOutcome::Resolved(12.5).amount(), 12.5);
        assert_eq!(PriceOutcome::Failed("timeout".into()).amount(), 0.0);
        assert_eq!(
            PriceOutcome::Unresolved(Unresolved::MissingDestination).amount(),
            0.0
        );
    }

    #[test]
    fn free_is_not_a_failure() {
        assert!(!PriceOutcome::Resolved(0.0).needs_attention());
        assert!(!PriceOutcome::NotRequested.needs_attention());
        assert!(PriceOutcome::Unresolved(Unresolved::Undimensioned).needs_attention());
        assert!(PriceOutcome::Failed("offline".into()).needs_attention());
    }
}
