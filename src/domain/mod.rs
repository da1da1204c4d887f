//! Pricing rules: weights, zones and brackets, cartons, insurance.

pub mod entities;
pub mod insurance;
pub mod outcome;
pub mod packaging;
pub mod quote;
pub mod shipping;
pub mod weight;

pub use entities::{
    BracketId, CartonCatalog, CartonEntry, CatalogValidationError, Dimensions, RateCell, RateKey,
    ServiceId, ShippingGrid, ShippingRate, ShippingService, ShippingZone, WeightBracket, ZoneId,
};
pub use insurance::{insurance_premium, round_premium, InsuranceOptions, InsurancePolicy};
pub use outcome::{PriceOutcome, Unresolved};
pub use packaging::{
    normalize_reference, CartonMatch, MatchStage, NormalizedReference, PackagingGap,
    PackagingPriceResolver,
};
pub use quote::{round_money, CartonSelection, ChangeSet, PricingSnapshot, QuoteInputs};
pub use shipping::{
    bracket_ranges, resolve_service, resolve_zone, select_bracket, BracketFit, BracketRange,
    ShippingGap, ShippingQuote, ShippingRateResolver,
};
pub use weight::{billable_weight, volumetric_weight};
