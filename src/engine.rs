//! Composition root: one cache, the resolvers, and the entry points the
//! quote screens call.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{
    billable_weight, insurance_premium, volumetric_weight, CartonMatch, Dimensions,
    InsuranceOptions, InsurancePolicy, PackagingGap, PackagingPriceResolver, PriceOutcome,
    QuoteInputs, ShippingGap, ShippingQuote, ShippingRateResolver, Unresolved,
};
use crate::infra::{
    cache::{CacheStatus, PricingCache},
    catalog::{CatalogError, CatalogSource},
    http::HttpCatalogClient,
};
use crate::util::config::PricingConfig;

/// Outcome of a catalog-backed lookup before it is flattened into a
/// [`PriceOutcome`].
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup<T, G> {
    Found(T),
    Gap(G),
    /// Catalog could not be fetched and nothing was cached.
    Failed(CatalogError),
}

pub struct PricingEngine {
    cache: PricingCache,
    shipping: ShippingRateResolver,
    packaging: PackagingPriceResolver,
    insurance: InsurancePolicy,
    service_name: String,
    volumetric_divisor: f64,
}

impl PricingEngine {
    pub fn new(source: Arc<dyn CatalogSource>, config: &PricingConfig) -> Self {
        Self {
            cache: PricingCache::from_config(source, config),
            shipping: ShippingRateResolver::new(config.last_bracket_span_kg),
            packaging: PackagingPriceResolver::new(config.carton_tolerance_cm),
            insurance: config.insurance.clone(),
            service_name: config.service_name.clone(),
            volumetric_divisor: config.volumetric_divisor,
        }
    }

    /// Engine over the HTTP catalog service named in `config`.
    pub fn from_config(config: &PricingConfig) -> Result<Self, CatalogError> {
        let client = HttpCatalogClient::from_config(config)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn cache(&self) -> &PricingCache {
        &self.cache
    }

    pub fn volumetric_weight(&self, dimensions: &Dimensions) -> f64 {
        volumetric_weight(dimensions, self.volumetric_divisor)
    }

    /// `(volumetric, billable)` in kg.
    pub fn weights(&self, dimensions: Option<&Dimensions>, actual_kg: Option<f64>) -> (f64, f64) {
        let volumetric = dimensions
            .map(|dims| self.volumetric_weight(dims))
            .unwrap_or(0.0);
        (volumetric, billable_weight(volumetric, actual_kg))
    }

    pub fn insurance_premium(&self, declared_value: f64, options: &InsuranceOptions) -> f64 {
        insurance_premium(declared_value, options, &self.insurance)
    }

    pub async fn shipping_quote(
        &self,
        country: &str,
        billable_weight_kg: f64,
    ) -> Lookup<ShippingQuote, ShippingGap> {
        let grid = self.cache.shipping_grid().await;
        if grid.status == CacheStatus::Empty {
            if let Some(error) = grid.error {
                return Lookup::Failed(error);
            }
        }

        match self
            .shipping
            .quote(&grid.data, country, &self.service_name, billable_weight_kg)
        {
            Ok(quote) => {
                debug!(
                    country,
                    zone = %quote.zone_id,
                    bracket = %quote.bracket_id,
                    fit = ?quote.fit,
                    price = quote.price,
                    "shipping resolved"
                );
                Lookup::Found(quote)
            }
            Err(gap) => {
                warn!(country, billable_weight_kg, %gap, "shipping unresolved");
                Lookup::Gap(gap)
            }
        }
    }

    pub async fn carton_match(
        &self,
        reference: &str,
        dimensions: Option<&Dimensions>,
    ) -> Lookup<CartonMatch, PackagingGap> {
        let catalog = self.cache.carton_catalog().await;
        if catalog.status == CacheStatus::Empty {
            if let Some(error) = catalog.error {
                return Lookup::Failed(error);
            }
        }

        match self.packaging.resolve(&catalog.data, reference, dimensions) {
            Ok(found) => {
                debug!(reference, matched = %found.reference, stage = ?found.stage, "carton resolved");
                Lookup::Found(found)
            }
            Err(gap) => {
                match &gap {
                    PackagingGap::Unresolved { trail, .. } => {
                        warn!(reference, trail = ?trail, "carton unresolved")
                    }
                    other => warn!(reference, gap = %other, "carton unresolved"),
                }
                Lookup::Gap(gap)
            }
        }
    }

    pub async fn shipping_price(&self, country: &str, billable_weight_kg: f64) -> PriceOutcome {
        match self.shipping_quote(country, billable_weight_kg).await {
            Lookup::Found(quote) => PriceOutcome::Resolved(quote.price),
            Lookup::Gap(gap) => PriceOutcome::Unresolved(Unresolved::Shipping(gap)),
            Lookup::Failed(error) => PriceOutcome::Failed(error.to_string()),
        }
    }

    pub async fn packaging_price(
        &self,
        reference: &str,
        dimensions: Option<&Dimensions>,
    ) -> PriceOutcome {
        match self.carton_match(reference, dimensions).await {
            Lookup::Found(found) => PriceOutcome::Resolved(found.price),
            Lookup::Gap(gap) => PriceOutcome::Unresolved(Unresolved::Packaging(gap)),
            Lookup::Failed(error) => PriceOutcome::Failed(error.to_string()),
        }
    }

    /// Shipping for a whole quote: destination and billable weight must
    /// both be present.
    pub async fn shipping_for(&self, inputs: &QuoteInputs, billable_weight_kg: f64) -> PriceOutcome {
        let Some(country) = inputs.destination() else {
            return PriceOutcome::Unresolved(Unresolved::MissingDestination);
        };
        if billable_weight_kg <= 0.0 {
            return PriceOutcome::Unresolved(Unresolved::Undimensioned);
        }
        self.shipping_price(country, billable_weight_kg).await
    }

    /// Packaging for a whole quote; no carton selected means nothing to bill.
    pub async fn packaging_for(&self, inputs: &QuoteInputs) -> PriceOutcome {
        let Some(carton) = inputs.carton.as_ref() else {
            return PriceOutcome::NotRequested;
        };
        let dimensions = inputs.effective_dimensions();
        if carton.reference.trim().is_empty() && dimensions.is_none() {
            return PriceOutcome::NotRequested;
        }
        self.packaging_price(&carton.reference, dimensions.as_ref())
            .await
    }

    pub fn insurance_for(&self, inputs: &QuoteInputs) -> PriceOutcome {
        PriceOutcome::Resolved(self.insurance_premium(inputs.declared_value, &inputs.insurance))
    }
}
