//! Seam to the two read-only catalog services.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CartonCatalog, CatalogValidationError, ShippingGrid};

/// Transient failures while reaching a catalog. `Clone` so a single shared
/// fetch can hand the same failure to every waiter.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("http request error: {0}")]
    Http(String),
    #[error("catalog responded with HTTP {0}")]
    Status(u16),
    #[error("not authenticated against the catalog service")]
    Unauthenticated,
    #[error("catalog fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("api error: {0}")]
    Api(String),
    #[error("invalid catalog data: {0}")]
    Invalid(#[from] CatalogValidationError),
}

impl From<url::ParseError> for CatalogError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status)
                if status == reqwest::StatusCode::UNAUTHORIZED
                    || status == reqwest::StatusCode::FORBIDDEN =>
            {
                Self::Unauthenticated
            }
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Http(error.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Shipping,
    Cartons,
}

impl CatalogKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shipping => "shipping-grid",
            Self::Cartons => "cartons",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_shipping_grid(&self) -> Result<ShippingGrid, CatalogError>;

    async fn fetch_carton_catalog(&self) -> Result<CartonCatalog, CatalogError>;
}

/// Fixed in-memory catalogs, for offline use and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    pub grid: ShippingGrid,
    pub cartons: CartonCatalog,
}

impl StaticCatalog {
    pub fn new(grid: ShippingGrid, cartons: CartonCatalog) -> Self {
        Self { grid, cartons }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_shipping_grid(&self) -> Result<ShippingGrid, CatalogError> {
        Ok(self.grid.clone())
    }

    async fn fetch_carton_catalog(&self) -> Result<CartonCatalog, CatalogError> {
        Ok(self.cartons.clone())
    }
}
