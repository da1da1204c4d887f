//! Catalog access: the source seam, the HTTP client and the cache.

pub mod cache;
pub mod catalog;
pub mod http;

pub use cache::{CacheStatus, CachedPayload, PricingCache};
pub use catalog::{CatalogError, CatalogKind, CatalogSource, StaticCatalog};
pub use http::HttpCatalogClient;
