//! Thin asynchronous client for the account's catalog service.
//!
//! - `GET shipping-grid`: zones, services, weight brackets and rates.
//! - `GET cartons`: packaging SKUs.
//!
//! Both answer with a `{status, data, message}` envelope. Caching lives in
//! [`crate::infra::cache`], not here.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::domain::{
    CartonCatalog, CartonEntry, Dimensions, RateCell, ShippingGrid, ShippingRate, ShippingService,
    ShippingZone, WeightBracket,
};
use crate::infra::catalog::{CatalogError, CatalogKind, CatalogSource};
use crate::util::config::PricingConfig;

const USER_AGENT: &str = concat!("quote-pricing/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct HttpCatalogClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpCatalogClient {
    pub fn new(base: &str) -> Result<Self, CatalogError> {
        // Url::join drops the last segment unless the base ends with '/'.
        let base_url = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{base}/"))?
        };
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    pub fn from_config(config: &PricingConfig) -> Result<Self, CatalogError> {
        let client = Self::new(&config.catalog_base_url)?;
        Ok(match config.api_token.as_deref() {
            Some(token) => client.with_token(token),
            None => client,
        })
    }

    /// Bearer token of the session maintained outside this crate.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn fetch_data<T>(&self, kind: CatalogKind) -> Result<T, CatalogError>
    where
        T: DeserializeOwned,
    {
        let url = self.base_url.join(kind.name())?;
        debug!(%url, "requesting catalog");

        let mut builder = self.http.get(url);
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?.error_for_status()?;
        let envelope: ApiEnvelope<T> = response.json().await?;
        let ApiEnvelope {
            status,
            data,
            message,
        } = envelope;

        if status.eq_ignore_ascii_case("ok") {
            data.ok_or_else(|| CatalogError::Api("response missing data".into()))
        } else if status.eq_ignore_ascii_case("unauthenticated") {
            Err(CatalogError::Unauthenticated)
        } else {
            Err(CatalogError::Api(message.unwrap_or(status)))
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    async fn fetch_shipping_grid(&self) -> Result<ShippingGrid, CatalogError> {
        let raw = self
            .fetch_data::<serde_json::Value>(CatalogKind::Shipping)
            .await?;
        parse_shipping_grid(raw)
    }

    async fn fetch_carton_catalog(&self) -> Result<CartonCatalog, CatalogError> {
        let raw = self
            .fetch_data::<serde_json::Value>(CatalogKind::Cartons)
            .await?;
        parse_carton_catalog(raw)
    }
}

#[derive(Debug, Deserialize)]
struct ShippingGridDto {
    #[serde(default)]
    zones: Vec<ZoneDto>,
    #[serde(default)]
    services: Vec<ServiceDto>,
    #[serde(default, alias = "weightBrackets", alias = "brackets")]
    weight_brackets: Vec<BracketDto>,
    #[serde(default)]
    rates: Vec<RateDto>,
}

#[derive(Debug, Deserialize)]
struct ZoneDto {
    #[serde(deserialize_with = "string_from_json")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    countries: Option<CountryList>,
    #[serde(default = "default_active", alias = "is_active", alias = "isActive")]
    active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CountryList {
    List(Vec<String>),
    Joined(String),
}

impl CountryList {
    fn into_codes(self) -> Vec<String> {
        let raw = match self {
            Self::List(codes) => codes,
            Self::Joined(joined) => joined
                .split(|c| c == ',' || c == ';' || c == '|')
                .map(str::to_string)
                .collect(),
        };
        raw.into_iter()
            .map(|code| code.trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty())
            .collect()
    }
}

impl From<ZoneDto> for ShippingZone {
    fn from(dto: ZoneDto) -> Self {
        Self {
            name: dto.name.unwrap_or_else(|| dto.id.clone()),
            id: dto.id,
            countries: dto.countries.map(CountryList::into_codes).unwrap_or_default(),
            active: dto.active,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceDto {
    #[serde(deserialize_with = "string_from_json")]
    id: String,
    name: String,
    #[serde(default = "default_active", alias = "is_active", alias = "isActive")]
    active: bool,
}

impl From<ServiceDto> for ShippingService {
    fn from(dto: ServiceDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            active: dto.active,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BracketDto {
    #[serde(deserialize_with = "string_from_json")]
    id: String,
    #[serde(alias = "minWeight", alias = "min")]
    min_weight: f64,
    #[serde(default, alias = "order")]
    position: Option<i32>,
}

impl From<BracketDto> for WeightBracket {
    fn from(dto: BracketDto) -> Self {
        Self {
            id: dto.id,
            min_weight_kg: dto.min_weight,
            position: dto.position.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RateDto {
    #[serde(alias = "zoneId", deserialize_with = "string_from_json")]
    zone_id: String,
    #[serde(alias = "serviceId", deserialize_with = "string_from_json")]
    service_id: String,
    #[serde(alias = "bracketId", alias = "weight_bracket_id", deserialize_with = "string_from_json")]
    bracket_id: String,
    /// `null` means the combination is explicitly not offered.
    #[serde(default, deserialize_with = "price_from_json")]
    price: Option<f64>,
}

impl From<RateDto> for ShippingRate {
    fn from(dto: RateDto) -> Self {
        Self {
            zone_id: dto.zone_id,
            service_id: dto.service_id,
            bracket_id: dto.bracket_id,
            cell: dto.price.map(RateCell::Price).unwrap_or(RateCell::NotOffered),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CartonDto {
    #[serde(alias = "ref", alias = "name")]
    reference: String,
    #[serde(default, deserialize_with = "price_from_json")]
    price: Option<f64>,
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default = "default_active", alias = "is_active", alias = "isActive")]
    active: bool,
}

#[derive(Debug, Deserialize)]
struct CartonWrapper {
    cartons: Vec<CartonDto>,
}

impl From<CartonDto> for CartonEntry {
    fn from(dto: CartonDto) -> Self {
        let inner = match (dto.length, dto.width, dto.height) {
            (Some(length), Some(width), Some(height)) => {
                Some(Dimensions::new(length, width, height)).filter(Dimensions::is_complete)
            }
            _ => None,
        };
        Self {
            reference: dto.reference,
            price: dto.price,
            inner,
            active: dto.active,
        }
    }
}

fn parse_shipping_grid(value: serde_json::Value) -> Result<ShippingGrid, CatalogError> {
    let dto: ShippingGridDto = serde_json::from_value(value)
        .map_err(|error| CatalogError::Api(format!("malformed shipping grid: {error}")))?;

    let grid = ShippingGrid::new(
        dto.zones.into_iter().map(ShippingZone::from).collect(),
        dto.services.into_iter().map(ShippingService::from).collect(),
        dto.weight_brackets
            .into_iter()
            .map(WeightBracket::from)
            .collect(),
        dto.rates.into_iter().map(ShippingRate::from).collect(),
    )?;
    Ok(grid)
}

fn parse_carton_catalog(value: serde_json::Value) -> Result<CartonCatalog, CatalogError> {
    let entries = if let Ok(entries) = serde_json::from_value::<Vec<CartonDto>>(value.clone()) {
        entries
    } else {
        serde_json::from_value::<CartonWrapper>(value)
            .map(|wrapper| wrapper.cartons)
            .map_err(|error| CatalogError::Api(format!("malformed carton catalog: {error}")))?
    };

    let catalog = CartonCatalog::new(entries.into_iter().map(CartonEntry::from).collect())?;
    Ok(catalog)
}

fn default_active() -> bool {
    true
}

fn string_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> serde::de::Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            // Integral floats key the same as their integer form: 1.0 → "1".
            if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                Ok((value as i64).to_string())
            } else {
                Ok(value.to_string())
            }
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

/// Prices arrive as numbers, numeric strings or null. A comma is a decimal
/// separator ("12,50") unless a dot is present, in which case it groups
/// thousands ("1,250.00").
fn price_from_json<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPrice {
        Number(f64),
        Text(String),
    }

    let raw = Option::<RawPrice>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(RawPrice::Number(value)) => Ok(Some(value)),
        Some(RawPrice::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let normalized = if trimmed.contains('.') {
                trimmed.replace(',', "")
            } else {
                trimmed.replace(',', ".")
            };
            normalized
                .parse::<f64>()
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CatalogValidationError, MatchStage, PackagingGap, PackagingPriceResolver, RateKey,
    };
    use serde_json::json;

    #[test]
    fn parses_grid_with_mixed_id_and_price_shapes() {
        let raw = json!({
            "zones": [
                {"id": 1, "name": "Europe", "countries": ["fr", "DE"]},
                {"id": "2", "name": "North America", "countries": "US, CA", "active": false}
            ],
            "services": [{"id": 7, "name": "EXPRESS"}],
            "weightBrackets": [
                {"id": "b5", "minWeight": 5},
                {"id": "b1", "min_weight": 1.0, "order": 1}
            ],
            "rates": [
                {"zoneId": 1, "serviceId": 7, "bracketId": "b1", "price": "12,50"},
                {"zone_id": "1", "service_id": "7", "bracket_id": "b5", "price": null}
            ]
        });

        let grid = parse_shipping_grid(raw).unwrap();
        assert_eq!(grid.zones()[0].countries, vec!["FR", "DE"]);
        assert_eq!(grid.zones()[1].countries, vec!["US", "CA"]);
        assert!(!grid.zones()[1].active);
        assert_eq!(grid.brackets()[0].id, "b1");
        assert_eq!(
            grid.rate(&RateKey::new("1", "7", "b1")),
            Some(RateCell::Price(12.5))
        );
        assert_eq!(
            grid.rate(&RateKey::new("1", "7", "b5")),
            Some(RateCell::NotOffered)
        );
    }

    #[test]
    fn rejects_rates_pointing_at_unknown_zone() {
        let raw = json!({
            "zones": [],
            "services": [{"id": "x", "name": "EXPRESS"}],
            "weightBrackets": [{"id": "b1", "minWeight": 1}],
            "rates": [{"zoneId": "ghost", "serviceId": "x", "bracketId": "b1", "price": 4}]
        });

        assert_eq!(
            parse_shipping_grid(raw),
            Err(CatalogError::Invalid(
                CatalogValidationError::UnknownReference {
                    kind: "zone",
                    id: "ghost".to_string()
                }
            ))
        );
    }

    #[test]
    fn parses_cartons_bare_or_wrapped() {
        let bare = json!([
            {"reference": "– CARTON-M", "price": 8, "length": 50, "width": 40, "height": 30},
            {"ref": "TUBE", "price": "4.5", "active": false}
        ]);
        let catalog = parse_carton_catalog(bare).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.entries()[0].inner,
            Some(Dimensions::new(50.0, 40.0, 30.0))
        );
        assert_eq!(catalog.entries()[1].price, Some(4.5));
        assert!(!catalog.entries()[1].active);

        let wrapped = json!({"cartons": [{"name": "BOX", "price": 3, "length": 0, "width": 1, "height": 1}]});
        let catalog = parse_carton_catalog(wrapped).unwrap();
        assert_eq!(catalog.entries()[0].inner, None);
    }

    #[test]
    fn null_carton_price_stays_unpriced() {
        let catalog = parse_carton_catalog(json!([
            {"reference": "CARTON-M", "price": null},
            {"reference": "CARTON-L"}
        ]))
        .unwrap();
        assert_eq!(catalog.entries()[0].price, None);
        assert_eq!(catalog.entries()[1].price, None);

        assert_eq!(
            PackagingPriceResolver::default().resolve(&catalog, "CARTON-M", None),
            Err(PackagingGap::Unpriced {
                reference: "CARTON-M".to_string(),
                stage: MatchStage::Exact,
            })
        );
    }

    #[test]
    fn prices_accept_decimal_comma_and_thousands_separator() {
        let catalog = parse_carton_catalog(json!([
            {"reference": "PALLET", "price": "1,250.00"},
            {"reference": "SLEEVE", "price": "12,50"},
            {"reference": "CRATE", "price": " 99.9 "}
        ]))
        .unwrap();
        let prices: Vec<_> = catalog.entries().iter().map(|entry| entry.price).collect();
        assert_eq!(prices, vec![Some(1250.0), Some(12.5), Some(99.9)]);
    }

    #[test]
    fn integral_float_ids_key_like_integers() {
        let raw = json!({
            "zones": [{"id": 1.0, "name": "Europe", "countries": ["DE"]}],
            "services": [{"id": 7, "name": "EXPRESS"}],
            "weightBrackets": [{"id": 2.0, "minWeight": 1}],
            "rates": [{"zoneId": 1, "serviceId": 7.0, "bracketId": "2", "price": 9}]
        });

        let grid = parse_shipping_grid(raw).unwrap();
        assert_eq!(grid.zones()[0].id, "1");
        assert_eq!(
            grid.rate(&RateKey::new("1", "7", "2")),
            Some(RateCell::Price(9.0))
        );
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = HttpCatalogClient::new("https://catalog.example.com/api/v1").unwrap();
        assert_eq!(
            client.base_url().join("cartons").unwrap().as_str(),
            "https://catalog.example.com/api/v1/cartons"
        );
    }
}
