use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;
use tracing::{debug, info};

use crate::domain::insurance::InsurancePolicy;
use crate::domain::packaging::DEFAULT_TOLERANCE_CM;
use crate::domain::shipping::DEFAULT_LAST_BRACKET_SPAN_KG;
use crate::domain::weight::DEFAULT_VOLUMETRIC_DIVISOR;

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "QuoteDesk";
const APP_NAME: &str = "QuotePricing";
const CONFIG_FILENAME: &str = "pricing.json";

pub const ENV_CATALOG_URL: &str = "QUOTE_PRICING_CATALOG_URL";
pub const ENV_API_TOKEN: &str = "QUOTE_PRICING_API_TOKEN";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub catalog_base_url: String,
    pub api_token: Option<String>,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Shipping service priced by the engine.
    pub service_name: String,
    pub volumetric_divisor: f64,
    pub last_bracket_span_kg: f64,
    pub carton_tolerance_cm: f64,
    pub insurance: InsurancePolicy,
    /// Totals closer than this are not reported as changed.
    pub total_epsilon: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: "http://localhost:8080/api/catalog/".to_string(),
            api_token: None,
            cache_ttl_secs: 5 * 60,
            fetch_timeout_secs: 10,
            service_name: "EXPRESS".to_string(),
            volumetric_divisor: DEFAULT_VOLUMETRIC_DIVISOR,
            last_bracket_span_kg: DEFAULT_LAST_BRACKET_SPAN_KG,
            carton_tolerance_cm: DEFAULT_TOLERANCE_CM,
            insurance: InsurancePolicy::default(),
            total_epsilon: 0.01,
        }
    }
}

impl PricingConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Process environment wins over the file.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_CATALOG_URL).filter(|v| !v.trim().is_empty()) {
            debug!(%url, "catalog URL overridden from environment");
            self.catalog_base_url = url;
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.api_token = Some(token);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("volumetric_divisor", self.volumetric_divisor),
            ("last_bracket_span_kg", self.last_bracket_span_kg),
            ("insurance.rate", self.insurance.rate),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    message: format!("must be positive, got {value}"),
                });
            }
        }

        let non_negative = [
            ("carton_tolerance_cm", self.carton_tolerance_cm),
            ("insurance.floor", self.insurance.floor),
            ("insurance.floor_threshold", self.insurance.floor_threshold),
            ("total_epsilon", self.total_epsilon),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    message: format!("must not be negative, got {value}"),
                });
            }
        }

        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_ttl_secs",
                message: "must be at least one second".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch_timeout_secs",
                message: "must be at least one second".to_string(),
            });
        }
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "service_name",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn config_file() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

/// Platform config file if present, defaults otherwise, then environment.
pub fn load_config() -> Result<PricingConfig, ConfigError> {
    let config = match config_file().filter(|path| path.exists()) {
        Some(path) => {
            info!(path = %path.display(), "loading pricing config");
            PricingConfig::from_path(&path)?
        }
        None => {
            debug!("no pricing config file, using defaults");
            PricingConfig::default()
        }
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
    #[error("invalid `{field}`: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}
