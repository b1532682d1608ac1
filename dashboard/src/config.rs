//! Dashboard configuration
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `APT_ATLAS_API_BASE` | `http://localhost:8000` | timeline API base URL |
//! | `APT_ATLAS_GAZETTEER` | Natural Earth 110m | gazetteer URL or file path |
//! | `APT_ATLAS_ISO2` | bundled table | ISO2 table URL or file path |
//! | `APT_ATLAS_PORT` / `PORT` | `18701` | display API port |
//! | `APT_ATLAS_TIMEOUT_SECS` | none | fetch timeout (no timeout when unset) |
//! | `APT_ATLAS_SCALE` | `0.5` | magnitude scale factor |
//!
//! CLI flags override the environment.

use country_resolver::MagnitudeScale;
use threat_timeline::{HttpSourceConfig, ResourceLocation};
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_PORT: u16 = 18701;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub api_base: String,
    /// None keeps the Natural Earth default
    pub gazetteer: Option<String>,
    /// None uses the table bundled with threat-timeline
    pub iso2: Option<String>,
    pub port: u16,
    pub timeout_secs: Option<u64>,
    pub magnitude: MagnitudeScale,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            gazetteer: None,
            iso2: None,
            port: DEFAULT_PORT,
            timeout_secs: None,
            magnitude: MagnitudeScale::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(base) = get("APT_ATLAS_API_BASE") {
            config.api_base = base;
        }
        config.gazetteer = get("APT_ATLAS_GAZETTEER");
        config.iso2 = get("APT_ATLAS_ISO2");

        if let Some(port) = get("APT_ATLAS_PORT").or_else(|| get("PORT")) {
            config.port = parse("APT_ATLAS_PORT", &port)?;
        }
        if let Some(secs) = get("APT_ATLAS_TIMEOUT_SECS") {
            config.timeout_secs = Some(parse("APT_ATLAS_TIMEOUT_SECS", &secs)?);
        }
        if let Some(scale) = get("APT_ATLAS_SCALE") {
            let factor: f64 = parse("APT_ATLAS_SCALE", &scale)?;
            if !factor.is_finite() || factor <= 0.0 {
                return Err(ConfigError::InvalidValue { name: "APT_ATLAS_SCALE", value: scale });
            }
            config.magnitude.scale_factor = factor;
        }

        Ok(config)
    }

    pub fn source_config(&self) -> HttpSourceConfig {
        let mut source = HttpSourceConfig::new(self.api_base.clone());
        if let Some(gazetteer) = &self.gazetteer {
            source.gazetteer = ResourceLocation::parse(gazetteer);
        }
        if let Some(iso2) = &self.iso2 {
            source.iso2 = Some(ResourceLocation::parse(iso2));
        }
        source.timeout_secs = self.timeout_secs;
        source
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}
