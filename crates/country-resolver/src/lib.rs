//! Country Resolver
//!
//! Turns the free-text country fields of threat-intel timeline records into
//! gazetteer coordinates and aggregates them into plot points for the globe.
//!
//! # Pipeline
//!
//! ```text
//! FeatureCollection ──► CountryIndex (normalized name/code → coordinate)
//!                                │
//! TimelineEvent.country ──► CountryResolver ──► Aggregator ──► GlobeData
//!                                                   │
//!                                                   └──► CountryStats
//! ```
//!
//! # Resolution Order
//!
//! | Step | Match | Notes |
//! |------|-------|-------|
//! | 1 | `""` / `Unknown` | always unresolved |
//! | 2 | ISO2 code | via ISO2 → name table, then direct lookup |
//! | 3 | Direct | normalized input is an index key |
//! | 4 | Fuzzy | substring +10, word +5, prefix +3; min score 3 |
//! | 5 | Normalized | punctuation and "of"/"the" stripped, direct lookup |

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod gazetteer;
pub mod iso;
pub mod resolver;

pub use aggregate::{
    Aggregator, CountryStats, DashboardCounters, GlobeData, JitterConfig, MagnitudeScale,
    PlotPoint, PointOrigin,
};
pub use gazetteer::{CountryIndex, FeatureRejection, GazetteerEntry};
pub use iso::Iso2Table;
pub use resolver::{CountryResolver, MatchMethod, Resolution};

/// Minimum fuzzy score accepted by the resolver
pub const MIN_FUZZY_SCORE: u32 = 3;

/// Diagnostic fallback points (9 decimal precision): Washington, London, Tokyo
pub const SENTINEL_CAPITALS: [(&str, f64, f64); 3] = [
    ("Washington", 38.907200000, -77.036900000),
    ("London", 51.507400000, -0.127800000),
    ("Tokyo", 35.676200000, 139.650300000),
];

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Coordinate out of range: lat={0}, lon={1}")]
    InvalidCoordinate(f64, f64),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ResolverError>;

/// Validate latitude is in valid range
pub fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

/// Validate longitude is in valid range
pub fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

/// Validated WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if is_valid_latitude(latitude) && is_valid_longitude(longitude) {
            Ok(Self { latitude, longitude })
        } else {
            Err(ResolverError::InvalidCoordinate(latitude, longitude))
        }
    }

    /// Clamp into range; used after jitter
    pub fn clamped(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: latitude.clamp(-90.0, 90.0),
            longitude: longitude.clamp(-180.0, 180.0),
        }
    }
}

/// Lookup key form: trimmed and lower-cased
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}
