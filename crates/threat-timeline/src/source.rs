//! Data-source port consumed by the dashboard

use crate::model::{Group, TimelineEvent};
use crate::query::TimelineQuery;
use crate::{Result, SourceError};
use async_trait::async_trait;
use geojson::{FeatureCollection, GeoJson};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Everything the dashboard needs from the outside world
#[async_trait]
pub trait ThreatDataSource: Send + Sync {
    async fn fetch_groups(&self) -> Result<Vec<Group>>;

    async fn fetch_timeline(&self, query: &TimelineQuery) -> Result<Vec<TimelineEvent>>;

    /// Country polygons/points with name and ISO properties
    async fn fetch_gazetteer(&self) -> Result<FeatureCollection>;

    /// ISO 3166-1 alpha-2 code → country name
    async fn fetch_iso2_table(&self) -> Result<BTreeMap<String, String>>;
}

/// Where a static resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocation {
    Url(String),
    Path(PathBuf),
}

impl ResourceLocation {
    /// `http://` and `https://` are URLs, anything else is a file path
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Parse a GeoJSON document that must be a FeatureCollection
pub fn parse_feature_collection(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| SourceError::Decode {
        resource: "gazetteer".to_string(),
        message: e.to_string(),
    })?;

    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(SourceError::NotFeatureCollection),
    }
}

/// Parse the ISO2 table (a flat JSON object of code → name)
pub fn parse_iso2_table(text: &str) -> Result<BTreeMap<String, String>> {
    serde_json::from_str(text).map_err(|e| SourceError::Decode {
        resource: "iso2 table".to_string(),
        message: e.to_string(),
    })
}

/// ISO2 code → country name table shipped with the crate
pub const BUNDLED_ISO2_JSON: &str = include_str!("../data/iso2.json");

pub fn bundled_iso2_table() -> Result<BTreeMap<String, String>> {
    parse_iso2_table(BUNDLED_ISO2_JSON)
}

/// In-memory source for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticDataSource {
    pub groups: Vec<Group>,
    pub events: Vec<TimelineEvent>,
    pub gazetteer: Option<FeatureCollection>,
    pub iso2: BTreeMap<String, String>,
}

impl StaticDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups(mut self, groups: Vec<Group>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_events(mut self, events: Vec<TimelineEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_gazetteer(mut self, gazetteer: FeatureCollection) -> Self {
        self.gazetteer = Some(gazetteer);
        self
    }

    pub fn with_iso2(mut self, iso2: BTreeMap<String, String>) -> Self {
        self.iso2 = iso2;
        self
    }
}

#[async_trait]
impl ThreatDataSource for StaticDataSource {
    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        Ok(self.groups.clone())
    }

    async fn fetch_timeline(&self, query: &TimelineQuery) -> Result<Vec<TimelineEvent>> {
        let events = query.apply(self.events.clone())?;
        info!("Static timeline: {} of {} events", events.len(), self.events.len());
        Ok(events)
    }

    async fn fetch_gazetteer(&self) -> Result<FeatureCollection> {
        Ok(self.gazetteer.clone().unwrap_or(FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        }))
    }

    async fn fetch_iso2_table(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.iso2.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_location_parse() {
        assert_eq!(
            ResourceLocation::parse("https://example.org/countries.geojson"),
            ResourceLocation::Url("https://example.org/countries.geojson".to_string())
        );
        assert_eq!(
            ResourceLocation::parse("data/countries.geojson"),
            ResourceLocation::Path(PathBuf::from("data/countries.geojson"))
        );
    }

    #[test]
    fn test_parse_feature_collection() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"NAME": "France"},
             "geometry": {"type": "Point", "coordinates": [2.0, 46.0]}}
        ]}"#;
        let fc = parse_feature_collection(text).unwrap();
        assert_eq!(fc.features.len(), 1);

        let point = r#"{"type": "Point", "coordinates": [2.0, 46.0]}"#;
        assert!(matches!(
            parse_feature_collection(point),
            Err(SourceError::NotFeatureCollection)
        ));
        assert!(parse_feature_collection("{").is_err());
    }

    #[test]
    fn test_parse_iso2_table() {
        let table = parse_iso2_table(r#"{"FR": "France", "RU": "Russia"}"#).unwrap();
        assert_eq!(table.get("FR").map(String::as_str), Some("France"));
        assert!(parse_iso2_table("[1, 2]").is_err());
    }

    #[test]
    fn test_bundled_iso2_table() {
        let table = bundled_iso2_table().unwrap();
        assert_eq!(table.get("US").map(String::as_str), Some("United States of America"));
        assert_eq!(table.get("RU").map(String::as_str), Some("Russia"));
        for (code, name) in &table {
            assert!(code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase()), "bad code {}", code);
            assert!(!name.trim().is_empty());
        }
    }

    #[tokio::test]
    async fn test_static_source_applies_query() {
        let source = StaticDataSource::new().with_events(vec![
            TimelineEvent::new("APT28", "A").with_date("2020-01-01"),
            TimelineEvent::new("APT29", "B").with_date("2021-01-01"),
        ]);

        let events = source
            .fetch_timeline(&TimelineQuery::new().with_group("APT29"))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].campaign, "B");

        let gazetteer = source.fetch_gazetteer().await.unwrap();
        assert!(gazetteer.features.is_empty());
    }
}
