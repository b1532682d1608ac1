//! Gazetteer index builder
//!
//! Reads a country FeatureCollection (Natural Earth admin-0 or similar) and
//! indexes every name and code of each feature against one representative
//! coordinate.

use crate::{normalize_key, Coordinate};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name properties, in candidate order
pub const NAME_PROPERTIES: [&str; 6] = ["NAME", "NAME_EN", "ADMIN", "SOVEREIGNT", "NAME_LONG", "FORMAL_EN"];

/// Code properties, in candidate order
pub const CODE_PROPERTIES: [&str; 5] = ["ISO_A2", "ISO_A3", "ISO_A2_EH", "ISO_A3_EH", "ADM0_A3"];

/// Natural Earth placeholder for "no code"
const MISSING_CODE: &str = "-99";

/// Extra keys indexed after the primary pass: canonical key → aliases
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("united states", &["usa", "us", "united states of america", "america"]),
    ("united states of america", &["usa", "us", "united states"]),
    ("united kingdom", &["uk", "great britain", "britain"]),
    ("russia", &["russian federation"]),
    ("china", &["prc", "people's republic of china"]),
    ("north korea", &["dprk", "democratic people's republic of korea"]),
    ("south korea", &["republic of korea", "rok"]),
    ("iran", &["islamic republic of iran"]),
    ("vietnam", &["viet nam"]),
    ("syria", &["syrian arab republic"]),
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureRejection {
    #[error("feature has no geometry")]
    MissingGeometry,
    #[error("unsupported geometry type {0}")]
    UnsupportedGeometry(&'static str),
    #[error("geometry has no usable coordinates")]
    EmptyGeometry,
    #[error("coordinate out of range: lat={lat}, lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },
    #[error("feature has no name or code properties")]
    NoIdentifiers,
}

/// One gazetteer feature: candidate names and codes plus its coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    pub names: Vec<String>,
    pub codes: Vec<String>,
    pub coordinate: Coordinate,
}

impl GazetteerEntry {
    pub fn new(names: Vec<String>, codes: Vec<String>, coordinate: Coordinate) -> Self {
        Self { names, codes, coordinate }
    }

    pub fn from_feature(feature: &Feature) -> Result<Self, FeatureRejection> {
        let geometry = feature.geometry.as_ref().ok_or(FeatureRejection::MissingGeometry)?;
        let (lat, lon) = representative_point(geometry)?;
        let coordinate =
            Coordinate::new(lat, lon).map_err(|_| FeatureRejection::OutOfRange { lat, lon })?;

        let props = feature.properties.as_ref();
        let names = collect_properties(props, &NAME_PROPERTIES);
        let codes: Vec<String> = collect_properties(props, &CODE_PROPERTIES)
            .into_iter()
            .filter(|c| c != MISSING_CODE)
            .collect();

        if names.is_empty() && codes.is_empty() {
            return Err(FeatureRejection::NoIdentifiers);
        }

        Ok(Self { names, codes, coordinate })
    }

    /// Names first, then codes
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.names.iter().chain(self.codes.iter()).map(String::as_str)
    }

    /// First name, for logging
    pub fn label(&self) -> &str {
        self.names
            .first()
            .or_else(|| self.codes.first())
            .map(String::as_str)
            .unwrap_or("?")
    }
}

/// Non-empty string values of the wanted properties, keys matched ignoring case
fn collect_properties(props: Option<&JsonObject>, wanted: &[&str]) -> Vec<String> {
    let Some(props) = props else {
        return Vec::new();
    };

    let mut out: Vec<String> = Vec::new();
    for key in wanted {
        let value = props
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(v) = value {
            if !out.iter().any(|existing| existing == v) {
                out.push(v.to_string());
            }
        }
    }
    out
}

/// (lat, lon) for a geometry: Point as-is, MultiPoint first point,
/// Polygon mean of first ring, MultiPolygon mean of first polygon's first ring
pub fn representative_point(geometry: &Geometry) -> Result<(f64, f64), FeatureRejection> {
    match &geometry.value {
        Value::Point(coord) => lat_lon(coord),
        Value::MultiPoint(coords) => coords.first().ok_or(FeatureRejection::EmptyGeometry).and_then(|c| lat_lon(c)),
        Value::Polygon(rings) => rings
            .first()
            .ok_or(FeatureRejection::EmptyGeometry)
            .and_then(|ring| ring_mean(ring)),
        Value::MultiPolygon(polys) => polys
            .first()
            .and_then(|rings| rings.first())
            .ok_or(FeatureRejection::EmptyGeometry)
            .and_then(|ring| ring_mean(ring)),
        Value::LineString(_) => Err(FeatureRejection::UnsupportedGeometry("LineString")),
        Value::MultiLineString(_) => Err(FeatureRejection::UnsupportedGeometry("MultiLineString")),
        Value::GeometryCollection(_) => Err(FeatureRejection::UnsupportedGeometry("GeometryCollection")),
    }
}

/// GeoJSON positions are [lon, lat, ...]
fn lat_lon(position: &[f64]) -> Result<(f64, f64), FeatureRejection> {
    match position {
        [lon, lat, ..] => Ok((*lat, *lon)),
        _ => Err(FeatureRejection::EmptyGeometry),
    }
}

/// Planar vertex mean; not area-weighted
fn ring_mean(ring: &[Vec<f64>]) -> Result<(f64, f64), FeatureRejection> {
    if ring.is_empty() {
        return Err(FeatureRejection::EmptyGeometry);
    }
    let mut sum_lat = 0.0;
    let mut sum_lon = 0.0;
    for position in ring {
        let (lat, lon) = lat_lon(position)?;
        sum_lat += lat;
        sum_lon += lon;
    }
    let n = ring.len() as f64;
    Ok((sum_lat / n, sum_lon / n))
}

/// Normalized name/code → coordinate.
///
/// Iteration order is first-insertion order of each key; a later feature
/// with the same key replaces the coordinate but keeps the key's position.
#[derive(Debug, Clone, Default)]
pub struct CountryIndex {
    keys: IndexMap<String, Coordinate>,
    entries_loaded: usize,
    features_rejected: usize,
}

impl CountryIndex {
    /// Build from a feature collection; bad features are logged and skipped
    pub fn build(collection: &FeatureCollection) -> Self {
        let mut entries = Vec::with_capacity(collection.features.len());
        let mut rejected = 0;

        for (i, feature) in collection.features.iter().enumerate() {
            match GazetteerEntry::from_feature(feature) {
                Ok(entry) => entries.push(entry),
                Err(reason) => {
                    rejected += 1;
                    warn!("Skipping gazetteer feature #{}: {}", i, reason);
                }
            }
        }

        let mut index = Self::from_entries(entries);
        index.features_rejected = rejected;

        info!(
            "Built country index: {} keys from {} features ({} rejected)",
            index.len(),
            index.entries_loaded,
            rejected
        );

        index
    }

    pub fn from_entries(entries: impl IntoIterator<Item = GazetteerEntry>) -> Self {
        let mut index = Self::default();

        for entry in entries {
            index.entries_loaded += 1;
            for id in entry.identifiers() {
                let key = normalize_key(id);
                if key.is_empty() {
                    continue;
                }
                index.keys.insert(key, entry.coordinate);
            }
            debug!("Indexed {} at ({:.3}, {:.3})", entry.label(), entry.coordinate.latitude, entry.coordinate.longitude);
        }

        index.apply_synonyms();
        index
    }

    /// Synonyms never replace a key that is already present
    fn apply_synonyms(&mut self) {
        for (canonical, aliases) in SYNONYMS {
            let Some(coordinate) = self.keys.get(*canonical).copied() else {
                continue;
            };
            for alias in *aliases {
                self.keys.entry((*alias).to_string()).or_insert(coordinate);
            }
        }
    }

    /// Lookup by already-normalized key
    pub fn get(&self, key: &str) -> Option<Coordinate> {
        self.keys.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Coordinate)> {
        self.keys.iter().map(|(k, c)| (k.as_str(), *c))
    }

    pub fn entries_loaded(&self) -> usize {
        self.entries_loaded
    }

    pub fn features_rejected(&self) -> usize {
        self.features_rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::GeoJson;

    fn collection(json: &str) -> FeatureCollection {
        match json.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(fc) => fc,
            _ => panic!("not a feature collection"),
        }
    }

    fn feature(properties: &str, geometry: &str) -> String {
        format!(r#"{{"type": "Feature", "properties": {}, "geometry": {}}}"#, properties, geometry)
    }

    #[test]
    fn test_point_and_multipoint() {
        let fc = collection(&format!(
            r#"{{"type": "FeatureCollection", "features": [{}, {}]}}"#,
            feature(r#"{"NAME": "France"}"#, r#"{"type": "Point", "coordinates": [2.0, 46.0]}"#),
            feature(
                r#"{"NAME": "Japan"}"#,
                r#"{"type": "MultiPoint", "coordinates": [[138.0, 36.0], [0.0, 0.0]]}"#
            ),
        ));
        let index = CountryIndex::build(&fc);
        assert_eq!(index.get("france"), Some(Coordinate { latitude: 46.0, longitude: 2.0 }));
        assert_eq!(index.get("japan"), Some(Coordinate { latitude: 36.0, longitude: 138.0 }));
    }

    #[test]
    fn test_polygon_uses_first_ring_mean() {
        let fc = collection(&format!(
            r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
            feature(
                r#"{"NAME": "Squareland"}"#,
                r#"{"type": "Polygon", "coordinates": [
                    [[0.0, 0.0], [10.0, 0.0], [10.0, 20.0], [0.0, 20.0]],
                    [[50.0, 50.0], [60.0, 60.0], [70.0, 50.0]]
                ]}"#
            ),
        ));
        let index = CountryIndex::build(&fc);
        let c = index.get("squareland").unwrap();
        assert!((c.latitude - 10.0).abs() < 1e-9);
        assert!((c.longitude - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_multipolygon_uses_first_polygon() {
        let fc = collection(&format!(
            r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
            feature(
                r#"{"NAME": "Archipelago"}"#,
                r#"{"type": "MultiPolygon", "coordinates": [
                    [[[100.0, -10.0], [102.0, -10.0], [102.0, -8.0], [100.0, -8.0]]],
                    [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]
                ]}"#
            ),
        ));
        let index = CountryIndex::build(&fc);
        let c = index.get("archipelago").unwrap();
        assert!((c.latitude - -9.0).abs() < 1e-9);
        assert!((c.longitude - 101.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_out_of_range_and_unsupported() {
        let fc = collection(&format!(
            r#"{{"type": "FeatureCollection", "features": [{}, {}, {}, {}]}}"#,
            feature(r#"{"NAME": "Nowhere"}"#, r#"{"type": "Point", "coordinates": [200.0, 95.0]}"#),
            feature(
                r#"{"NAME": "River"}"#,
                r#"{"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}"#
            ),
            feature(r#"{"NAME": "Ghost"}"#, "null"),
            feature(r#"{"NAME": "Chile"}"#, r#"{"type": "Point", "coordinates": [-71.0, -35.0]}"#),
        ));
        let index = CountryIndex::build(&fc);
        assert_eq!(index.entries_loaded(), 1);
        assert_eq!(index.features_rejected(), 3);
        assert!(index.get("nowhere").is_none());
        assert!(index.get("river").is_none());
        assert!(index.get("ghost").is_none());
        assert!(index.get("chile").is_some());
    }

    #[test]
    fn test_collects_names_and_codes_case_insensitive() {
        let fc = collection(&format!(
            r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
            feature(
                r#"{"name": "Germany", "ADMIN": "Germany", "formal_en": "Federal Republic of Germany",
                    "iso_a2": "DE", "ISO_A3": "DEU", "ISO_A2_EH": "-99", "POP_EST": 83000000}"#,
                r#"{"type": "Point", "coordinates": [10.4, 51.1]}"#
            ),
        ));
        let entry = GazetteerEntry::from_feature(&fc.features[0]).unwrap();
        assert_eq!(entry.names, vec!["Germany", "Federal Republic of Germany"]);
        assert_eq!(entry.codes, vec!["DE", "DEU"]);

        let index = CountryIndex::build(&fc);
        for key in ["germany", "federal republic of germany", "de", "deu"] {
            assert!(index.get(key).is_some(), "missing key {}", key);
        }
        assert!(index.get("-99").is_none());
    }

    #[test]
    fn test_no_identifiers_rejected() {
        let fc = collection(&format!(
            r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
            feature(r#"{"POP_EST": 5}"#, r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#),
        ));
        assert_eq!(
            GazetteerEntry::from_feature(&fc.features[0]),
            Err(FeatureRejection::NoIdentifiers)
        );
    }

    #[test]
    fn test_last_feature_wins_keeps_first_position() {
        let a = GazetteerEntry::new(
            vec!["Georgia".into(), "Alpha".into()],
            vec![],
            Coordinate { latitude: 42.0, longitude: 43.5 },
        );
        let b = GazetteerEntry::new(
            vec!["Beta".into(), "Georgia".into()],
            vec![],
            Coordinate { latitude: 32.6, longitude: -83.4 },
        );
        let index = CountryIndex::from_entries(vec![a, b]);
        assert_eq!(index.get("georgia"), Some(Coordinate { latitude: 32.6, longitude: -83.4 }));
        let keys: Vec<&str> = index.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["georgia", "alpha", "beta"]);
    }

    #[test]
    fn test_synonyms_expand_without_overwriting() {
        let us = Coordinate { latitude: 39.8, longitude: -98.5 };
        let elsewhere = Coordinate { latitude: 0.0, longitude: 0.0 };
        let index = CountryIndex::from_entries(vec![
            GazetteerEntry::new(vec!["United States".into()], vec![], us),
            GazetteerEntry::new(vec!["America".into()], vec![], elsewhere),
        ]);
        assert_eq!(index.get("usa"), Some(us));
        assert_eq!(index.get("us"), Some(us));
        // already present from the primary pass
        assert_eq!(index.get("america"), Some(elsewhere));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let json = format!(
            r#"{{"type": "FeatureCollection", "features": [{}, {}]}}"#,
            feature(r#"{"NAME": "France", "ISO_A2": "FR"}"#, r#"{"type": "Point", "coordinates": [2.0, 46.0]}"#),
            feature(r#"{"NAME": "Russia", "ISO_A2": "RU"}"#, r#"{"type": "Point", "coordinates": [100.0, 60.0]}"#),
        );
        let first = CountryIndex::build(&collection(&json));
        let second = CountryIndex::build(&collection(&json));
        let a: Vec<_> = first.iter().collect();
        let b: Vec<_> = second.iter().collect();
        assert_eq!(a, b);
    }
}
