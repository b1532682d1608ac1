//! Incident aggregation: events → CountryStats + PlotPoints
//!
//! # Magnitude
//!
//! ```text
//! magnitude(n) = min(min(0.8 + n/10 · 0.8, 1.0) · scale_factor, max_magnitude)
//! ```
//!
//! # Jitter
//!
//! Each event point gets an independent uniform offset on latitude and
//! longitude of amplitude `base_degrees / √n`, where `n` is the incident
//! count of the event's country.

use crate::resolver::CountryResolver;
use crate::{Coordinate, SENTINEL_CAPITALS};
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use threat_timeline::model::{is_known_country, Group, TimelineEvent};
use tracing::{debug, info, warn};

/// Default scale applied to the capped magnitude
pub const DEFAULT_SCALE_FACTOR: f64 = 0.500000000;

/// Absolute magnitude cap
pub const DEFAULT_MAX_MAGNITUDE: f64 = 0.500000000;

/// Default jitter amplitude for a country with one incident (degrees)
pub const DEFAULT_JITTER_DEGREES: f64 = 2.000000000;

/// Incident count per raw country string, in first-seen order.
///
/// Keys are kept exactly as the source spelled them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryStats {
    counts: IndexMap<String, u64>,
}

impl CountryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// One pass over events; absent, empty and "Unknown" countries are skipped
    pub fn from_events(events: &[TimelineEvent]) -> Self {
        let mut stats = Self::new();
        for event in events {
            if let Some(country) = event.known_country() {
                stats.record(country);
            }
        }
        stats
    }

    /// Aggregate from the group list: one incident per attributed group
    pub fn from_groups(groups: &[Group]) -> Self {
        let mut stats = Self::new();
        for group in groups {
            if let Some(country) = group.country.as_deref() {
                stats.record(country);
            }
        }
        stats
    }

    /// Returns false when the value is not a known country
    pub fn record(&mut self, country: &str) -> bool {
        if !is_known_country(country) {
            return false;
        }
        *self.counts.entry(country.to_string()).or_insert(0) += 1;
        true
    }

    pub fn count(&self, country: &str) -> u64 {
        self.counts.get(country).copied().unwrap_or(0)
    }

    /// Distinct countries
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Highest counts first; equal counts keep first-seen order
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Magnitude curve parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeScale {
    pub scale_factor: f64,
    pub max_magnitude: f64,
}

impl Default for MagnitudeScale {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            max_magnitude: DEFAULT_MAX_MAGNITUDE,
        }
    }
}

impl MagnitudeScale {
    /// Monotonically non-decreasing in `count`, never above `max_magnitude`
    pub fn magnitude(&self, count: u64) -> f64 {
        let base = (0.8 + count as f64 / 10.0 * 0.8).min(1.0);
        (base * self.scale_factor).min(self.max_magnitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JitterConfig {
    pub base_degrees: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            base_degrees: DEFAULT_JITTER_DEGREES,
        }
    }
}

impl JitterConfig {
    /// Full width of the offset window for a country with `count` incidents
    pub fn amplitude(&self, count: u64) -> f64 {
        self.base_degrees / (count.max(1) as f64).sqrt()
    }

    pub fn apply<R: Rng + ?Sized>(&self, coordinate: Coordinate, count: u64, rng: &mut R) -> Coordinate {
        let amplitude = self.amplitude(count);
        let dlat = (rng.gen::<f64>() - 0.5) * amplitude;
        let dlon = (rng.gen::<f64>() - 0.5) * amplitude;
        Coordinate::clamped(coordinate.latitude + dlat, coordinate.longitude + dlon)
    }
}

/// One point for the globe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f64,
    /// Raw country string (or capital name for sentinels)
    pub label: String,
    /// Diagnostic placeholder, not real data
    #[serde(default)]
    pub sentinel: bool,
}

/// Which path produced the points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointOrigin {
    /// One point per resolved event
    Events,
    /// One point per country of an externally supplied aggregate
    AggregateFallback,
    /// Nothing resolved; fixed capitals as proof of life
    Sentinel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobeData {
    pub points: Vec<PlotPoint>,
    pub stats: CountryStats,
    pub origin: PointOrigin,
}

impl GlobeData {
    pub fn is_sentinel(&self) -> bool {
        self.origin == PointOrigin::Sentinel
    }
}

/// Summary counters for the dashboard header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounters {
    pub countries: usize,
    pub incidents: u64,
    pub events: usize,
    pub groups: usize,
}

impl DashboardCounters {
    pub fn compute(stats: &CountryStats, events: usize, groups: usize) -> Self {
        Self {
            countries: stats.len(),
            incidents: stats.total(),
            events,
            groups,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    pub magnitude: MagnitudeScale,
    pub jitter: JitterConfig,
}

impl Aggregator {
    pub fn new(magnitude: MagnitudeScale, jitter: JitterConfig) -> Self {
        Self { magnitude, jitter }
    }

    /// Build stats and plot points.
    ///
    /// With no events, `fallback` (if any) yields one unjittered point per
    /// country. When neither path produces a point the three sentinel
    /// capitals are returned with `PointOrigin::Sentinel`.
    pub fn aggregate<R: Rng + ?Sized>(
        &self,
        events: &[TimelineEvent],
        resolver: &CountryResolver<'_>,
        fallback: Option<&CountryStats>,
        rng: &mut R,
    ) -> GlobeData {
        if events.is_empty() {
            if let Some(stats) = fallback {
                let points = self.points_from_stats(stats, resolver);
                if !points.is_empty() {
                    info!("Plotted {} countries from aggregate stats", points.len());
                    return GlobeData {
                        points,
                        stats: stats.clone(),
                        origin: PointOrigin::AggregateFallback,
                    };
                }
            }
            return self.sentinel(fallback.cloned().unwrap_or_default());
        }

        let stats = CountryStats::from_events(events);
        let mut points = Vec::with_capacity(events.len());
        let mut unresolved = 0;

        for event in events {
            let Some(country) = event.known_country() else {
                continue;
            };
            let Some(resolution) = resolver.resolve(country) else {
                unresolved += 1;
                continue;
            };

            let count = stats.count(country);
            let position = self.jitter.apply(resolution.coordinate, count, rng);
            points.push(PlotPoint {
                latitude: position.latitude,
                longitude: position.longitude,
                magnitude: self.magnitude.magnitude(count),
                label: country.to_string(),
                sentinel: false,
            });
        }

        info!(
            "Aggregated {} events: {} points, {} countries, {} unresolved",
            events.len(),
            points.len(),
            stats.len(),
            unresolved
        );

        if points.is_empty() {
            return self.sentinel(stats);
        }

        GlobeData {
            points,
            stats,
            origin: PointOrigin::Events,
        }
    }

    fn points_from_stats(&self, stats: &CountryStats, resolver: &CountryResolver<'_>) -> Vec<PlotPoint> {
        stats
            .iter()
            .filter_map(|(country, count)| {
                let resolution = resolver.resolve(country)?;
                Some(PlotPoint {
                    latitude: resolution.coordinate.latitude,
                    longitude: resolution.coordinate.longitude,
                    magnitude: self.magnitude.magnitude(count),
                    label: country.to_string(),
                    sentinel: false,
                })
            })
            .collect()
    }

    fn sentinel(&self, stats: CountryStats) -> GlobeData {
        warn!("No country resolved; emitting {} sentinel points", SENTINEL_CAPITALS.len());
        let points = SENTINEL_CAPITALS
            .iter()
            .map(|(name, lat, lon)| {
                debug!("Sentinel point {} ({:.3}, {:.3})", name, lat, lon);
                PlotPoint {
                    latitude: *lat,
                    longitude: *lon,
                    magnitude: self.magnitude.magnitude(1),
                    label: name.to_string(),
                    sentinel: true,
                }
            })
            .collect();

        GlobeData {
            points,
            stats,
            origin: PointOrigin::Sentinel,
        }
    }
}
