//! Dashboard load pipeline
//!
//! ```text
//! 0. renderer capabilities ── no globe ──► LoadError::Unsupported
//! 1. gazetteer            ─┐
//! 2. ISO2 table            ├─ any failure ──► LoadError::Fetch ("failed to load")
//! 3. events ∥ groups      ─┘
//! 4. index → resolve → aggregate   (synchronous)
//! 5. render
//! ```
//!
//! Stages are awaited in order. Nothing is retried.

use chrono::{DateTime, Utc};
use country_resolver::{
    Aggregator, CountryIndex, CountryResolver, CountryStats, DashboardCounters, GlobeData, Iso2Table,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use threat_timeline::{SourceError, ThreatDataSource, TimelineQuery};
use tracing::{error, info};

use crate::render::{RenderError, RenderHandle, RenderPort};

/// Default length of the ranked country list
pub const DEFAULT_TOP_COUNTRIES: usize = 10;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Globe rendering not supported by the {0} renderer")]
    Unsupported(&'static str),
    /// Cause is kept for logs only; the message stays generic
    #[error("Failed to load dashboard data")]
    Fetch {
        stage: &'static str,
        #[source]
        source: SourceError,
    },
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
}

impl LoadError {
    fn fetch(stage: &'static str) -> impl FnOnce(SourceError) -> Self {
        move |source| {
            error!("Load failed at {} stage: {}", stage, source);
            LoadError::Fetch { stage, source }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryCount {
    pub country: String,
    pub incidents: u64,
}

/// Everything the display layer shows after one load
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub globe: GlobeData,
    pub top_countries: Vec<CountryCount>,
    pub counters: DashboardCounters,
    pub generated_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn top(&self, n: usize) -> Vec<CountryCount> {
        top_countries(&self.globe.stats, n)
    }
}

fn top_countries(stats: &CountryStats, n: usize) -> Vec<CountryCount> {
    stats
        .top(n)
        .into_iter()
        .map(|(country, incidents)| CountryCount {
            country: country.to_string(),
            incidents,
        })
        .collect()
}

pub struct Pipeline {
    source: Arc<dyn ThreatDataSource>,
    query: TimelineQuery,
    aggregator: Aggregator,
    top_n: usize,
    seed: Option<u64>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn ThreatDataSource>) -> Self {
        Self {
            source,
            query: TimelineQuery::default(),
            aggregator: Aggregator::default(),
            top_n: DEFAULT_TOP_COUNTRIES,
            seed: None,
        }
    }

    pub fn with_query(mut self, query: TimelineQuery) -> Self {
        self.query = query;
        self
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_top(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    /// Fixed jitter seed for reproducible output
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub async fn run<R: RenderPort>(&self, renderer: &mut R) -> Result<(DashboardSnapshot, RenderHandle), LoadError> {
        // Stage 0
        if !renderer.capabilities().globe {
            error!("Renderer {} cannot draw a globe", renderer.name());
            return Err(LoadError::Unsupported(renderer.name()));
        }

        // Stage 1
        let gazetteer = self
            .source
            .fetch_gazetteer()
            .await
            .map_err(LoadError::fetch("gazetteer"))?;
        info!("Loaded gazetteer: {} features", gazetteer.features.len());

        // Stage 2
        let iso2 = self
            .source
            .fetch_iso2_table()
            .await
            .map_err(LoadError::fetch("iso2"))?;
        let iso2 = Iso2Table::from_map(iso2);
        info!("Loaded ISO2 table: {} codes", iso2.len());

        // Stage 3
        let (events, groups) = tokio::try_join!(
            async { self.source.fetch_timeline(&self.query).await.map_err(LoadError::fetch("timeline")) },
            async { self.source.fetch_groups().await.map_err(LoadError::fetch("groups")) },
        )?;
        info!("Loaded {} events and {} groups", events.len(), groups.len());

        // Stage 4
        let index = CountryIndex::build(&gazetteer);
        let resolver = CountryResolver::new(&index, &iso2);
        let fallback = CountryStats::from_groups(&groups);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let globe = self.aggregator.aggregate(&events, &resolver, Some(&fallback), &mut rng);

        let counters = DashboardCounters::compute(&globe.stats, events.len(), groups.len());
        let snapshot = DashboardSnapshot {
            top_countries: top_countries(&globe.stats, self.top_n),
            counters,
            globe,
            generated_at: Utc::now(),
        };

        // Stage 5
        let handle = renderer.render(&snapshot.globe)?;
        info!(
            "Rendered {} points via {} ({} countries, {} incidents)",
            handle.points, handle.renderer, counters.countries, counters.incidents
        );

        Ok((snapshot, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MemoryRenderer;
    use async_trait::async_trait;
    use country_resolver::PointOrigin;
    use geojson::{FeatureCollection, GeoJson};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use threat_timeline::{Group, StaticDataSource, TimelineEvent};

    fn gazetteer() -> FeatureCollection {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"NAME": "France", "ISO_A2": "FR"},
                 "geometry": {"type": "Point", "coordinates": [2.0, 46.0]}},
                {"type": "Feature", "properties": {"NAME": "Russia", "ISO_A2": "RU"},
                 "geometry": {"type": "Point", "coordinates": [100.0, 60.0]}}
            ]
        }"#;
        match json.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(fc) => fc,
            _ => panic!("not a feature collection"),
        }
    }

    fn iso2() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("FR".to_string(), "France".to_string()),
            ("RU".to_string(), "Russia".to_string()),
        ])
    }

    fn group(name: &str, country: &str) -> Group {
        Group {
            name: name.to_string(),
            country: Some(country.to_string()),
            aliases: vec![],
            refs: vec![],
        }
    }

    fn source(events: Vec<TimelineEvent>) -> StaticDataSource {
        StaticDataSource::new()
            .with_gazetteer(gazetteer())
            .with_iso2(iso2())
            .with_events(events)
            .with_groups(vec![group("APT28", "Russia"), group("Lazarus", "Atlantis")])
    }

    #[tokio::test]
    async fn test_pipeline_events_path() {
        let events = vec![
            TimelineEvent::new("APT28", "Grizzly Steppe").with_country("Russia"),
            TimelineEvent::new("APT28", "Fancy Bear").with_country("RU"),
            TimelineEvent::new("Turla", "Snake").with_country("Russia"),
            TimelineEvent::new("Unknown", "Noise").with_country("FR"),
            TimelineEvent::new("Ghost", "Nowhere").with_country("Unknown"),
        ];
        let pipeline = Pipeline::new(Arc::new(source(events))).with_seed(11).with_top(1);
        let mut renderer = MemoryRenderer::new();

        let (snapshot, handle) = pipeline.run(&mut renderer).await.unwrap();

        assert_eq!(snapshot.globe.origin, PointOrigin::Events);
        assert_eq!(handle.points, 4);
        assert!(!handle.sentinel);
        assert_eq!(
            snapshot.top_countries,
            vec![CountryCount { country: "Russia".to_string(), incidents: 2 }]
        );
        assert_eq!(
            snapshot.counters,
            DashboardCounters { countries: 3, incidents: 4, events: 5, groups: 2 }
        );
        assert_eq!(renderer.last(), Some(&snapshot.globe));
    }

    #[tokio::test]
    async fn test_pipeline_group_fallback() {
        let pipeline = Pipeline::new(Arc::new(source(vec![]))).with_seed(1);
        let mut renderer = MemoryRenderer::new();

        let (snapshot, _) = pipeline.run(&mut renderer).await.unwrap();

        assert_eq!(snapshot.globe.origin, PointOrigin::AggregateFallback);
        assert_eq!(snapshot.globe.points.len(), 1);
        assert_eq!(snapshot.globe.points[0].latitude, 60.0);
        assert_eq!(snapshot.counters.groups, 2);
    }

    #[tokio::test]
    async fn test_pipeline_sentinel_without_gazetteer() {
        let source = StaticDataSource::new()
            .with_events(vec![TimelineEvent::new("APT28", "x").with_country("Russia")]);
        let pipeline = Pipeline::new(Arc::new(source));
        let mut renderer = MemoryRenderer::new();

        let (snapshot, handle) = pipeline.run(&mut renderer).await.unwrap();

        assert!(handle.sentinel);
        assert_eq!(snapshot.globe.points.len(), 3);
        assert_eq!(snapshot.counters.incidents, 1);
    }

    /// Counts fetches and fails the timeline call
    #[derive(Default)]
    struct FailingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ThreatDataSource for FailingSource {
        async fn fetch_groups(&self) -> threat_timeline::Result<Vec<Group>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn fetch_timeline(&self, _query: &TimelineQuery) -> threat_timeline::Result<Vec<TimelineEvent>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::Status { url: "http://api/timeline".to_string(), status: 503 })
        }

        async fn fetch_gazetteer(&self) -> threat_timeline::Result<FeatureCollection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(gazetteer())
        }

        async fn fetch_iso2_table(&self) -> threat_timeline::Result<BTreeMap<String, String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(iso2())
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_generic() {
        let pipeline = Pipeline::new(Arc::new(FailingSource::default()));
        let mut renderer = MemoryRenderer::new();

        let err = pipeline.run(&mut renderer).await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to load dashboard data");
        assert!(matches!(err, LoadError::Fetch { stage: "timeline", .. }));
        assert!(renderer.last().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_renderer_fails_before_fetch() {
        let source = Arc::new(FailingSource::default());
        let pipeline = Pipeline::new(source.clone());
        let mut renderer = MemoryRenderer::headless();

        let err = pipeline.run(&mut renderer).await.unwrap_err();

        assert!(matches!(err, LoadError::Unsupported("memory")));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_query_surfaces_as_load_failure() {
        let pipeline = Pipeline::new(Arc::new(source(vec![]))).with_query(TimelineQuery::new().limit(0));
        let mut renderer = MemoryRenderer::new();
        assert!(matches!(
            pipeline.run(&mut renderer).await,
            Err(LoadError::Fetch { stage: "timeline", source: SourceError::Query(_) })
        ));
    }
}
