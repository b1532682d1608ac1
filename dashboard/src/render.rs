//! Rendering port: points in, handle out
//!
//! The load pipeline only knows this trait. `GeoJsonRenderer` writes a
//! FeatureCollection to disk, `MemoryRenderer` keeps the last globe for the
//! display API and tests.

use country_resolver::{GlobeData, PointOrigin};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Renderer {0} has no globe support")]
    Unsupported(&'static str),
    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCapabilities {
    pub globe: bool,
}

/// What a render produced
#[derive(Debug, Clone, PartialEq)]
pub struct RenderHandle {
    pub renderer: &'static str,
    pub points: usize,
    pub sentinel: bool,
    /// Set by renderers that write somewhere
    pub location: Option<PathBuf>,
}

pub trait RenderPort {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> RenderCapabilities;

    fn render(&mut self, globe: &GlobeData) -> Result<RenderHandle, RenderError>;
}

pub fn origin_str(origin: PointOrigin) -> &'static str {
    match origin {
        PointOrigin::Events => "events",
        PointOrigin::AggregateFallback => "aggregate_fallback",
        PointOrigin::Sentinel => "sentinel",
    }
}

/// One Point feature per plot point; `origin` is carried as a foreign member
pub fn to_feature_collection(globe: &GlobeData) -> FeatureCollection {
    let origin = origin_str(globe.origin);
    let features = globe
        .points
        .iter()
        .map(|p| {
            let mut properties = JsonObject::new();
            properties.insert("label".to_string(), json!(p.label));
            properties.insert("magnitude".to_string(), json!(p.magnitude));
            properties.insert("sentinel".to_string(), json!(p.sentinel));
            properties.insert("origin".to_string(), json!(origin));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![p.longitude, p.latitude]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let mut foreign = JsonObject::new();
    foreign.insert("origin".to_string(), json!(origin));

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign),
    }
}

/// Writes the globe as GeoJSON
pub struct GeoJsonRenderer {
    path: PathBuf,
}

impl GeoJsonRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RenderPort for GeoJsonRenderer {
    fn name(&self) -> &'static str {
        "geojson"
    }

    fn capabilities(&self) -> RenderCapabilities {
        RenderCapabilities { globe: true }
    }

    fn render(&mut self, globe: &GlobeData) -> Result<RenderHandle, RenderError> {
        let collection = to_feature_collection(globe);
        let file = File::create(&self.path).map_err(|source| RenderError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), &collection)?;
        info!("Wrote {} points to {:?}", globe.points.len(), self.path);

        Ok(RenderHandle {
            renderer: self.name(),
            points: globe.points.len(),
            sentinel: globe.is_sentinel(),
            location: Some(self.path.clone()),
        })
    }
}

/// Keeps the last rendered globe
pub struct MemoryRenderer {
    capabilities: RenderCapabilities,
    last: Option<GlobeData>,
}

impl Default for MemoryRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRenderer {
    pub fn new() -> Self {
        Self {
            capabilities: RenderCapabilities { globe: true },
            last: None,
        }
    }

    /// A renderer reporting no globe support
    pub fn headless() -> Self {
        Self {
            capabilities: RenderCapabilities { globe: false },
            last: None,
        }
    }

    pub fn last(&self) -> Option<&GlobeData> {
        self.last.as_ref()
    }
}

impl RenderPort for MemoryRenderer {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> RenderCapabilities {
        self.capabilities
    }

    fn render(&mut self, globe: &GlobeData) -> Result<RenderHandle, RenderError> {
        if !self.capabilities.globe {
            return Err(RenderError::Unsupported(self.name()));
        }
        self.last = Some(globe.clone());
        Ok(RenderHandle {
            renderer: self.name(),
            points: globe.points.len(),
            sentinel: globe.is_sentinel(),
            location: None,
        })
    }
}
