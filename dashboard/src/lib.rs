//! APT Atlas Dashboard
//!
//! Loads threat-actor timeline data, resolves each event's country against a
//! gazetteer and renders the result as points on a globe.
//!
//! ```text
//! ThreatDataSource ──► Pipeline ──► GlobeData ──► RenderPort
//!                         │
//!                         └──► DashboardSnapshot ──► display API (axum)
//! ```

pub mod config;
pub mod pipeline;
pub mod render;
pub mod routes;

pub use config::{ConfigError, DashboardConfig};
pub use pipeline::{CountryCount, DashboardSnapshot, LoadError, Pipeline};
pub use render::{GeoJsonRenderer, MemoryRenderer, RenderCapabilities, RenderError, RenderHandle, RenderPort};
pub use routes::{router, AppState};
