//! Threat Timeline
//!
//! Campaign timeline records for the APT atlas dashboard, the filter/sort
//! pipeline behind the swipeable timeline view, and the data-source port the
//! dashboard fetches through.
//!
//! # Data Flow
//!
//! ```text
//! ThreatDataSource ──fetch_timeline(TimelineQuery)──► Vec<TimelineEvent>
//!                  ──fetch_groups()─────────────────► Vec<Group>
//!                  ──fetch_gazetteer()──────────────► FeatureCollection
//!                  ──fetch_iso2_table()─────────────► code → name
//! ```
//!
//! | Source | Resource | Transport |
//! |--------|----------|-----------|
//! | `HttpDataSource` | timeline API + static files | reqwest |
//! | `StaticDataSource` | in-memory fixtures | none |

use thiserror::Error;

pub mod http;
pub mod model;
pub mod query;
pub mod source;

pub use http::{HttpDataSource, HttpSourceConfig};
pub use model::{DateRange, Group, TimelineEvent, UNKNOWN};
pub use query::{SortOrder, TimelineQuery, DEFAULT_LIMIT, MAX_LIMIT};
pub use source::{ResourceLocation, StaticDataSource, ThreatDataSource};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Limit out of range: {0} (expected 1..={MAX_LIMIT})")]
    LimitOutOfRange(usize),
    #[error("Invalid sort order {0:?}: expected date_asc or date_desc")]
    InvalidSort(String),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to decode {resource}: {message}")]
    Decode { resource: String, message: String },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Gazetteer is not a FeatureCollection")]
    NotFeatureCollection,
    #[error("Invalid query: {0}")]
    Query(#[from] QueryError),
}

pub type Result<T> = std::result::Result<T, SourceError>;
