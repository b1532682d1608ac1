//! HTTP adapter for the threat-intel API
//!
//! ```rust,ignore
//! let source = HttpDataSource::new(HttpSourceConfig::new("http://localhost:8000"))?;
//! let events = source.fetch_timeline(&TimelineQuery::new().limit(100)).await?;
//! ```

use crate::model::{Group, TimelineEvent};
use crate::query::TimelineQuery;
use crate::source::{
    bundled_iso2_table, parse_feature_collection, parse_iso2_table, ResourceLocation, ThreatDataSource,
};
use crate::{Result, SourceError};
use async_trait::async_trait;
use geojson::FeatureCollection;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Default Natural Earth admin-0 countries (110m)
pub const DEFAULT_GAZETTEER_URL: &str =
    "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson/ne_110m_admin_0_countries.geojson";

/// HTTP source configuration
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Base URL of the timeline API (no trailing slash needed)
    pub api_base: String,
    pub gazetteer: ResourceLocation,
    /// None uses the bundled table
    pub iso2: Option<ResourceLocation>,
    /// No timeout when None: a stalled backend stalls the load
    pub timeout_secs: Option<u64>,
}

impl HttpSourceConfig {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            gazetteer: ResourceLocation::Url(DEFAULT_GAZETTEER_URL.to_string()),
            iso2: None,
            timeout_secs: None,
        }
    }
}

pub struct HttpDataSource {
    config: HttpSourceConfig,
    client: reqwest::Client,
}

impl HttpDataSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| SourceError::Request {
            url: config.api_base.clone(),
            message: e.to_string(),
        })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| SourceError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.json().await.map_err(|e| SourceError::Decode {
            resource: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn read_resource(&self, location: &ResourceLocation) -> Result<String> {
        match location {
            ResourceLocation::Url(url) => {
                let response = self.client.get(url).send().await.map_err(|e| SourceError::Request {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
                if !response.status().is_success() {
                    return Err(SourceError::Status {
                        url: url.clone(),
                        status: response.status().as_u16(),
                    });
                }
                response.text().await.map_err(|e| SourceError::Request {
                    url: url.clone(),
                    message: e.to_string(),
                })
            }
            ResourceLocation::Path(path) => {
                tokio::fs::read_to_string(path).await.map_err(|source| SourceError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        }
    }
}

#[async_trait]
impl ThreatDataSource for HttpDataSource {
    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let groups: Vec<Group> = self.get_json(&self.endpoint("groups"), &[]).await?;
        info!("Fetched {} groups", groups.len());
        Ok(groups)
    }

    async fn fetch_timeline(&self, query: &TimelineQuery) -> Result<Vec<TimelineEvent>> {
        query.validate()?;
        let events: Vec<TimelineEvent> = self
            .get_json(&self.endpoint("timeline"), &query.to_query_pairs())
            .await?;
        info!("Fetched {} timeline events", events.len());
        Ok(events)
    }

    async fn fetch_gazetteer(&self) -> Result<FeatureCollection> {
        info!("Loading gazetteer from {}", self.config.gazetteer);
        let text = self.read_resource(&self.config.gazetteer).await?;
        parse_feature_collection(&text)
    }

    async fn fetch_iso2_table(&self) -> Result<BTreeMap<String, String>> {
        match &self.config.iso2 {
            Some(location) => {
                info!("Loading ISO2 table from {}", location);
                let text = self.read_resource(location).await?;
                parse_iso2_table(&text)
            }
            None => {
                info!("Using bundled ISO2 table");
                bundled_iso2_table()
            }
        }
    }
}
