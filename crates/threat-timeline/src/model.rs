//! Timeline records as served by the threat-intel API

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Placeholder the upstream API uses for unattributed groups and countries
pub const UNKNOWN: &str = "Unknown";

/// First/last sighting of a campaign (ISO dates)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub first_seen: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
}

/// One named campaign attributed to a threat-actor group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub group_name: String,
    /// Free text: a full or partial country name, an ISO code, or "Unknown"
    #[serde(default)]
    pub country: Option<String>,
    pub campaign: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub mitre_url: Option<String>,
}

impl TimelineEvent {
    /// Minimal event, mostly useful for fixtures
    pub fn new(group_name: impl Into<String>, campaign: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            country: None,
            campaign: campaign.into(),
            date: None,
            date_range: None,
            summary: None,
            source_url: None,
            mitre_url: None,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Event date, or None when absent or unparseable
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_event_date)
    }

    /// Country field when present, non-empty and not "Unknown"
    pub fn known_country(&self) -> Option<&str> {
        self.country.as_deref().filter(|c| is_known_country(c))
    }

    pub fn has_known_country(&self) -> bool {
        self.known_country().is_some()
    }

    /// Group attribution is missing upstream
    pub fn is_unknown_group(&self) -> bool {
        self.group_name.trim().eq_ignore_ascii_case(UNKNOWN)
    }
}

/// Threat-actor group with its claimed origin country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub refs: Vec<String>,
}

/// False for empty strings and "Unknown" (any case)
pub fn is_known_country(country: &str) -> bool {
    let trimmed = country.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(UNKNOWN)
}

/// Parse `YYYY-MM-DD`; full RFC 3339 timestamps are cut to their date
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}
