//! Timeline filter parameters and the local filter/sort pipeline
//!
//! The same parameters are sent upstream as query pairs; `apply` reproduces
//! the upstream semantics so static sources and the timeline view agree.

use crate::model::TimelineEvent;
use crate::QueryError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream default page size
pub const DEFAULT_LIMIT: usize = 500;

/// Upstream maximum page size
pub const MAX_LIMIT: usize = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    DateAsc,
    #[default]
    DateDesc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DateAsc => "date_asc",
            Self::DateDesc => "date_desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date_asc" => Ok(Self::DateAsc),
            "date_desc" => Ok(Self::DateDesc),
            _ => Err(QueryError::InvalidSort(s.to_string())),
        }
    }
}

/// Filter parameters for a timeline fetch. Absent fields mean "no constraint".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineQuery {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default = "default_include_unknown")]
    pub include_unknown_groups: bool,
}

fn default_include_unknown() -> bool {
    true
}

impl Default for TimelineQuery {
    fn default() -> Self {
        Self {
            group: None,
            country: None,
            from_date: None,
            to_date: None,
            limit: None,
            sort: SortOrder::default(),
            include_unknown_groups: true,
        }
    }
}

impl TimelineQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from_date = from;
        self.to_date = to;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn exclude_unknown_groups(mut self) -> Self {
        self.include_unknown_groups = false;
        self
    }

    /// Page size after defaulting
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        match self.limit {
            Some(limit) if !(1..=MAX_LIMIT).contains(&limit) => {
                Err(QueryError::LimitOutOfRange(limit))
            }
            _ => Ok(()),
        }
    }

    /// Query-string pairs for the upstream `/timeline` endpoint
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(group) = &self.group {
            pairs.push(("group", group.clone()));
        }
        if let Some(country) = &self.country {
            pairs.push(("country", country.clone()));
        }
        if let Some(from) = self.from_date {
            pairs.push(("from_date", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to_date {
            pairs.push(("to_date", to.format("%Y-%m-%d").to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs.push(("sort", self.sort.to_string()));
        pairs.push(("include_unknown_groups", self.include_unknown_groups.to_string()));
        pairs
    }

    /// Filter, sort and truncate events
    pub fn apply(&self, events: Vec<TimelineEvent>) -> Result<Vec<TimelineEvent>, QueryError> {
        self.validate()?;

        let group = self.group.as_deref().map(str::to_lowercase);
        let country = self.country.as_deref().map(str::to_lowercase);

        let mut events: Vec<TimelineEvent> = events
            .into_iter()
            .filter(|e| match &group {
                Some(g) => e.group_name.to_lowercase() == *g,
                None => true,
            })
            .filter(|e| match &country {
                Some(c) => e.country.as_deref().unwrap_or("").to_lowercase() == *c,
                None => true,
            })
            .filter(|e| self.include_unknown_groups || !e.is_unknown_group())
            .filter(|e| self.date_in_range(e))
            .collect();

        // Undated events sort as 1900-01-01
        let floor = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
        match self.sort {
            SortOrder::DateAsc => {
                events.sort_by_key(|e| e.parsed_date().unwrap_or(floor));
            }
            SortOrder::DateDesc => {
                events.sort_by(|a, b| {
                    b.parsed_date()
                        .unwrap_or(floor)
                        .cmp(&a.parsed_date().unwrap_or(floor))
                });
            }
        }

        events.truncate(self.effective_limit());
        Ok(events)
    }

    /// Inclusive bounds; undated or unparseable events always pass
    fn date_in_range(&self, event: &TimelineEvent) -> bool {
        let Some(date) = event.parsed_date() else {
            return true;
        };
        if let Some(from) = self.from_date {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.to_date {
            if date > to {
                return false;
            }
        }
        true
    }
}
