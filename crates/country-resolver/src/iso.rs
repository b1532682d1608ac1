//! ISO 3166-1 alpha-2 → country name table

use crate::Result;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct Iso2Table {
    names: BTreeMap<String, String>,
}

impl Iso2Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codes are stored upper-cased; blank names are dropped
    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        let names = map
            .into_iter()
            .filter(|(_, name)| !name.trim().is_empty())
            .map(|(code, name)| (code.trim().to_ascii_uppercase(), name.trim().to_string()))
            .collect();
        Self { names }
    }

    /// Parse a flat JSON object of code → name
    pub fn from_json(text: &str) -> Result<Self> {
        let map: BTreeMap<String, String> = serde_json::from_str(text)?;
        Ok(Self::from_map(map))
    }

    /// Case-insensitive lookup
    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.names.get(&code.trim().to_ascii_uppercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Exactly two ASCII letters once trimmed
pub fn is_iso2_code(raw: &str) -> bool {
    let raw = raw.trim();
    raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic())
}
