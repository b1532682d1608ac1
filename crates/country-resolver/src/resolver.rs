//! Country resolution: raw country field → gazetteer coordinate
//!
//! Exact matches are tried before heuristic ones; the first success wins.
//! Unresolved input is never an error, only a `None` and a debug line.

use crate::gazetteer::CountryIndex;
use crate::iso::{is_iso2_code, Iso2Table};
use crate::{normalize_key, Coordinate, MIN_FUZZY_SCORE};
use serde::Serialize;
use threat_timeline::model::is_known_country;
use tracing::{debug, trace};

/// Score for one string containing the other
const SUBSTRING_SCORE: u32 = 10;
/// Score per identical word pair
const WORD_SCORE: u32 = 5;
/// Score per word pair where one is a prefix of the other
const PREFIX_SCORE: u32 = 3;

/// Particles dropped by the last-chance normalization
const PARTICLES: [&str; 2] = ["of", "the"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MatchMethod {
    IsoCode,
    Direct,
    Fuzzy { score: u32 },
    Normalized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub coordinate: Coordinate,
    /// Index key that matched
    pub matched_key: String,
    pub method: MatchMethod,
}

pub struct CountryResolver<'a> {
    index: &'a CountryIndex,
    iso2: &'a Iso2Table,
    min_fuzzy_score: u32,
}

impl<'a> CountryResolver<'a> {
    pub fn new(index: &'a CountryIndex, iso2: &'a Iso2Table) -> Self {
        Self {
            index,
            iso2,
            min_fuzzy_score: MIN_FUZZY_SCORE,
        }
    }

    pub fn with_min_fuzzy_score(mut self, min_score: u32) -> Self {
        self.min_fuzzy_score = min_score;
        self
    }

    pub fn resolve(&self, raw: &str) -> Option<Resolution> {
        if !is_known_country(raw) {
            trace!("Skipping country {:?}: empty or unknown", raw);
            return None;
        }

        let key = normalize_key(raw);
        let resolution = self
            .by_iso_code(raw)
            .or_else(|| self.direct(&key, MatchMethod::Direct))
            .or_else(|| self.fuzzy(&key))
            .or_else(|| {
                let stripped = normalize_particles(raw);
                if stripped.is_empty() || stripped == key {
                    None
                } else {
                    self.direct(&stripped, MatchMethod::Normalized)
                }
            });

        match &resolution {
            Some(r) => debug!(
                "Resolved {:?} → {:?} via {:?} ({:.3}, {:.3})",
                raw, r.matched_key, r.method, r.coordinate.latitude, r.coordinate.longitude
            ),
            None => debug!("Unresolved country {:?}", raw),
        }

        resolution
    }

    fn by_iso_code(&self, raw: &str) -> Option<Resolution> {
        if !is_iso2_code(raw) {
            return None;
        }
        let name = self.iso2.lookup(raw)?;
        trace!("ISO2 {:?} → {:?}", raw, name);
        self.direct(&normalize_key(name), MatchMethod::IsoCode)
    }

    fn direct(&self, key: &str, method: MatchMethod) -> Option<Resolution> {
        self.index.get(key).map(|coordinate| Resolution {
            coordinate,
            matched_key: key.to_string(),
            method,
        })
    }

    /// Best-scoring key; ties keep the earliest key in index order
    fn fuzzy(&self, key: &str) -> Option<Resolution> {
        let mut best: Option<(&str, Coordinate, u32)> = None;

        for (candidate, coordinate) in self.index.iter() {
            let score = fuzzy_score(key, candidate);
            if score > best.map(|(_, _, s)| s).unwrap_or(0) {
                best = Some((candidate, coordinate, score));
            }
        }

        let (candidate, coordinate, score) = best?;
        if score < self.min_fuzzy_score {
            trace!("Best fuzzy match for {:?} was {:?} with score {} (below {})", key, candidate, score, self.min_fuzzy_score);
            return None;
        }

        Some(Resolution {
            coordinate,
            matched_key: candidate.to_string(),
            method: MatchMethod::Fuzzy { score },
        })
    }
}

/// Match score between two normalized strings:
/// +10 if one contains the other, then per word pair +5 for equal words
/// or +3 when one word is a prefix of the other
pub fn fuzzy_score(input: &str, candidate: &str) -> u32 {
    let mut score = 0;

    if candidate.contains(input) || input.contains(candidate) {
        score += SUBSTRING_SCORE;
    }

    for a in input.split_whitespace() {
        for b in candidate.split_whitespace() {
            if a == b {
                score += WORD_SCORE;
            } else if a.starts_with(b) || b.starts_with(a) {
                score += PREFIX_SCORE;
            }
        }
    }

    score
}

/// Lower-case, keep only letters, digits and whitespace, drop the particles "of"/"the"
pub fn normalize_particles(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    cleaned
        .split_whitespace()
        .filter(|word| !PARTICLES.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}
