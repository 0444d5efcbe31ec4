//! crates/evaluation_core/src/filter.rs
//!
//! Read-only narrowing of the displayed score list by name and score band.

use std::fmt;
use std::str::FromStr;

use crate::domain::ScoreRecord;

/// Coarse score bucket used to narrow the result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreBand {
    #[default]
    All,
    /// Above 80.
    High,
    /// 50 to 80 inclusive.
    Mid,
    /// Below 50.
    Low,
}

impl ScoreBand {
    /// Records without a numeric score only pass `All`.
    pub fn admits(&self, score: Option<f64>) -> bool {
        match (self, score) {
            (ScoreBand::All, _) => true,
            (_, None) => false,
            (ScoreBand::High, Some(s)) => s > 80.0,
            (ScoreBand::Mid, Some(s)) => (50.0..=80.0).contains(&s),
            (ScoreBand::Low, Some(s)) => s < 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown score band '{0}'. Expected one of: all, high, mid, low")]
pub struct UnknownBand(pub String);

impl FromStr for ScoreBand {
    type Err = UnknownBand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ScoreBand::All),
            "high" => Ok(ScoreBand::High),
            "mid" => Ok(ScoreBand::Mid),
            "low" => Ok(ScoreBand::Low),
            other => Err(UnknownBand(other.to_string())),
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreBand::All => "all",
            ScoreBand::High => "high",
            ScoreBand::Mid => "mid",
            ScoreBand::Low => "low",
        };
        f.write_str(name)
    }
}

/// Returns the records matching both criteria, each with its original index.
///
/// The name query is a trimmed, case-insensitive substring match against the
/// subject label, so unnamed subjects match their positional label.
pub fn filter<'a>(
    records: &'a [ScoreRecord],
    name_query: &str,
    band: ScoreBand,
) -> Vec<(usize, &'a ScoreRecord)> {
    let needle = name_query.trim().to_lowercase();
    records
        .iter()
        .enumerate()
        .filter(|(index, record)| {
            needle.is_empty() || record.label(*index).to_lowercase().contains(&needle)
        })
        .filter(|(_, record)| band.admits(record.score_percent))
        .collect()
}
