//! Picking the newest file from a listing.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::SelectorKind;

static TIMESTAMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{8}-\d{6})").expect("timestamp pattern is valid"));

pub trait LatestSelector: Send + Sync {
    /// The newest name, or `None` when nothing qualifies.
    fn select<'a>(&self, names: &'a [String]) -> Option<&'a str>;

    fn name(&self) -> &'static str;
}

/// Picks the greatest name by plain string ordering.
///
/// Correct only when every name embeds its timestamp in the same fixed-width,
/// zero-padded format at the same position, as MRMS file names do
/// (`..._20240101-000200.grib2.gz`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicographicSelector;

impl LatestSelector for LexicographicSelector {
    fn select<'a>(&self, names: &'a [String]) -> Option<&'a str> {
        names.iter().max().map(String::as_str)
    }

    fn name(&self) -> &'static str {
        "lexicographic"
    }
}

/// Picks the name with the latest `YYYYMMDD-HHMMSS` token.
///
/// Names without a parseable token are ignored. Equal timestamps fall back
/// to name ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampSelector;

impl TimestampSelector {
    pub fn parse_timestamp(name: &str) -> Option<NaiveDateTime> {
        TIMESTAMP_RE
            .captures_iter(name)
            .filter_map(|caps| NaiveDateTime::parse_from_str(&caps[1], "%Y%m%d-%H%M%S").ok())
            .last()
    }
}

impl LatestSelector for TimestampSelector {
    fn select<'a>(&self, names: &'a [String]) -> Option<&'a str> {
        names
            .iter()
            .filter_map(|name| Self::parse_timestamp(name).map(|ts| (ts, name)))
            .max()
            .map(|(_, name)| name.as_str())
    }

    fn name(&self) -> &'static str {
        "timestamp"
    }
}

pub fn selector_for(kind: SelectorKind) -> Box<dyn LatestSelector> {
    match kind {
        SelectorKind::Lexicographic => Box::new(LexicographicSelector),
        SelectorKind::Timestamp => Box::new(TimestampSelector),
    }
}
