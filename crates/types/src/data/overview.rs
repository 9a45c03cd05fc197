//! Per-series summaries: how many records a series holds and the time range they span.

use crate::data::core::{Exchange, SeriesKey, Tz};
use crate::data::models::Interval;
use chrono::DateTime;

/// Summary of one bar series.
#[derive(PartialEq, Clone, Debug)]
pub struct BarOverview {
    pub symbol: String,
    pub exchange: Exchange,
    pub interval: Interval,
    pub count: i64,
    /// Earliest bar time present (inclusive).
    pub start: DateTime<Tz>,
    /// Latest bar time present (inclusive).
    pub end: DateTime<Tz>,
}

impl BarOverview {
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::bars(self.symbol.clone(), self.exchange, self.interval)
    }
}

/// Summary of one tick series.
#[derive(PartialEq, Clone, Debug)]
pub struct TickOverview {
    pub symbol: String,
    pub exchange: Exchange,
    pub count: i64,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl TickOverview {
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::ticks(self.symbol.clone(), self.exchange)
    }
}
