use crate::data::models::{Interval, Price, Volume};
pub use crate::securities::symbols::Exchange;
pub use chrono::DateTime;
pub use chrono_tz::Tz;
use std::fmt;

/// Number of book levels carried by a [`TickData`] snapshot.
pub const DEPTH_LEVELS: usize = 5;

/// Identifies one logical time series.
///
/// Bar series carry an interval, tick series do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub exchange: Exchange,
    pub interval: Option<Interval>,
}

impl SeriesKey {
    pub fn bars(symbol: impl Into<String>, exchange: Exchange, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
            interval: Some(interval),
        }
    }

    pub fn ticks(symbol: impl Into<String>, exchange: Exchange) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
            interval: None,
        }
    }

    pub fn is_tick_series(&self) -> bool {
        self.interval.is_none()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interval {
            Some(i) => write!(f, "{}.{}@{}", self.symbol, self.exchange, i),
            None => write!(f, "{}.{}", self.symbol, self.exchange),
        }
    }
}

/// A candlestick / bar for one interval.
#[derive(PartialEq, Clone, Debug)]
pub struct BarData {
    /// Symbol identifier (e.g. `"rb2501"`, `"MNQZ5"`).
    pub symbol: String,
    pub exchange: Exchange,
    pub interval: Interval,
    /// Bar open time.
    pub datetime: DateTime<Tz>,
    /// Total traded volume.
    pub volume: Volume,
    /// Traded notional.
    pub turnover: f64,
    pub open_interest: f64,
    pub open_price: Price,
    pub high_price: Price,
    pub low_price: Price,
    pub close_price: Price,
}

impl BarData {
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::bars(self.symbol.clone(), self.exchange, self.interval)
    }
}

/// Five levels of resting liquidity on each side of the book.
///
/// Index 0 is the top of book.
#[derive(PartialEq, Clone, Copy, Debug, Default)]
pub struct Depth {
    pub bid_price: [Price; DEPTH_LEVELS],
    pub ask_price: [Price; DEPTH_LEVELS],
    pub bid_volume: [Volume; DEPTH_LEVELS],
    pub ask_volume: [Volume; DEPTH_LEVELS],
}

impl Depth {
    pub fn top_of_book(bid: Price, bid_volume: Volume, ask: Price, ask_volume: Volume) -> Self {
        let mut depth = Depth::default();
        depth.bid_price[0] = bid;
        depth.bid_volume[0] = bid_volume;
        depth.ask_price[0] = ask;
        depth.ask_volume[0] = ask_volume;
        depth
    }
}

/// A market snapshot: last trade, session statistics and the top five book levels.
#[derive(PartialEq, Clone, Debug)]
pub struct TickData {
    pub symbol: String,
    pub exchange: Exchange,
    /// Exchange event time.
    pub datetime: DateTime<Tz>,
    /// Human readable instrument name.
    pub name: String,
    /// Cumulative session volume.
    pub volume: Volume,
    pub turnover: f64,
    pub open_interest: f64,
    pub last_price: Price,
    pub last_volume: Volume,
    pub limit_up: Price,
    pub limit_down: Price,
    pub open_price: Price,
    pub high_price: Price,
    pub low_price: Price,
    pub pre_close: Price,
    pub depth: Depth,
    /// Local receive time, when the feed recorded one.
    pub localtime: Option<DateTime<Tz>>,
}

impl TickData {
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::ticks(self.symbol.clone(), self.exchange)
    }
}
