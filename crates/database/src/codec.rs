//! Record codec: flat, strongly typed rows for each table and the mapping to and from
//! the domain records.
//!
//! Timestamps are written as UTC wall time (`TIMESTAMP`, microsecond precision) and
//! reinterpreted in the store's reference timezone on the way out. Enum tags are written
//! in their canonical string form; anything else read back is a [`StoreError::Decode`].

use crate::error::{Result, StoreError};
use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone};
use chrono_tz::Tz;
use duckdb::Row;
use md_types::data::core::{BarData, DEPTH_LEVELS, Depth, Exchange, TickData};
use md_types::data::models::Interval;
use md_types::data::overview::{BarOverview, TickOverview};

/// Store an instant as naive UTC, truncated to what a DuckDB `TIMESTAMP` can hold.
#[inline]
pub fn encode_ts(dt: &DateTime<Tz>) -> NaiveDateTime {
    dt.naive_utc().trunc_subsecs(6)
}

/// Reinterpret a stored naive UTC timestamp in the reference timezone.
#[inline]
pub fn decode_ts(naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    tz.from_utc_datetime(&naive)
}

fn decode_exchange(tag: &str) -> Result<Exchange> {
    tag.parse().map_err(|e: md_types::UnknownTag| StoreError::Decode {
        column: "exchange",
        reason: e.to_string(),
    })
}

fn decode_interval(tag: &str) -> Result<Interval> {
    tag.parse().map_err(|e: md_types::UnknownTag| StoreError::Decode {
        column: "interval",
        reason: e.to_string(),
    })
}

// ---------- bar_data ----------

#[derive(Debug, Clone, PartialEq)]
pub struct BarRow {
    pub symbol: String,
    pub exchange: String,
    pub datetime: NaiveDateTime,
    pub interval: String,
    pub volume: f64,
    pub turnover: f64,
    pub open_interest: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
}

impl BarRow {
    pub const COLUMNS: &'static str = "symbol, exchange, datetime, interval, \
         volume, turnover, open_interest, \
         open_price, high_price, low_price, close_price";

    pub fn encode(bar: &BarData) -> Self {
        Self {
            symbol: bar.symbol.clone(),
            exchange: bar.exchange.as_str().to_string(),
            datetime: encode_ts(&bar.datetime),
            interval: bar.interval.as_str().to_string(),
            volume: bar.volume,
            turnover: bar.turnover,
            open_interest: bar.open_interest,
            open_price: bar.open_price,
            high_price: bar.high_price,
            low_price: bar.low_price,
            close_price: bar.close_price,
        }
    }

    pub fn decode(self, tz: Tz) -> Result<BarData> {
        Ok(BarData {
            exchange: decode_exchange(&self.exchange)?,
            interval: decode_interval(&self.interval)?,
            symbol: self.symbol,
            datetime: decode_ts(self.datetime, tz),
            volume: self.volume,
            turnover: self.turnover,
            open_interest: self.open_interest,
            open_price: self.open_price,
            high_price: self.high_price,
            low_price: self.low_price,
            close_price: self.close_price,
        })
    }

    pub fn from_row(r: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            symbol: r.get("symbol")?,
            exchange: r.get("exchange")?,
            datetime: r.get("datetime")?,
            interval: r.get("interval")?,
            volume: r.get("volume")?,
            turnover: r.get("turnover")?,
            open_interest: r.get("open_interest")?,
            open_price: r.get("open_price")?,
            high_price: r.get("high_price")?,
            low_price: r.get("low_price")?,
            close_price: r.get("close_price")?,
        })
    }
}

// ---------- tick_data ----------

#[derive(Debug, Clone, PartialEq)]
pub struct TickRow {
    pub symbol: String,
    pub exchange: String,
    pub datetime: NaiveDateTime,
    pub name: String,
    pub volume: f64,
    pub turnover: f64,
    pub open_interest: f64,
    pub last_price: f64,
    pub last_volume: f64,
    pub limit_up: f64,
    pub limit_down: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub pre_close: f64,
    pub bid_price_1: f64,
    pub bid_price_2: Option<f64>,
    pub bid_price_3: Option<f64>,
    pub bid_price_4: Option<f64>,
    pub bid_price_5: Option<f64>,
    pub ask_price_1: f64,
    pub ask_price_2: Option<f64>,
    pub ask_price_3: Option<f64>,
    pub ask_price_4: Option<f64>,
    pub ask_price_5: Option<f64>,
    pub bid_volume_1: f64,
    pub bid_volume_2: Option<f64>,
    pub bid_volume_3: Option<f64>,
    pub bid_volume_4: Option<f64>,
    pub bid_volume_5: Option<f64>,
    pub ask_volume_1: f64,
    pub ask_volume_2: Option<f64>,
    pub ask_volume_3: Option<f64>,
    pub ask_volume_4: Option<f64>,
    pub ask_volume_5: Option<f64>,
    pub localtime: Option<NaiveDateTime>,
}

/// Levels 2..=5 of a side, as stored in the nullable depth columns.
fn deep_levels(side: &[f64; DEPTH_LEVELS]) -> [Option<f64>; DEPTH_LEVELS - 1] {
    [Some(side[1]), Some(side[2]), Some(side[3]), Some(side[4])]
}

fn side_from(level1: f64, deeper: [Option<f64>; DEPTH_LEVELS - 1]) -> [f64; DEPTH_LEVELS] {
    [
        level1,
        deeper[0].unwrap_or_default(),
        deeper[1].unwrap_or_default(),
        deeper[2].unwrap_or_default(),
        deeper[3].unwrap_or_default(),
    ]
}

impl TickRow {
    pub const COLUMNS: &'static str = "symbol, exchange, datetime, name, \
         volume, turnover, open_interest, \
         last_price, last_volume, limit_up, limit_down, \
         open_price, high_price, low_price, pre_close, \
         bid_price_1, bid_price_2, bid_price_3, bid_price_4, bid_price_5, \
         ask_price_1, ask_price_2, ask_price_3, ask_price_4, ask_price_5, \
         bid_volume_1, bid_volume_2, bid_volume_3, bid_volume_4, bid_volume_5, \
         ask_volume_1, ask_volume_2, ask_volume_3, ask_volume_4, ask_volume_5, \
         localtime";

    pub fn encode(tick: &TickData) -> Self {
        let d = &tick.depth;
        let [bp2, bp3, bp4, bp5] = deep_levels(&d.bid_price);
        let [ap2, ap3, ap4, ap5] = deep_levels(&d.ask_price);
        let [bv2, bv3, bv4, bv5] = deep_levels(&d.bid_volume);
        let [av2, av3, av4, av5] = deep_levels(&d.ask_volume);
        Self {
            symbol: tick.symbol.clone(),
            exchange: tick.exchange.as_str().to_string(),
            datetime: encode_ts(&tick.datetime),
            name: tick.name.clone(),
            volume: tick.volume,
            turnover: tick.turnover,
            open_interest: tick.open_interest,
            last_price: tick.last_price,
            last_volume: tick.last_volume,
            limit_up: tick.limit_up,
            limit_down: tick.limit_down,
            open_price: tick.open_price,
            high_price: tick.high_price,
            low_price: tick.low_price,
            pre_close: tick.pre_close,
            bid_price_1: d.bid_price[0],
            bid_price_2: bp2,
            bid_price_3: bp3,
            bid_price_4: bp4,
            bid_price_5: bp5,
            ask_price_1: d.ask_price[0],
            ask_price_2: ap2,
            ask_price_3: ap3,
            ask_price_4: ap4,
            ask_price_5: ap5,
            bid_volume_1: d.bid_volume[0],
            bid_volume_2: bv2,
            bid_volume_3: bv3,
            bid_volume_4: bv4,
            bid_volume_5: bv5,
            ask_volume_1: d.ask_volume[0],
            ask_volume_2: av2,
            ask_volume_3: av3,
            ask_volume_4: av4,
            ask_volume_5: av5,
            localtime: tick.localtime.as_ref().map(encode_ts),
        }
    }

    pub fn decode(self, tz: Tz) -> Result<TickData> {
        let depth = Depth {
            bid_price: side_from(
                self.bid_price_1,
                [self.bid_price_2, self.bid_price_3, self.bid_price_4, self.bid_price_5],
            ),
            ask_price: side_from(
                self.ask_price_1,
                [self.ask_price_2, self.ask_price_3, self.ask_price_4, self.ask_price_5],
            ),
            bid_volume: side_from(
                self.bid_volume_1,
                [self.bid_volume_2, self.bid_volume_3, self.bid_volume_4, self.bid_volume_5],
            ),
            ask_volume: side_from(
                self.ask_volume_1,
                [self.ask_volume_2, self.ask_volume_3, self.ask_volume_4, self.ask_volume_5],
            ),
        };
        Ok(TickData {
            exchange: decode_exchange(&self.exchange)?,
            symbol: self.symbol,
            datetime: decode_ts(self.datetime, tz),
            name: self.name,
            volume: self.volume,
            turnover: self.turnover,
            open_interest: self.open_interest,
            last_price: self.last_price,
            last_volume: self.last_volume,
            limit_up: self.limit_up,
            limit_down: self.limit_down,
            open_price: self.open_price,
            high_price: self.high_price,
            low_price: self.low_price,
            pre_close: self.pre_close,
            depth,
            localtime: self.localtime.map(|t| decode_ts(t, tz)),
        })
    }

    pub fn from_row(r: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            symbol: r.get("symbol")?,
            exchange: r.get("exchange")?,
            datetime: r.get("datetime")?,
            name: r.get("name")?,
            volume: r.get("volume")?,
            turnover: r.get("turnover")?,
            open_interest: r.get("open_interest")?,
            last_price: r.get("last_price")?,
            last_volume: r.get("last_volume")?,
            limit_up: r.get("limit_up")?,
            limit_down: r.get("limit_down")?,
            open_price: r.get("open_price")?,
            high_price: r.get("high_price")?,
            low_price: r.get("low_price")?,
            pre_close: r.get("pre_close")?,
            bid_price_1: r.get("bid_price_1")?,
            bid_price_2: r.get("bid_price_2")?,
            bid_price_3: r.get("bid_price_3")?,
            bid_price_4: r.get("bid_price_4")?,
            bid_price_5: r.get("bid_price_5")?,
            ask_price_1: r.get("ask_price_1")?,
            ask_price_2: r.get("ask_price_2")?,
            ask_price_3: r.get("ask_price_3")?,
            ask_price_4: r.get("ask_price_4")?,
            ask_price_5: r.get("ask_price_5")?,
            bid_volume_1: r.get("bid_volume_1")?,
            bid_volume_2: r.get("bid_volume_2")?,
            bid_volume_3: r.get("bid_volume_3")?,
            bid_volume_4: r.get("bid_volume_4")?,
            bid_volume_5: r.get("bid_volume_5")?,
            ask_volume_1: r.get("ask_volume_1")?,
            ask_volume_2: r.get("ask_volume_2")?,
            ask_volume_3: r.get("ask_volume_3")?,
            ask_volume_4: r.get("ask_volume_4")?,
            ask_volume_5: r.get("ask_volume_5")?,
            localtime: r.get("localtime")?,
        })
    }
}

// ---------- bar_overview / tick_overview ----------

#[derive(Debug, Clone, PartialEq)]
pub struct BarOverviewRow {
    pub symbol: String,
    pub exchange: String,
    pub interval: String,
    pub count: i64,
    pub start_dt: NaiveDateTime,
    pub end_dt: NaiveDateTime,
}

impl BarOverviewRow {
    pub fn from_row(r: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            symbol: r.get("symbol")?,
            exchange: r.get("exchange")?,
            interval: r.get("interval")?,
            count: r.get("count")?,
            start_dt: r.get("start_dt")?,
            end_dt: r.get("end_dt")?,
        })
    }

    pub fn decode(self, tz: Tz) -> Result<BarOverview> {
        Ok(BarOverview {
            exchange: decode_exchange(&self.exchange)?,
            interval: decode_interval(&self.interval)?,
            symbol: self.symbol,
            count: self.count,
            start: decode_ts(self.start_dt, tz),
            end: decode_ts(self.end_dt, tz),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOverviewRow {
    pub symbol: String,
    pub exchange: String,
    pub count: i64,
    pub start_dt: NaiveDateTime,
    pub end_dt: NaiveDateTime,
}

impl TickOverviewRow {
    pub fn from_row(r: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            symbol: r.get("symbol")?,
            exchange: r.get("exchange")?,
            count: r.get("count")?,
            start_dt: r.get("start_dt")?,
            end_dt: r.get("end_dt")?,
        })
    }

    pub fn decode(self, tz: Tz) -> Result<TickOverview> {
        Ok(TickOverview {
            exchange: decode_exchange(&self.exchange)?,
            symbol: self.symbol,
            count: self.count,
            start: decode_ts(self.start_dt, tz),
            end: decode_ts(self.end_dt, tz),
        })
    }
}
