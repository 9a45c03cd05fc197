//! Read paths over the raw and summary tables.

use crate::codec::{BarOverviewRow, BarRow, TickOverviewRow, TickRow, encode_ts};
use crate::error::Result;
use chrono::DateTime;
use chrono_tz::Tz;
use duckdb::{Connection, OptionalExt, params};
use md_types::data::core::{BarData, Exchange, TickData};
use md_types::data::models::Interval;
use md_types::data::overview::{BarOverview, TickOverview};

/// Bars of one series with `start <= datetime <= end`, ascending.
pub fn load_bars(
    conn: &Connection,
    symbol: &str,
    exchange: Exchange,
    interval: Interval,
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
    tz: Tz,
) -> Result<Vec<BarData>> {
    let sql = format!(
        "SELECT {} FROM bar_data
          WHERE symbol = ? AND exchange = ? AND interval = ?
            AND datetime >= ? AND datetime <= ?
          ORDER BY datetime",
        BarRow::COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(
            params![
                symbol,
                exchange.as_str(),
                interval.as_str(),
                encode_ts(start),
                encode_ts(end)
            ],
            BarRow::from_row,
        )?
        .collect::<duckdb::Result<Vec<_>>>()?;
    rows.into_iter().map(|r| r.decode(tz)).collect()
}

/// Ticks of one series with `start <= datetime <= end`, ascending.
pub fn load_ticks(
    conn: &Connection,
    symbol: &str,
    exchange: Exchange,
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
    tz: Tz,
) -> Result<Vec<TickData>> {
    let sql = format!(
        "SELECT {} FROM tick_data
          WHERE symbol = ? AND exchange = ?
            AND datetime >= ? AND datetime <= ?
          ORDER BY datetime",
        TickRow::COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(
            params![symbol, exchange.as_str(), encode_ts(start), encode_ts(end)],
            TickRow::from_row,
        )?
        .collect::<duckdb::Result<Vec<_>>>()?;
    rows.into_iter().map(|r| r.decode(tz)).collect()
}

pub(crate) fn bar_overview_rows(conn: &Connection) -> duckdb::Result<Vec<BarOverviewRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT symbol, exchange, interval, count, start_dt, end_dt
           FROM bar_overview
          ORDER BY symbol, exchange, interval",
    )?;
    let rows = stmt.query_map([], BarOverviewRow::from_row)?;
    rows.collect()
}

pub(crate) fn tick_overview_rows(conn: &Connection) -> duckdb::Result<Vec<TickOverviewRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT symbol, exchange, count, start_dt, end_dt
           FROM tick_overview
          ORDER BY symbol, exchange",
    )?;
    let rows = stmt.query_map([], TickOverviewRow::from_row)?;
    rows.collect()
}

/// Every stored bar summary, ordered by series key.
pub fn list_bar_overviews(conn: &Connection, tz: Tz) -> Result<Vec<BarOverview>> {
    bar_overview_rows(conn)?
        .into_iter()
        .map(|r| r.decode(tz))
        .collect()
}

/// Every stored tick summary, ordered by series key.
pub fn list_tick_overviews(conn: &Connection, tz: Tz) -> Result<Vec<TickOverview>> {
    tick_overview_rows(conn)?
        .into_iter()
        .map(|r| r.decode(tz))
        .collect()
}

/// The stored summary of a single bar series, if any.
pub fn bar_overview(
    conn: &Connection,
    symbol: &str,
    exchange: Exchange,
    interval: Interval,
    tz: Tz,
) -> Result<Option<BarOverview>> {
    let row = conn
        .prepare_cached(
            "SELECT symbol, exchange, interval, count, start_dt, end_dt
               FROM bar_overview
              WHERE symbol = ? AND exchange = ? AND interval = ?",
        )?
        .query_row(
            params![symbol, exchange.as_str(), interval.as_str()],
            BarOverviewRow::from_row,
        )
        .optional()?;
    row.map(|r| r.decode(tz)).transpose()
}

/// The stored summary of a single tick series, if any.
pub fn tick_overview(
    conn: &Connection,
    symbol: &str,
    exchange: Exchange,
    tz: Tz,
) -> Result<Option<TickOverview>> {
    let row = conn
        .prepare_cached(
            "SELECT symbol, exchange, count, start_dt, end_dt
               FROM tick_overview
              WHERE symbol = ? AND exchange = ?",
        )?
        .query_row(params![symbol, exchange.as_str()], TickOverviewRow::from_row)
        .optional()?;
    row.map(|r| r.decode(tz)).transpose()
}
