//! Summary maintenance for `bar_overview` and `tick_overview`.
//!
//! A summary row holds `(count, start_dt, end_dt)` for one series and is always derivable
//! from the raw table by aggregation. After every save or delete it must equal that
//! aggregation exactly. The write paths here keep it there without rescanning when they can:
//!
//! * first write of a series inserts the row from the batch bounds;
//! * a streaming append (batch strictly after the stored end) bumps `count` and `end_dt`;
//! * anything else recounts the raw rows and widens the bounds, because upserts may have
//!   replaced existing rows but never remove any.

use crate::codec::{BarOverviewRow, TickOverviewRow};
use crate::coordinator::WriteScope;
use crate::error::{Result, StoreError};
use crate::schema::{BAR_OVERVIEW_TABLE, BAR_TABLE, TICK_OVERVIEW_TABLE, TICK_TABLE};
use chrono::NaiveDateTime;
use duckdb::types::ToSql;
use duckdb::{Connection, OptionalExt, params_from_iter};
use md_types::data::core::SeriesKey;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Which pair of raw/summary tables a series lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    Bars,
    Ticks,
}

impl SeriesKind {
    pub fn of(key: &SeriesKey) -> Self {
        if key.interval.is_some() { SeriesKind::Bars } else { SeriesKind::Ticks }
    }

    pub fn raw_table(&self) -> &'static str {
        match self {
            SeriesKind::Bars => BAR_TABLE,
            SeriesKind::Ticks => TICK_TABLE,
        }
    }

    pub fn overview_table(&self) -> &'static str {
        match self {
            SeriesKind::Bars => BAR_OVERVIEW_TABLE,
            SeriesKind::Ticks => TICK_OVERVIEW_TABLE,
        }
    }

    fn key_columns(&self) -> &'static str {
        match self {
            SeriesKind::Bars => "symbol, exchange, interval",
            SeriesKind::Ticks => "symbol, exchange",
        }
    }

    fn key_predicate(&self) -> &'static str {
        match self {
            SeriesKind::Bars => "symbol = ? AND exchange = ? AND interval = ?",
            SeriesKind::Ticks => "symbol = ? AND exchange = ?",
        }
    }
}

/// Which of the three maintenance paths a write took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStrategy {
    /// No summary existed; inserted from the batch.
    Inserted,
    /// O(1) append: `count += len`, `end = batch end`.
    StreamAppend,
    /// Exact `COUNT(*)` with widened bounds.
    BulkRecount,
}

/// Size and time range of a batch that was just written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBounds {
    pub len: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BatchBounds {
    /// `None` for an empty batch. `len` counts distinct timestamps, since repeated keys
    /// collapse into one row on upsert.
    pub fn of(timestamps: impl IntoIterator<Item = NaiveDateTime>) -> Option<Self> {
        let distinct: BTreeSet<NaiveDateTime> = timestamps.into_iter().collect();
        let start = *distinct.first()?;
        let end = *distinct.last()?;
        Some(BatchBounds {
            len: distinct.len() as i64,
            start,
            end,
        })
    }
}

/// A stored summary row, in storage units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryRow {
    pub count: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Canonical tags of a series key, borrowed for statement parameters.
struct SeriesTags<'a> {
    symbol: &'a str,
    exchange: &'static str,
    interval: Option<&'static str>,
}

impl<'a> SeriesTags<'a> {
    fn of(key: &'a SeriesKey) -> Self {
        Self {
            symbol: &key.symbol,
            exchange: key.exchange.as_str(),
            interval: key.interval.map(|i| i.as_str()),
        }
    }

    fn args(&self) -> Vec<&dyn ToSql> {
        let mut v: Vec<&dyn ToSql> = vec![&self.symbol, &self.exchange];
        if let Some(i) = &self.interval {
            v.push(i);
        }
        v
    }
}

pub fn load_summary(conn: &Connection, key: &SeriesKey) -> duckdb::Result<Option<SummaryRow>> {
    let kind = SeriesKind::of(key);
    let tags = SeriesTags::of(key);
    let sql = format!(
        "SELECT count, start_dt, end_dt FROM {} WHERE {}",
        kind.overview_table(),
        kind.key_predicate()
    );
    conn.query_row(&sql, params_from_iter(tags.args()), |r| {
        Ok(SummaryRow {
            count: r.get(0)?,
            start: r.get(1)?,
            end: r.get(2)?,
        })
    })
    .optional()
}

/// Exact number of raw rows for a series.
pub fn count_raw_rows(conn: &Connection, key: &SeriesKey) -> duckdb::Result<i64> {
    let kind = SeriesKind::of(key);
    let tags = SeriesTags::of(key);
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        kind.raw_table(),
        kind.key_predicate()
    );
    conn.query_row(&sql, params_from_iter(tags.args()), |r| r.get(0))
}

/// Bring the summary of `key` in line with the raw table after `bounds` was upserted.
///
/// `stream = true` asserts the batch is a pure append after the stored end. A batch that
/// breaks that promise is logged and maintained by the exact path instead.
pub fn update_summary(
    scope: &WriteScope<'_>,
    key: &SeriesKey,
    bounds: BatchBounds,
    stream: bool,
) -> Result<UpdateStrategy> {
    let conn = scope.conn();
    let kind = SeriesKind::of(key);
    let tags = SeriesTags::of(key);
    let table = kind.overview_table();

    let strategy = match load_summary(conn, key)? {
        None => {
            let sql = match kind {
                SeriesKind::Bars => format!("INSERT INTO {table} VALUES (?, ?, ?, ?, ?, ?)"),
                SeriesKind::Ticks => format!("INSERT INTO {table} VALUES (?, ?, ?, ?, ?)"),
            };
            let mut args = tags.args();
            args.push(&bounds.len);
            args.push(&bounds.start);
            args.push(&bounds.end);
            conn.execute(&sql, params_from_iter(args))
                .map_err(StoreError::from_statement)?;
            UpdateStrategy::Inserted
        }
        Some(prior) if stream && bounds.start > prior.end => {
            let sql = format!(
                "UPDATE {table} SET end_dt = ?, count = count + ? WHERE {}",
                kind.key_predicate()
            );
            let mut args: Vec<&dyn ToSql> = vec![&bounds.end, &bounds.len];
            args.extend(tags.args());
            conn.execute(&sql, params_from_iter(args))
                .map_err(StoreError::from_statement)?;
            UpdateStrategy::StreamAppend
        }
        Some(prior) => {
            if stream {
                warn!(
                    series = %key,
                    batch_start = %bounds.start,
                    stored_end = %prior.end,
                    "stream batch overlaps stored data; recounting"
                );
            }
            let count = count_raw_rows(conn, key)?;
            let start = prior.start.min(bounds.start);
            let end = prior.end.max(bounds.end);
            let sql = format!(
                "UPDATE {table} SET start_dt = ?, end_dt = ?, count = ? WHERE {}",
                kind.key_predicate()
            );
            let mut args: Vec<&dyn ToSql> = vec![&start, &end, &count];
            args.extend(tags.args());
            conn.execute(&sql, params_from_iter(args))
                .map_err(StoreError::from_statement)?;
            UpdateStrategy::BulkRecount
        }
    };
    debug!(series = %key, rows = bounds.len, ?strategy, "summary updated");
    Ok(strategy)
}

/// Remove a series entirely: raw rows first, then its summary row.
/// Returns the number of raw rows removed.
pub fn delete_series(scope: &WriteScope<'_>, key: &SeriesKey) -> Result<usize> {
    let conn = scope.conn();
    let kind = SeriesKind::of(key);
    let tags = SeriesTags::of(key);
    let removed = conn
        .execute(
            &format!("DELETE FROM {} WHERE {}", kind.raw_table(), kind.key_predicate()),
            params_from_iter(tags.args()),
        )
        .map_err(StoreError::from_statement)?;
    conn.execute(
        &format!("DELETE FROM {} WHERE {}", kind.overview_table(), kind.key_predicate()),
        params_from_iter(tags.args()),
    )
    .map_err(StoreError::from_statement)?;
    debug!(series = %key, removed, "series deleted");
    Ok(removed)
}

/// True when raw data exists but the summary table is empty, i.e. summaries were never built.
pub fn summaries_missing(conn: &Connection, kind: SeriesKind) -> duckdb::Result<bool> {
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {}) AND NOT EXISTS (SELECT 1 FROM {})",
        kind.raw_table(),
        kind.overview_table()
    );
    conn.query_row(&sql, [], |r| r.get(0))
}

fn aggregate_sql(kind: SeriesKind) -> String {
    format!(
        "SELECT {cols}, COUNT(*) AS count, MIN(datetime) AS start_dt, MAX(datetime) AS end_dt
           FROM {raw}
          GROUP BY {cols}",
        cols = kind.key_columns(),
        raw = kind.raw_table()
    )
}

/// Upsert a summary row for every series present in the raw table.
/// Returns the number of summary rows written.
pub fn backfill_summaries(scope: &WriteScope<'_>, kind: SeriesKind) -> Result<usize> {
    let sql = format!(
        "INSERT INTO {overview}
         {aggregate}
         ON CONFLICT ({cols}) DO UPDATE SET
             count    = excluded.count,
             start_dt = excluded.start_dt,
             end_dt   = excluded.end_dt",
        overview = kind.overview_table(),
        aggregate = aggregate_sql(kind),
        cols = kind.key_columns(),
    );
    let written = scope
        .conn()
        .execute(&sql, [])
        .map_err(StoreError::from_statement)?;
    Ok(written)
}

/// Drop summary rows whose series no longer has any raw data.
pub fn prune_orphan_summaries(scope: &WriteScope<'_>, kind: SeriesKind) -> Result<usize> {
    let overview = kind.overview_table();
    let join = match kind {
        SeriesKind::Bars => format!(
            "r.symbol = {overview}.symbol AND r.exchange = {overview}.exchange AND r.interval = {overview}.interval"
        ),
        SeriesKind::Ticks => {
            format!("r.symbol = {overview}.symbol AND r.exchange = {overview}.exchange")
        }
    };
    let sql = format!(
        "DELETE FROM {overview} WHERE NOT EXISTS (SELECT 1 FROM {raw} r WHERE {join})",
        raw = kind.raw_table(),
    );
    scope
        .conn()
        .execute(&sql, [])
        .map_err(StoreError::from_statement)
}

/// The same aggregation as [`backfill_summaries`], returned instead of persisted.
pub fn aggregate_bar_overviews(conn: &Connection) -> duckdb::Result<Vec<BarOverviewRow>> {
    let sql = format!("{} ORDER BY symbol, exchange, interval", aggregate_sql(SeriesKind::Bars));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], BarOverviewRow::from_row)?;
    rows.collect()
}

pub fn aggregate_tick_overviews(conn: &Connection) -> duckdb::Result<Vec<TickOverviewRow>> {
    let sql = format!("{} ORDER BY symbol, exchange", aggregate_sql(SeriesKind::Ticks));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], TickOverviewRow::from_row)?;
    rows.collect()
}
