//! The history database: the operations callers use to save, load, delete and
//! summarize bar and tick series.

use crate::append::{upsert_bar_rows, upsert_tick_rows};
use crate::codec::{BarRow, TickRow};
use crate::config::{StoreConfig, StoreRole};
use crate::coordinator::WriteCoordinator;
use crate::error::{Result, StoreError};
use crate::queries;
use crate::stats::StatsSnapshot;
use crate::summary::{
    BatchBounds, SeriesKind, UpdateStrategy, aggregate_bar_overviews, aggregate_tick_overviews,
    backfill_summaries, delete_series, prune_orphan_summaries, summaries_missing, update_summary,
};
use chrono::DateTime;
use chrono_tz::Tz;
use md_types::data::core::{BarData, Exchange, SeriesKey, TickData};
use md_types::data::models::Interval;
use md_types::data::overview::{BarOverview, TickOverview};
use std::path::Path;
use tracing::{debug, info};

/// Storage for bar and tick history with per-series summaries.
pub trait HistoryDatabase {
    /// Upsert a batch of bars belonging to `key`. `stream` promises the batch lies
    /// strictly after everything already stored for the series.
    fn save_bars(&self, key: &SeriesKey, bars: &[BarData], stream: bool) -> Result<()>;

    /// Upsert a batch of ticks belonging to `key` (a key without interval).
    fn save_ticks(&self, key: &SeriesKey, ticks: &[TickData], stream: bool) -> Result<()>;

    fn load_bars(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<BarData>>;

    fn load_ticks(
        &self,
        symbol: &str,
        exchange: Exchange,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<TickData>>;

    /// Remove a bar series and its summary. Returns the number of bars removed.
    fn delete_bars(&self, symbol: &str, exchange: Exchange, interval: Interval) -> Result<usize>;

    /// Remove a tick series and its summary. Returns the number of ticks removed.
    fn delete_ticks(&self, symbol: &str, exchange: Exchange) -> Result<usize>;

    fn list_bar_summaries(&self) -> Result<Vec<BarOverview>>;

    fn list_tick_summaries(&self) -> Result<Vec<TickOverview>>;
}

/// DuckDB-backed [`HistoryDatabase`].
#[derive(Debug)]
pub struct MarketDatabase {
    coordinator: WriteCoordinator,
    tz: Tz,
}

impl MarketDatabase {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let coordinator = WriteCoordinator::open(config)?;
        Ok(Self {
            coordinator,
            tz: config.timezone,
        })
    }

    pub fn coordinator(&self) -> &WriteCoordinator {
        &self.coordinator
    }

    pub fn path(&self) -> &Path {
        self.coordinator.path()
    }

    pub fn role(&self) -> StoreRole {
        self.coordinator.role()
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.coordinator.stats().snapshot()
    }

    /// Stored summary of one bar series. `None` means the series has no data.
    pub fn bar_summary(&self, key: &SeriesKey) -> Result<Option<BarOverview>> {
        let Some(interval) = key.interval else {
            return Err(StoreError::SeriesMismatch {
                expected: "a bar series".into(),
                found: key.to_string(),
            });
        };
        self.coordinator.with_read(|conn| {
            queries::bar_overview(conn, &key.symbol, key.exchange, interval, self.tz)
        })
    }

    /// Stored summary of one tick series. `None` means the series has no data.
    pub fn tick_summary(&self, symbol: &str, exchange: Exchange) -> Result<Option<TickOverview>> {
        self.coordinator
            .with_read(|conn| queries::tick_overview(conn, symbol, exchange, self.tz))
    }

    /// Recompute every summary row from the raw tables and drop summaries of series
    /// that no longer have data. Returns `(bar, tick)` summary rows written.
    pub fn rebuild_summaries(&self) -> Result<(usize, usize)> {
        let (bars, ticks) = self.coordinator.with_write(|scope| {
            scope.in_transaction(|s| {
                let pruned = prune_orphan_summaries(s, SeriesKind::Bars)?
                    + prune_orphan_summaries(s, SeriesKind::Ticks)?;
                if pruned > 0 {
                    debug!(pruned, "dropped orphan summaries");
                }
                Ok((
                    backfill_summaries(s, SeriesKind::Bars)?,
                    backfill_summaries(s, SeriesKind::Ticks)?,
                ))
            })
        })?;
        self.coordinator.stats().record_backfill();
        info!(bars, ticks, "summaries rebuilt");
        Ok((bars, ticks))
    }

    /// Summary maintenance failures leave the instance unable to vouch for its summaries.
    fn summary_failure(&self, key: &SeriesKey, err: StoreError) -> StoreError {
        match err {
            StoreError::Engine(e) => StoreError::unavailable(
                self.path(),
                format!("summary maintenance failed for {key}: {e}"),
            ),
            other => other,
        }
    }

    fn needs_backfill(&self, kind: SeriesKind) -> Result<bool> {
        self.coordinator
            .with_read(|conn| Ok(summaries_missing(conn, kind)?))
    }

    /// Persist the aggregation for `kind`. Only called on a writer.
    fn persist_backfill(&self, kind: SeriesKind) -> Result<()> {
        let written = self
            .coordinator
            .with_write(|scope| scope.in_transaction(|s| backfill_summaries(s, kind)))?;
        self.coordinator.stats().record_backfill();
        info!(table = kind.overview_table(), rows = written, "summaries backfilled from raw data");
        Ok(())
    }
}

fn check_bar_batch(key: &SeriesKey, bars: &[BarData]) -> Result<()> {
    if key.interval.is_none() {
        return Err(StoreError::SeriesMismatch {
            expected: "a bar series".into(),
            found: key.to_string(),
        });
    }
    match bars.iter().find(|b| b.series_key() != *key) {
        Some(stray) => Err(StoreError::SeriesMismatch {
            expected: key.to_string(),
            found: stray.series_key().to_string(),
        }),
        None => Ok(()),
    }
}

fn check_tick_batch(key: &SeriesKey, ticks: &[TickData]) -> Result<()> {
    if key.interval.is_some() {
        return Err(StoreError::SeriesMismatch {
            expected: "a tick series".into(),
            found: key.to_string(),
        });
    }
    match ticks.iter().find(|t| t.series_key() != *key) {
        Some(stray) => Err(StoreError::SeriesMismatch {
            expected: key.to_string(),
            found: stray.series_key().to_string(),
        }),
        None => Ok(()),
    }
}

impl HistoryDatabase for MarketDatabase {
    fn save_bars(&self, key: &SeriesKey, bars: &[BarData], stream: bool) -> Result<()> {
        check_bar_batch(key, bars)?;
        let rows: Vec<BarRow> = bars.iter().map(BarRow::encode).collect();
        let Some(bounds) = BatchBounds::of(rows.iter().map(|r| r.datetime)) else {
            return Ok(());
        };

        let strategy = self.coordinator.with_write(|scope| {
            scope.in_transaction(|s| {
                upsert_bar_rows(s.conn(), &rows)?;
                update_summary(s, key, bounds, stream).map_err(|e| self.summary_failure(key, e))
            })
        })?;
        self.coordinator.stats().record_strategy(strategy);
        log_saved(key, bounds, strategy);
        Ok(())
    }

    fn save_ticks(&self, key: &SeriesKey, ticks: &[TickData], stream: bool) -> Result<()> {
        check_tick_batch(key, ticks)?;
        let rows: Vec<TickRow> = ticks.iter().map(TickRow::encode).collect();
        let Some(bounds) = BatchBounds::of(rows.iter().map(|r| r.datetime)) else {
            return Ok(());
        };

        let strategy = self.coordinator.with_write(|scope| {
            scope.in_transaction(|s| {
                upsert_tick_rows(s.conn(), &rows)?;
                update_summary(s, key, bounds, stream).map_err(|e| self.summary_failure(key, e))
            })
        })?;
        self.coordinator.stats().record_strategy(strategy);
        log_saved(key, bounds, strategy);
        Ok(())
    }

    fn load_bars(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<BarData>> {
        self.coordinator.with_read(|conn| {
            queries::load_bars(conn, symbol, exchange, interval, &start, &end, self.tz)
        })
    }

    fn load_ticks(
        &self,
        symbol: &str,
        exchange: Exchange,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<TickData>> {
        self.coordinator
            .with_read(|conn| queries::load_ticks(conn, symbol, exchange, &start, &end, self.tz))
    }

    fn delete_bars(&self, symbol: &str, exchange: Exchange, interval: Interval) -> Result<usize> {
        let key = SeriesKey::bars(symbol, exchange, interval);
        let removed = self
            .coordinator
            .with_write(|scope| scope.in_transaction(|s| delete_series(s, &key)))?;
        info!(series = %key, removed, "bars deleted");
        Ok(removed)
    }

    fn delete_ticks(&self, symbol: &str, exchange: Exchange) -> Result<usize> {
        let key = SeriesKey::ticks(symbol, exchange);
        let removed = self
            .coordinator
            .with_write(|scope| scope.in_transaction(|s| delete_series(s, &key)))?;
        info!(series = %key, removed, "ticks deleted");
        Ok(removed)
    }

    fn list_bar_summaries(&self) -> Result<Vec<BarOverview>> {
        if self.needs_backfill(SeriesKind::Bars)? {
            match self.role() {
                StoreRole::Writer => self.persist_backfill(SeriesKind::Bars)?,
                StoreRole::ReaderOnly => {
                    let rows = self.coordinator.with_read(|conn| Ok(aggregate_bar_overviews(conn)?))?;
                    self.coordinator.stats().record_backfill();
                    debug!(rows = rows.len(), "bar summaries aggregated in memory");
                    return rows.into_iter().map(|r| r.decode(self.tz)).collect();
                }
            }
        }
        self.coordinator
            .with_read(|conn| queries::list_bar_overviews(conn, self.tz))
    }

    fn list_tick_summaries(&self) -> Result<Vec<TickOverview>> {
        if self.needs_backfill(SeriesKind::Ticks)? {
            match self.role() {
                StoreRole::Writer => self.persist_backfill(SeriesKind::Ticks)?,
                StoreRole::ReaderOnly => {
                    let rows = self.coordinator.with_read(|conn| Ok(aggregate_tick_overviews(conn)?))?;
                    self.coordinator.stats().record_backfill();
                    debug!(rows = rows.len(), "tick summaries aggregated in memory");
                    return rows.into_iter().map(|r| r.decode(self.tz)).collect();
                }
            }
        }
        self.coordinator
            .with_read(|conn| queries::list_tick_overviews(conn, self.tz))
    }
}

fn log_saved(key: &SeriesKey, bounds: BatchBounds, strategy: UpdateStrategy) {
    debug!(
        series = %key,
        rows = bounds.len,
        start = %bounds.start,
        end = %bounds.end,
        ?strategy,
        "batch saved"
    );
}
