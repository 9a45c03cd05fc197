//! Raw table mutations: keyed upserts of bar and tick rows.
//!
//! Callers run these inside a write scope and a transaction; nothing here commits.

use crate::codec::{BarRow, TickRow};
use crate::error::{Result, StoreError};
use duckdb::{Connection, params};

const UPSERT_BAR_SQL: &str = r#"
    INSERT INTO bar_data VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (symbol, exchange, interval, datetime) DO UPDATE SET
        volume        = excluded.volume,
        turnover      = excluded.turnover,
        open_interest = excluded.open_interest,
        open_price    = excluded.open_price,
        high_price    = excluded.high_price,
        low_price     = excluded.low_price,
        close_price   = excluded.close_price
"#;

const UPSERT_TICK_SQL: &str = r#"
    INSERT INTO tick_data VALUES (
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
    )
    ON CONFLICT (symbol, exchange, datetime) DO UPDATE SET
        name          = excluded.name,
        volume        = excluded.volume,
        turnover      = excluded.turnover,
        open_interest = excluded.open_interest,
        last_price    = excluded.last_price,
        last_volume   = excluded.last_volume,
        limit_up      = excluded.limit_up,
        limit_down    = excluded.limit_down,
        open_price    = excluded.open_price,
        high_price    = excluded.high_price,
        low_price     = excluded.low_price,
        pre_close     = excluded.pre_close,
        bid_price_1   = excluded.bid_price_1,
        bid_price_2   = excluded.bid_price_2,
        bid_price_3   = excluded.bid_price_3,
        bid_price_4   = excluded.bid_price_4,
        bid_price_5   = excluded.bid_price_5,
        ask_price_1   = excluded.ask_price_1,
        ask_price_2   = excluded.ask_price_2,
        ask_price_3   = excluded.ask_price_3,
        ask_price_4   = excluded.ask_price_4,
        ask_price_5   = excluded.ask_price_5,
        bid_volume_1  = excluded.bid_volume_1,
        bid_volume_2  = excluded.bid_volume_2,
        bid_volume_3  = excluded.bid_volume_3,
        bid_volume_4  = excluded.bid_volume_4,
        bid_volume_5  = excluded.bid_volume_5,
        ask_volume_1  = excluded.ask_volume_1,
        ask_volume_2  = excluded.ask_volume_2,
        ask_volume_3  = excluded.ask_volume_3,
        ask_volume_4  = excluded.ask_volume_4,
        ask_volume_5  = excluded.ask_volume_5,
        localtime     = excluded.localtime
"#;

/// Upsert bar rows. A row whose key already exists has its non-key fields replaced.
pub fn upsert_bar_rows(conn: &Connection, rows: &[BarRow]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(UPSERT_BAR_SQL)?;
    for r in rows {
        stmt.execute(params![
            r.symbol,
            r.exchange,
            r.datetime,
            r.interval,
            r.volume,
            r.turnover,
            r.open_interest,
            r.open_price,
            r.high_price,
            r.low_price,
            r.close_price,
        ])
        .map_err(StoreError::from_statement)?;
    }
    Ok(rows.len())
}

/// Upsert tick rows, same replace-on-conflict semantics as bars.
pub fn upsert_tick_rows(conn: &Connection, rows: &[TickRow]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(UPSERT_TICK_SQL)?;
    for r in rows {
        stmt.execute(params![
            r.symbol,
            r.exchange,
            r.datetime,
            r.name,
            r.volume,
            r.turnover,
            r.open_interest,
            r.last_price,
            r.last_volume,
            r.limit_up,
            r.limit_down,
            r.open_price,
            r.high_price,
            r.low_price,
            r.pre_close,
            r.bid_price_1,
            r.bid_price_2,
            r.bid_price_3,
            r.bid_price_4,
            r.bid_price_5,
            r.ask_price_1,
            r.ask_price_2,
            r.ask_price_3,
            r.ask_price_4,
            r.ask_price_5,
            r.bid_volume_1,
            r.bid_volume_2,
            r.bid_volume_3,
            r.bid_volume_4,
            r.bid_volume_5,
            r.ask_volume_1,
            r.ask_volume_2,
            r.ask_volume_3,
            r.ask_volume_4,
            r.ask_volume_5,
            r.localtime,
        ])
        .map_err(StoreError::from_statement)?;
    }
    Ok(rows.len())
}
