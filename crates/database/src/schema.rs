use crate::error::{Result, StoreError};
use crate::handle::{HandleMode, StoreHandle};
use duckdb::Connection;
use tracing::debug;

pub const BAR_TABLE: &str = "bar_data";
pub const TICK_TABLE: &str = "tick_data";
pub const BAR_OVERVIEW_TABLE: &str = "bar_overview";
pub const TICK_OVERVIEW_TABLE: &str = "tick_overview";

pub const ALL_TABLES: [&str; 4] = [BAR_TABLE, TICK_TABLE, BAR_OVERVIEW_TABLE, TICK_OVERVIEW_TABLE];

/// Ensure the raw and summary tables exist. Never drops or alters an existing table.
///
/// Must run on a read-write handle before the long-lived read-only handle is opened.
pub fn ensure_schema(handle: &StoreHandle) -> Result<()> {
    if handle.mode() != HandleMode::ReadWrite {
        return Err(StoreError::WriteNotPermitted);
    }
    create_tables(handle.conn()?)?;
    debug!(path = %handle.path().display(), "schema ensured");
    Ok(())
}

/// The DDL behind [`ensure_schema`], usable on any writable connection.
pub fn create_tables(conn: &Connection) -> duckdb::Result<()> {
    // Raw bars: one row per (series, bar time).
    let create_bars = r#"
    CREATE TABLE IF NOT EXISTS bar_data (
        symbol        VARCHAR   NOT NULL,
        exchange      VARCHAR   NOT NULL,
        datetime      TIMESTAMP NOT NULL,
        interval      VARCHAR   NOT NULL,
        volume        DOUBLE    NOT NULL DEFAULT 0,
        turnover      DOUBLE    NOT NULL DEFAULT 0,
        open_interest DOUBLE    NOT NULL DEFAULT 0,
        open_price    DOUBLE    NOT NULL DEFAULT 0,
        high_price    DOUBLE    NOT NULL DEFAULT 0,
        low_price     DOUBLE    NOT NULL DEFAULT 0,
        close_price   DOUBLE    NOT NULL DEFAULT 0,
        PRIMARY KEY (symbol, exchange, interval, datetime)
    );
    "#;

    // Raw ticks: level 1 is always present, deeper levels may be NULL.
    let create_ticks = r#"
    CREATE TABLE IF NOT EXISTS tick_data (
        symbol        VARCHAR   NOT NULL,
        exchange      VARCHAR   NOT NULL,
        datetime      TIMESTAMP NOT NULL,
        name          VARCHAR   NOT NULL DEFAULT '',
        volume        DOUBLE    NOT NULL DEFAULT 0,
        turnover      DOUBLE    NOT NULL DEFAULT 0,
        open_interest DOUBLE    NOT NULL DEFAULT 0,
        last_price    DOUBLE    NOT NULL DEFAULT 0,
        last_volume   DOUBLE    NOT NULL DEFAULT 0,
        limit_up      DOUBLE    NOT NULL DEFAULT 0,
        limit_down    DOUBLE    NOT NULL DEFAULT 0,
        open_price    DOUBLE    NOT NULL DEFAULT 0,
        high_price    DOUBLE    NOT NULL DEFAULT 0,
        low_price     DOUBLE    NOT NULL DEFAULT 0,
        pre_close     DOUBLE    NOT NULL DEFAULT 0,
        bid_price_1   DOUBLE    NOT NULL DEFAULT 0,
        bid_price_2   DOUBLE,
        bid_price_3   DOUBLE,
        bid_price_4   DOUBLE,
        bid_price_5   DOUBLE,
        ask_price_1   DOUBLE    NOT NULL DEFAULT 0,
        ask_price_2   DOUBLE,
        ask_price_3   DOUBLE,
        ask_price_4   DOUBLE,
        ask_price_5   DOUBLE,
        bid_volume_1  DOUBLE    NOT NULL DEFAULT 0,
        bid_volume_2  DOUBLE,
        bid_volume_3  DOUBLE,
        bid_volume_4  DOUBLE,
        bid_volume_5  DOUBLE,
        ask_volume_1  DOUBLE    NOT NULL DEFAULT 0,
        ask_volume_2  DOUBLE,
        ask_volume_3  DOUBLE,
        ask_volume_4  DOUBLE,
        ask_volume_5  DOUBLE,
        localtime     TIMESTAMP,
        PRIMARY KEY (symbol, exchange, datetime)
    );
    "#;

    // Summaries: derived from the raw tables, one row per series.
    let create_bar_overview = r#"
    CREATE TABLE IF NOT EXISTS bar_overview (
        symbol   VARCHAR   NOT NULL,
        exchange VARCHAR   NOT NULL,
        interval VARCHAR   NOT NULL,
        count    BIGINT    NOT NULL DEFAULT 0,
        start_dt TIMESTAMP NOT NULL,
        end_dt   TIMESTAMP NOT NULL,
        PRIMARY KEY (symbol, exchange, interval)
    );
    "#;

    let create_tick_overview = r#"
    CREATE TABLE IF NOT EXISTS tick_overview (
        symbol   VARCHAR   NOT NULL,
        exchange VARCHAR   NOT NULL,
        count    BIGINT    NOT NULL DEFAULT 0,
        start_dt TIMESTAMP NOT NULL,
        end_dt   TIMESTAMP NOT NULL,
        PRIMARY KEY (symbol, exchange)
    );
    "#;

    for ddl in [create_bars, create_ticks, create_bar_overview, create_tick_overview] {
        conn.execute_batch(ddl)?;
    }
    Ok(())
}

/// Column names of `table` in declaration order, via `information_schema`.
pub fn table_columns(conn: &Connection, table: &str) -> duckdb::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT column_name, data_type
           FROM information_schema.columns
          WHERE table_name = ?
          ORDER BY ordinal_position",
    )?;
    let rows = stmt.query_map([table], |r| Ok((r.get(0)?, r.get(1)?)))?;
    rows.collect()
}

pub fn table_exists(conn: &Connection, table: &str) -> duckdb::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
        [table],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}
