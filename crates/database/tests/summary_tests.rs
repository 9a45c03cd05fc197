use chrono::{DateTime, Duration, TimeZone};
use chrono_tz::Tz;
use md_database::codec::{BarRow, TickRow};
use md_database::{HistoryDatabase, MarketDatabase, StoreConfig, StoreError, StoreRole};
use md_types::{BarData, Depth, Exchange, Interval, SeriesKey, TickData};
use rstest::rstest;
use std::path::Path;
use tempfile::TempDir;

const SYMBOL: &str = "rb2501";

fn t(minute: i64) -> DateTime<Tz> {
    chrono_tz::UTC.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

fn bar(minute: i64) -> BarData {
    let px = 3500.0 + minute as f64;
    BarData {
        symbol: SYMBOL.into(),
        exchange: Exchange::SHFE,
        interval: Interval::Minute,
        datetime: t(minute),
        volume: 10.0,
        turnover: px * 10.0,
        open_interest: 1000.0,
        open_price: px,
        high_price: px + 2.0,
        low_price: px - 1.0,
        close_price: px + 1.0,
    }
}

fn bars(minutes: impl IntoIterator<Item = i64>) -> Vec<BarData> {
    minutes.into_iter().map(bar).collect()
}

fn tick(second: i64) -> TickData {
    TickData {
        symbol: "MNQZ5".into(),
        exchange: Exchange::CME,
        datetime: t(0) + Duration::seconds(second),
        name: "Micro E-mini Nasdaq".into(),
        volume: 100.0 + second as f64,
        turnover: 0.0,
        open_interest: 0.0,
        last_price: 21000.25,
        last_volume: 1.0,
        limit_up: 0.0,
        limit_down: 0.0,
        open_price: 20990.0,
        high_price: 21010.0,
        low_price: 20980.0,
        pre_close: 20995.0,
        depth: Depth::top_of_book(21000.0, 4.0, 21000.5, 6.0),
        localtime: None,
    }
}

fn bar_key() -> SeriesKey {
    SeriesKey::bars(SYMBOL, Exchange::SHFE, Interval::Minute)
}

fn tick_key() -> SeriesKey {
    SeriesKey::ticks("MNQZ5", Exchange::CME)
}

fn writer(dir: &TempDir) -> MarketDatabase {
    MarketDatabase::open(&StoreConfig::new(dir.path().join("md.duckdb"), StoreRole::Writer))
        .expect("open writer")
}

fn all_bars(db: &MarketDatabase, key: &SeriesKey) -> Vec<BarData> {
    db.load_bars(
        &key.symbol,
        key.exchange,
        key.interval.unwrap(),
        t(-100_000),
        t(100_000),
    )
    .unwrap()
}

/// The summary row must equal an aggregation over the raw rows.
fn assert_bar_invariant(db: &MarketDatabase, key: &SeriesKey) {
    let raw = all_bars(db, key);
    let summary = db.bar_summary(key).unwrap();
    match (raw.first(), raw.last(), summary) {
        (None, None, None) => {}
        (Some(first), Some(last), Some(s)) => {
            assert_eq!(s.count, raw.len() as i64, "count for {key}");
            assert_eq!(s.start, first.datetime, "start for {key}");
            assert_eq!(s.end, last.datetime, "end for {key}");
        }
        (_, _, s) => panic!("summary {s:?} disagrees with {} raw rows", raw.len()),
    }
}

/// Write raw rows directly, without summaries, the way an imported file looks.
fn seed_raw_only(path: &Path, bars: &[BarData], ticks: &[TickData]) {
    let conn = duckdb::Connection::open(path).unwrap();
    md_database::schema::create_tables(&conn).unwrap();
    let bar_rows: Vec<BarRow> = bars.iter().map(BarRow::encode).collect();
    let tick_rows: Vec<TickRow> = ticks.iter().map(TickRow::encode).collect();
    md_database::append::upsert_bar_rows(&conn, &bar_rows).unwrap();
    md_database::append::upsert_tick_rows(&conn, &tick_rows).unwrap();
}

#[test]
fn first_save_inserts_summary_from_batch() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars(0..10), false).unwrap();

    let s = db.bar_summary(&bar_key()).unwrap().expect("summary");
    assert_eq!(s.count, 10);
    assert_eq!(s.start, t(0));
    assert_eq!(s.end, t(9));
    assert_eq!(db.stats().summary_inserts, 1);
    assert_bar_invariant(&db, &bar_key());
}

#[test]
fn streaming_append_takes_fast_path() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars(0..10), true).unwrap();
    for chunk in [10..12, 12..13, 13..15] {
        db.save_bars(&bar_key(), &bars(chunk), true).unwrap();
    }

    let s = db.bar_summary(&bar_key()).unwrap().unwrap();
    assert_eq!(s.count, 15);
    assert_eq!(s.end, t(14));
    let stats = db.stats();
    assert_eq!(stats.stream_appends, 3);
    assert_eq!(stats.bulk_recounts, 0);
    assert_bar_invariant(&db, &bar_key());
}

#[test]
fn bulk_overwrite_recounts_instead_of_adding() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars(0..10), false).unwrap();
    // 8 and 9 replace stored bars, 10 is new
    db.save_bars(&bar_key(), &bars(8..11), false).unwrap();

    let s = db.bar_summary(&bar_key()).unwrap().unwrap();
    assert_eq!(s.count, 11);
    assert_eq!(s.start, t(0));
    assert_eq!(s.end, t(10));
    assert_eq!(db.stats().bulk_recounts, 1);
}

#[test]
fn backfill_before_stored_start_widens_bounds() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars(10..20), true).unwrap();
    db.save_bars(&bar_key(), &bars(0..5), false).unwrap();

    let s = db.bar_summary(&bar_key()).unwrap().unwrap();
    assert_eq!((s.count, s.start, s.end), (15, t(0), t(19)));
}

#[test]
fn overlapping_stream_batch_falls_back_to_recount() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars(0..10), true).unwrap();
    db.save_bars(&bar_key(), &bars(5..13), true).unwrap();

    let s = db.bar_summary(&bar_key()).unwrap().unwrap();
    assert_eq!(s.count, 13);
    let stats = db.stats();
    assert_eq!(stats.stream_appends, 0);
    assert_eq!(stats.bulk_recounts, 1);
    assert_bar_invariant(&db, &bar_key());
}

#[rstest]
#[case::appends_only(vec![(0, 4, true), (5, 9, true), (10, 10, true)])]
#[case::overwrite_middle(vec![(0, 9, false), (3, 6, false)])]
#[case::prepend_then_append(vec![(20, 29, false), (0, 9, false), (30, 39, true)])]
#[case::stream_flag_lies(vec![(0, 9, true), (0, 9, true), (9, 12, true)])]
#[case::single_bar_batches(vec![(7, 7, false), (7, 7, false), (8, 8, true)])]
fn summary_matches_raw_after_every_save(#[case] batches: Vec<(i64, i64, bool)>) {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    for (first, last, stream) in batches {
        db.save_bars(&bar_key(), &bars(first..=last), stream).unwrap();
        assert_bar_invariant(&db, &bar_key());
    }
}

#[test]
fn unsorted_batch_uses_min_and_max() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars([5, 1, 9, 3]), false).unwrap();
    let s = db.bar_summary(&bar_key()).unwrap().unwrap();
    assert_eq!((s.count, s.start, s.end), (4, t(1), t(9)));
}

#[test]
fn series_are_summarized_independently() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    let hourly = SeriesKey::bars(SYMBOL, Exchange::SHFE, Interval::Hour);
    let hour_bars: Vec<BarData> = (0..3)
        .map(|h| BarData {
            interval: Interval::Hour,
            datetime: t(h * 60),
            ..bar(0)
        })
        .collect();

    db.save_bars(&bar_key(), &bars(0..10), false).unwrap();
    db.save_bars(&hourly, &hour_bars, false).unwrap();

    let listed = db.list_bar_summaries().unwrap();
    assert_eq!(listed.len(), 2);
    let counts: Vec<(Interval, i64)> = listed.iter().map(|o| (o.interval, o.count)).collect();
    assert!(counts.contains(&(Interval::Minute, 10)));
    assert!(counts.contains(&(Interval::Hour, 3)));
}

#[test]
fn delete_clears_raw_rows_and_summary() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars(0..10), false).unwrap();

    let removed = db.delete_bars(SYMBOL, Exchange::SHFE, Interval::Minute).unwrap();
    assert_eq!(removed, 10);
    assert!(db.bar_summary(&bar_key()).unwrap().is_none());
    assert!(db.list_bar_summaries().unwrap().is_empty());
    assert!(all_bars(&db, &bar_key()).is_empty());

    // deleting an absent series is not an error
    assert_eq!(db.delete_bars(SYMBOL, Exchange::SHFE, Interval::Minute).unwrap(), 0);
}

#[test]
fn delete_then_save_starts_a_fresh_summary() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars(0..10), true).unwrap();
    db.delete_bars(SYMBOL, Exchange::SHFE, Interval::Minute).unwrap();
    db.save_bars(&bar_key(), &bars(50..52), true).unwrap();

    let s = db.bar_summary(&bar_key()).unwrap().unwrap();
    assert_eq!((s.count, s.start, s.end), (2, t(50), t(51)));
}

#[test]
fn tick_summaries_follow_the_same_paths() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    let first: Vec<TickData> = (0..5).map(tick).collect();
    let next: Vec<TickData> = (5..8).map(tick).collect();
    let overlap: Vec<TickData> = (6..10).map(tick).collect();

    db.save_ticks(&tick_key(), &first, true).unwrap();
    db.save_ticks(&tick_key(), &next, true).unwrap();
    db.save_ticks(&tick_key(), &overlap, false).unwrap();

    let s = db.tick_summary("MNQZ5", Exchange::CME).unwrap().unwrap();
    assert_eq!(s.count, 10);
    assert_eq!(s.start, tick(0).datetime);
    assert_eq!(s.end, tick(9).datetime);
    let stats = db.stats();
    assert_eq!(
        (stats.summary_inserts, stats.stream_appends, stats.bulk_recounts),
        (1, 1, 1)
    );

    assert_eq!(db.delete_ticks("MNQZ5", Exchange::CME).unwrap(), 10);
    assert!(db.list_tick_summaries().unwrap().is_empty());
}

#[test]
fn lazy_backfill_persists_and_runs_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("imported.duckdb");
    seed_raw_only(&path, &bars(0..25), &[]);

    let db = MarketDatabase::open(&StoreConfig::new(&path, StoreRole::Writer)).unwrap();
    let first = db.list_bar_summaries().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!((first[0].count, first[0].start, first[0].end), (25, t(0), t(24)));
    assert_eq!(db.stats().backfill_aggregations, 1);

    let second = db.list_bar_summaries().unwrap();
    assert_eq!(second, first);
    assert_eq!(db.stats().backfill_aggregations, 1);

    // persisted, so a single lookup sees it without listing
    assert_eq!(db.bar_summary(&bar_key()).unwrap().unwrap().count, 25);
}

#[test]
fn tick_summaries_are_backfilled_too() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("imported.duckdb");
    let ticks: Vec<TickData> = (0..7).map(tick).collect();
    seed_raw_only(&path, &[], &ticks);

    let db = MarketDatabase::open(&StoreConfig::new(&path, StoreRole::Writer)).unwrap();
    let listed = db.list_tick_summaries().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].count, 7);
    assert_eq!(listed[0].end, tick(6).datetime);
    db.list_tick_summaries().unwrap();
    assert_eq!(db.stats().backfill_aggregations, 1);
}

#[test]
fn reader_backfills_in_memory_without_persisting() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("imported.duckdb");
    seed_raw_only(&path, &bars(0..4), &[]);

    let reader = MarketDatabase::open(&StoreConfig::new(&path, StoreRole::ReaderOnly)).unwrap();
    let listed = reader.list_bar_summaries().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].count, 4);
    assert!(reader.bar_summary(&bar_key()).unwrap().is_none());

    reader.list_bar_summaries().unwrap();
    let stats = reader.stats();
    assert_eq!(stats.backfill_aggregations, 2);
    assert_eq!(stats.write_scopes, 0);
}

#[test]
fn rebuild_repairs_drifted_and_orphan_summaries() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars(0..10), false).unwrap();
    db.coordinator()
        .with_write(|scope| {
            scope.conn().execute_batch(
                "UPDATE bar_overview SET count = 999;
                 INSERT INTO tick_overview VALUES ('ghost', 'CME', 3, TIMESTAMP '2024-01-01 00:00:00', TIMESTAMP '2024-01-01 00:01:00');",
            )?;
            Ok(())
        })
        .unwrap();

    let (bar_rows, tick_rows) = db.rebuild_summaries().unwrap();
    assert_eq!((bar_rows, tick_rows), (1, 0));
    assert_eq!(db.stats().backfill_aggregations, 1);
    assert_bar_invariant(&db, &bar_key());
    assert!(db.list_tick_summaries().unwrap().is_empty());
}

#[test]
fn empty_batch_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &[], true).unwrap();
    db.save_ticks(&tick_key(), &[], false).unwrap();

    assert_eq!(db.stats().write_scopes, 0);
    assert!(db.list_bar_summaries().unwrap().is_empty());
}

#[test]
fn records_saved_under_the_wrong_key_are_rejected() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);

    let wrong_exchange = SeriesKey::bars(SYMBOL, Exchange::DCE, Interval::Minute);
    let err = db.save_bars(&wrong_exchange, &bars(0..2), false).unwrap_err();
    assert!(matches!(err, StoreError::SeriesMismatch { .. }), "{err}");

    let err = db.save_bars(&tick_key(), &bars(0..2), false).unwrap_err();
    assert!(matches!(err, StoreError::SeriesMismatch { .. }));

    let ticks = vec![tick(0)];
    let err = db.save_ticks(&bar_key(), &ticks, false).unwrap_err();
    assert!(matches!(err, StoreError::SeriesMismatch { .. }));

    let err = db.bar_summary(&tick_key()).unwrap_err();
    assert!(matches!(err, StoreError::SeriesMismatch { .. }));

    assert_eq!(db.stats().write_scopes, 0);
}

#[test]
fn repeated_timestamps_count_once() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.save_bars(&bar_key(), &bars([0, 0, 1]), false).unwrap();
    let s = db.bar_summary(&bar_key()).unwrap().unwrap();
    assert_eq!((s.count, s.start, s.end), (2, t(0), t(1)));

    // 500ns apart: both truncate to the same stored microsecond
    let mut late = bar(2);
    late.datetime += Duration::nanoseconds(500);
    db.save_bars(&bar_key(), &[bar(2), late], true).unwrap();

    let s = db.bar_summary(&bar_key()).unwrap().unwrap();
    assert_eq!(s.count, 3);
    assert_eq!(db.stats().stream_appends, 1);
    assert_bar_invariant(&db, &bar_key());
}

#[test]
fn failed_summary_update_is_unavailable_and_rolls_back() {
    let dir = TempDir::new().unwrap();
    let db = writer(&dir);
    db.coordinator()
        .with_write(|scope| {
            scope.conn().execute_batch("DROP TABLE bar_overview")?;
            Ok(())
        })
        .unwrap();

    let err = db.save_bars(&bar_key(), &bars(0..3), false).unwrap_err();
    assert!(matches!(err, StoreError::StoreUnavailable { .. }), "{err}");
    assert!(all_bars(&db, &bar_key()).is_empty());
}
