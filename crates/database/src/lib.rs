//! Market data store
//!
//! Bar and tick history in a single DuckDB file, with a per-series summary table kept
//! next to each raw table so "what data do we have" never scans raw rows.
//!
//! - One process holds the writer role. It keeps a read-only handle open and only
//!   upgrades to the exclusive read-write handle inside a write scope (`coordinator`).
//! - Any number of reader-role processes open the same file read-only.
//! - Summaries (`summary`) are updated in the same transaction as the raw upsert,
//!   using an O(1) append for streaming batches and an exact recount otherwise.
//!
//! Start with [`MarketDatabase::open`] and the [`HistoryDatabase`] trait.

pub mod append;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod error;
pub mod handle;
pub mod queries;
pub mod schema;
pub mod stats;
pub mod summary;

pub use config::{StoreConfig, StoreRole};
pub use coordinator::{WriteCoordinator, WriteScope};
pub use database::{HistoryDatabase, MarketDatabase};
pub use error::{Result, StoreError};
pub use handle::{HandleMode, StoreHandle};
pub use stats::StatsSnapshot;
pub use summary::UpdateStrategy;
