//! Market data record types shared by the store and its callers.

pub mod data;
pub mod securities;

pub use data::core::{BarData, DEPTH_LEVELS, Depth, SeriesKey, TickData};
pub use data::models::Interval;
pub use data::overview::{BarOverview, TickOverview};
pub use securities::symbols::{Exchange, UnknownTag};
