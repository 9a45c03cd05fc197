use crate::securities::symbols::UnknownTag;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::Display;

pub type Price = f64;
pub type Volume = f64;

/// Bar interval of a candle series.
///
/// - `Minute` – one-minute bars.
/// - `Hour` – one-hour bars.
/// - `Daily` – one bar per trading day.
/// - `Weekly` – one bar per trading week.
/// - `Tick` – tick-level series stored in the bar table (rare, kept for compatibility).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Interval {
    #[strum(serialize = "1m")]
    Minute,
    #[strum(serialize = "1h")]
    Hour,
    #[strum(serialize = "d")]
    Daily,
    #[strum(serialize = "w")]
    Weekly,
    #[strum(serialize = "tick")]
    Tick,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::Minute,
        Interval::Hour,
        Interval::Daily,
        Interval::Weekly,
        Interval::Tick,
    ];

    /// Canonical tag stored in the `interval` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute => "1m",
            Interval::Hour => "1h",
            Interval::Daily => "d",
            Interval::Weekly => "w",
            Interval::Tick => "tick",
        }
    }

    pub fn from_tag(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.as_str() == s)
    }
}

impl FromStr for Interval {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::from_tag(s.trim()).ok_or_else(|| UnknownTag {
            kind: "interval",
            value: s.to_string(),
        })
    }
}
