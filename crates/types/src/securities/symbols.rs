use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::Display;
use thiserror::Error;

/// Raised when a stored or user supplied tag does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} tag: {value:?}")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

/// Trading venue a series is listed on.
///
/// The string form returned by [`Exchange::as_str`] is the canonical tag written to the
/// database. Changing it would require a migration of every stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, PartialOrd, Ord)]
pub enum Exchange {
    // Chinese futures and equity venues
    CFFEX,
    SHFE,
    CZCE,
    DCE,
    INE,
    GFEX,
    SSE,
    SZSE,
    // Global futures venues
    CME,
    CBOT,
    COMEX,
    NYMEX,
    GLOBEX,
    EUREX,
    ICEUS,
    ICEEU,
    SGX,
    CFE,
    // Equities and routing
    SMART,
    NYSE,
    NASDAQ,
    // Crypto
    BINANCE,
    // Locally generated series (spreads, synthetic instruments)
    LOCAL,
}

impl Exchange {
    pub const ALL: [Exchange; 23] = [
        Exchange::CFFEX,
        Exchange::SHFE,
        Exchange::CZCE,
        Exchange::DCE,
        Exchange::INE,
        Exchange::GFEX,
        Exchange::SSE,
        Exchange::SZSE,
        Exchange::CME,
        Exchange::CBOT,
        Exchange::COMEX,
        Exchange::NYMEX,
        Exchange::GLOBEX,
        Exchange::EUREX,
        Exchange::ICEUS,
        Exchange::ICEEU,
        Exchange::SGX,
        Exchange::CFE,
        Exchange::SMART,
        Exchange::NYSE,
        Exchange::NASDAQ,
        Exchange::BINANCE,
        Exchange::LOCAL,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::CFFEX => "CFFEX",
            Exchange::SHFE => "SHFE",
            Exchange::CZCE => "CZCE",
            Exchange::DCE => "DCE",
            Exchange::INE => "INE",
            Exchange::GFEX => "GFEX",
            Exchange::SSE => "SSE",
            Exchange::SZSE => "SZSE",
            Exchange::CME => "CME",
            Exchange::CBOT => "CBOT",
            Exchange::COMEX => "COMEX",
            Exchange::NYMEX => "NYMEX",
            Exchange::GLOBEX => "GLOBEX",
            Exchange::EUREX => "EUREX",
            Exchange::ICEUS => "ICEUS",
            Exchange::ICEEU => "ICEEU",
            Exchange::SGX => "SGX",
            Exchange::CFE => "CFE",
            Exchange::SMART => "SMART",
            Exchange::NYSE => "NYSE",
            Exchange::NASDAQ => "NASDAQ",
            Exchange::BINANCE => "BINANCE",
            Exchange::LOCAL => "LOCAL",
        }
    }

    /// Exact match on the canonical tag. Stored tags are written by [`Exchange::as_str`],
    /// so anything else is treated as corrupt rather than normalized.
    #[inline]
    pub fn from_tag(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.as_str() == s)
    }
}

impl FromStr for Exchange {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Exchange::from_tag(s.trim()).ok_or_else(|| UnknownTag {
            kind: "exchange",
            value: s.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_exchange_round_trips_through_its_tag() {
        for e in Exchange::ALL {
            assert_eq!(Exchange::from_str(e.as_str()).unwrap(), e);
            assert_eq!(e.to_string(), e.as_str());
        }
    }

    #[test]
    fn unknown_exchange_is_rejected() {
        let err = Exchange::from_str("MOON").unwrap_err();
        assert_eq!(err.kind, "exchange");
        assert_eq!(err.value, "MOON");
        // tags are case sensitive on the storage path
        assert!(Exchange::from_tag("cme").is_none());
    }
}
