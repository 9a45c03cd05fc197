//! Store configuration: where the database lives, which role this process plays,
//! and the reference timezone stored timestamps are decoded into.

use crate::error::{Result, StoreError};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_DB_PATH: &str = "MD_DB_PATH";
pub const ENV_DB_ROLE: &str = "MD_DB_ROLE";
pub const ENV_DB_TZ: &str = "MD_DB_TZ";

const DEFAULT_DB_PATH: &str = "./storage/market.duckdb";

/// Which connection modes a store instance may use.
///
/// A `Writer` keeps a read-only handle open and upgrades it inside write scopes.
/// A `ReaderOnly` instance never opens a read-write handle, so any number of them
/// can run in other processes next to the single writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreRole {
    #[default]
    Writer,
    #[serde(alias = "reader", alias = "readonly")]
    ReaderOnly,
}

impl FromStr for StoreRole {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "writer" | "readwrite" | "rw" => Ok(StoreRole::Writer),
            "reader" | "readonly" | "readeronly" | "ro" => Ok(StoreRole::ReaderOnly),
            other => Err(StoreError::Config(format!("unknown store role {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub role: StoreRole,
    #[serde(default = "default_tz")]
    pub timezone: Tz,
}

fn default_tz() -> Tz {
    chrono_tz::UTC
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>, role: StoreRole) -> Self {
        Self {
            path: path.into(),
            role,
            timezone: default_tz(),
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Build from the process environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self> {
        load_env_best_effort();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = lookup(ENV_DB_PATH)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let role = match lookup(ENV_DB_ROLE) {
            Some(r) => r.parse()?,
            None => StoreRole::default(),
        };
        let timezone = match lookup(ENV_DB_TZ) {
            Some(tz) => tz
                .trim()
                .parse::<Tz>()
                .map_err(|e| StoreError::Config(format!("invalid timezone {tz:?}: {e}")))?,
            None => default_tz(),
        };
        Ok(Self {
            path: PathBuf::from(path),
            role,
            timezone,
        })
    }
}

/// Try project root `.env`, then `.env.example`.
fn load_env_best_effort() {
    let _ = dotenvy::from_filename(".env").or_else(|_| dotenvy::from_filename(".env.example"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = StoreConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(cfg.role, StoreRole::Writer);
        assert_eq!(cfg.timezone, chrono_tz::UTC);
    }

    #[test]
    fn reads_all_keys() {
        let cfg = StoreConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, "/data/md.duckdb"),
            (ENV_DB_ROLE, "ReadOnly"),
            (ENV_DB_TZ, "Asia/Shanghai"),
        ]))
        .unwrap();
        assert_eq!(cfg.path, PathBuf::from("/data/md.duckdb"));
        assert_eq!(cfg.role, StoreRole::ReaderOnly);
        assert_eq!(cfg.timezone, chrono_tz::Asia::Shanghai);
    }

    #[test]
    fn rejects_bad_values() {
        let err = StoreConfig::from_lookup(lookup_from(&[(ENV_DB_ROLE, "admin")])).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        let err = StoreConfig::from_lookup(lookup_from(&[(ENV_DB_TZ, "Mars/Olympus")])).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
