use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable provider identifier of an asset (e.g. `"bitcoin"`).
///
/// All routing of results back to display elements keys on this id,
/// never on a row index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for AssetId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

impl Borrow<str> for AssetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Market state of one asset at the time of a snapshot.
///
/// Immutable once received; a newer snapshot replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub id: AssetId,
    pub name: String,
    /// Ticker symbol, lower-cased.
    pub symbol: String,

    pub price: f64,
    pub market_cap: f64,

    /// Percent changes over the trailing 24h / 7d windows.
    pub change_24h_pct: f64,
    pub change_7d_pct: f64,

    pub volume_24h: f64,
    pub circulating_supply: f64,
    /// `None` when the asset has no capped supply.
    pub total_supply: Option<f64>,

    pub icon_url: Option<String>,
}

/// One OHLC bar. `ts` is the bar open time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcCandle {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Raw icon bytes for an asset. Decoding is left to the presentation layer.
#[derive(Clone, PartialEq, Eq)]
pub struct IconImage {
    pub asset_id: AssetId,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for IconImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IconImage")
            .field("asset_id", &self.asset_id)
            .field("len", &self.bytes.len())
            .finish()
    }
}
