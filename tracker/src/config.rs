use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use market::AssetId;
use thiserror::Error;
use tracing::warn;

/// Assets tracked when `TRACKER_ASSETS` is not set.
pub const DEFAULT_ASSETS: [&str; 20] = [
    "bitcoin",
    "ethereum",
    "solana",
    "dogecoin",
    "cardano",
    "ripple",
    "polkadot",
    "litecoin",
    "tron",
    "polygon",
    "avalanche-2",
    "chainlink",
    "uniswap",
    "stellar",
    "internet-computer",
    "vechain",
    "cosmos",
    "filecoin",
    "aptos",
    "arbitrum",
];

pub const DEFAULT_API_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized {kind} option: {value:?}")]
pub struct UnknownOption {
    pub kind: &'static str,
    pub value: String,
}

/// Auto-refresh cadence offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshInterval {
    Secs30,
    #[default]
    Min1,
    Min5,
    Min10,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 4] = [Self::Secs30, Self::Min1, Self::Min5, Self::Min10];

    pub fn label(self) -> &'static str {
        match self {
            Self::Secs30 => "30s",
            Self::Min1 => "1m",
            Self::Min5 => "5m",
            Self::Min10 => "10m",
        }
    }

    pub fn as_millis(self) -> u64 {
        match self {
            Self::Secs30 => 30_000,
            Self::Min1 => 60_000,
            Self::Min5 => 300_000,
            Self::Min10 => 600_000,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.as_millis())
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RefreshInterval {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.label() == s.trim())
            .ok_or_else(|| UnknownOption {
                kind: "refresh interval",
                value: s.to_string(),
            })
    }
}

/// Chart history length, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChartRange {
    #[default]
    Days7,
    Days30,
    Days90,
    Days365,
}

impl ChartRange {
    pub const ALL: [ChartRange; 4] = [Self::Days7, Self::Days30, Self::Days90, Self::Days365];

    pub fn days(self) -> u32 {
        match self {
            Self::Days7 => 7,
            Self::Days30 => 30,
            Self::Days90 => 90,
            Self::Days365 => 365,
        }
    }
}

impl fmt::Display for ChartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

impl TryFrom<u32> for ChartRange {
    type Error = UnknownOption;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|r| r.days() == days)
            .ok_or_else(|| UnknownOption {
                kind: "chart range",
                value: days.to_string(),
            })
    }
}

impl FromStr for ChartRange {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('d');
        let days: u32 = trimmed.parse().map_err(|_| UnknownOption {
            kind: "chart range",
            value: s.to_string(),
        })?;
        Self::try_from(days)
    }
}

/// Per-kind network timeouts applied to background jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTimeouts {
    /// Snapshot and OHLC calls.
    pub market: Duration,
    /// Icon downloads.
    pub icon: Duration,
}

impl Default for JobTimeouts {
    fn default() -> Self {
        Self {
            market: Duration::from_secs(20),
            icon: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base URL of the market-data provider API.
    pub api_url: String,

    /// Quote currency for prices and OHLC series.
    pub vs_currency: String,

    /// Fixed set of assets refreshed on every snapshot, in request order.
    pub assets: Vec<AssetId>,

    // =========================
    // Refresh / chart defaults
    // =========================
    /// Initial auto-refresh cadence. Can be changed at runtime.
    pub refresh: RefreshInterval,

    /// Chart range used when a chart request does not name one.
    pub chart_range: ChartRange,

    // =========================
    // Worker pool / cache
    // =========================
    /// Maximum number of background jobs executing at once.
    ///
    /// Jobs beyond this wait for a permit; they are still registered as
    /// in flight, so duplicate submits attach to them instead of queueing
    /// a second fetch.
    pub max_concurrent_jobs: usize,

    /// Upper bound on cached artifacts (snapshot, OHLC series, icons).
    ///
    /// OHLC entries from past UTC days are never read again and are the
    /// first to go once the bound is reached.
    pub cache_capacity: usize,

    pub timeouts: JobTimeouts,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            vs_currency: "usd".to_string(),
            assets: DEFAULT_ASSETS.iter().map(|a| AssetId::from(*a)).collect(),
            refresh: RefreshInterval::default(),
            chart_range: ChartRange::default(),
            max_concurrent_jobs: 8,
            cache_capacity: 256,
            timeouts: JobTimeouts::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("COINGECKO_API_URL").unwrap_or(defaults.api_url);
        let vs_currency = std::env::var("TRACKER_VS_CURRENCY").unwrap_or(defaults.vs_currency);

        let assets = std::env::var("TRACKER_ASSETS")
            .ok()
            .map(|v| parse_asset_list(&v))
            .filter(|a| !a.is_empty())
            .unwrap_or(defaults.assets);

        Self {
            api_url,
            vs_currency,
            assets,
            // Unknown refresh labels fall back to the default cadence.
            refresh: parse_env("TRACKER_REFRESH", defaults.refresh),
            chart_range: parse_env("TRACKER_CHART_RANGE", defaults.chart_range),
            max_concurrent_jobs: parse_env("TRACKER_MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs)
                .max(1),
            cache_capacity: parse_env("TRACKER_CACHE_CAPACITY", defaults.cache_capacity).max(1),
            timeouts: defaults.timeouts,
        }
    }
}

/// Split a comma-separated asset list, dropping blanks.
pub fn parse_asset_list(v: &str) -> Vec<AssetId> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(AssetId::from)
        .collect()
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr + fmt::Debug,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!(key, value = %raw, error = %e, fallback = ?default, "invalid config value");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_labels_map_to_millis() {
        let pairs: Vec<(&str, u64)> = RefreshInterval::ALL
            .iter()
            .map(|r| (r.label(), r.as_millis()))
            .collect();
        assert_eq!(
            pairs,
            vec![("30s", 30_000), ("1m", 60_000), ("5m", 300_000), ("10m", 600_000)]
        );
    }

    #[test]
    fn unknown_refresh_label_is_rejected() {
        let err = "2m".parse::<RefreshInterval>().unwrap_err();
        assert_eq!(err.kind, "refresh interval");
    }

    #[test]
    fn chart_range_accepts_only_offered_ranges() {
        assert_eq!("30".parse::<ChartRange>().unwrap(), ChartRange::Days30);
        assert_eq!("365d".parse::<ChartRange>().unwrap(), ChartRange::Days365);
        assert!(ChartRange::try_from(14).is_err());
        assert!("abc".parse::<ChartRange>().is_err());
    }

    #[test]
    fn asset_list_drops_blanks() {
        let ids = parse_asset_list(" bitcoin, ,ethereum,");
        assert_eq!(ids, vec![AssetId::from("bitcoin"), AssetId::from("ethereum")]);
    }

    #[test]
    fn defaults_track_twenty_assets() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.assets.len(), 20);
        assert_eq!(cfg.refresh, RefreshInterval::Min1);
        assert_eq!(cfg.timeouts.market, Duration::from_secs(20));
        assert_eq!(cfg.timeouts.icon, Duration::from_secs(10));
    }
}
