use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use market::{AssetId, AssetSnapshot, IconImage, OhlcSeries};

use crate::config::ChartRange;

/// Identity of a unit of background work, and of the cache slot it fills.
///
/// Equal keys are the same logical job: at most one may be in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKey {
    /// Market snapshot for the configured asset set. One slot, replaced on
    /// every refresh.
    Snapshot,

    /// OHLC series. `day` is the UTC date at request time, so a key from
    /// yesterday can never be looked up again after rollover.
    Ohlc {
        asset_id: AssetId,
        range: ChartRange,
        day: NaiveDate,
    },

    Icon { asset_id: AssetId },
}

impl JobKey {
    pub fn ohlc(asset_id: AssetId, range: ChartRange, day: NaiveDate) -> Self {
        Self::Ohlc {
            asset_id,
            range,
            day,
        }
    }

    pub fn icon(asset_id: AssetId) -> Self {
        Self::Icon { asset_id }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Ohlc { .. } => "ohlc",
            Self::Icon { .. } => "icon",
        }
    }

    pub fn is_icon(&self) -> bool {
        matches!(self, Self::Icon { .. })
    }

    /// Day-bucketed keys are stale once the UTC day has moved on.
    pub fn is_current(&self, today: NaiveDate) -> bool {
        match self {
            Self::Ohlc { day, .. } => *day == today,
            Self::Snapshot | Self::Icon { .. } => true,
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot => f.write_str("snapshot"),
            Self::Ohlc {
                asset_id,
                range,
                day,
            } => write!(f, "ohlc:{asset_id}:{range}@{day}"),
            Self::Icon { asset_id } => write!(f, "icon:{asset_id}"),
        }
    }
}

/// Result of a completed job. Cheap to clone for fan-out.
#[derive(Debug, Clone)]
pub enum JobValue {
    Snapshot(Arc<Vec<AssetSnapshot>>),
    Ohlc(Arc<OhlcSeries>),
    Icon(Arc<IconImage>),
}

impl JobValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Ohlc(_) => "ohlc",
            Self::Icon(_) => "icon",
        }
    }

    /// Whether this value may fill the slot of `key`.
    pub fn fits(&self, key: &JobKey) -> bool {
        self.kind() == key.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn ohlc_keys_differ_by_day() {
        let a = JobKey::ohlc("bitcoin".into(), ChartRange::Days7, day(1));
        let b = JobKey::ohlc("bitcoin".into(), ChartRange::Days7, day(2));
        assert_ne!(a, b);
        assert!(a.is_current(day(1)));
        assert!(!a.is_current(day(2)));
    }

    #[test]
    fn ohlc_keys_differ_by_range() {
        let a = JobKey::ohlc("bitcoin".into(), ChartRange::Days7, day(1));
        let b = JobKey::ohlc("bitcoin".into(), ChartRange::Days30, day(1));
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_readable() {
        let k = JobKey::ohlc("ethereum".into(), ChartRange::Days90, day(5));
        assert_eq!(k.to_string(), "ohlc:ethereum:90d@2024-03-05");
        assert_eq!(JobKey::icon("ethereum".into()).to_string(), "icon:ethereum");
        assert_eq!(JobKey::Snapshot.to_string(), "snapshot");
    }

    #[test]
    fn value_fits_only_its_own_kind() {
        let v = JobValue::Snapshot(Arc::new(Vec::new()));
        assert!(v.fits(&JobKey::Snapshot));
        assert!(!v.fits(&JobKey::icon("bitcoin".into())));
    }
}
