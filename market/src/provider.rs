use async_trait::async_trait;

use crate::errors::FetchError;
use crate::series::RawOhlcRow;
use crate::types::{AssetId, AssetSnapshot};

/// High-level abstraction over a market-data provider.
#[async_trait]
pub trait MarketDataProvider: Send + Sync + 'static {
    /// Current market state for `ids`, in the provider's order.
    async fn fetch_snapshot(&self, ids: &[AssetId]) -> Result<Vec<AssetSnapshot>, FetchError>;

    /// OHLC rows covering the last `days` days.
    async fn fetch_ohlc(&self, id: &AssetId, days: u32) -> Result<Vec<RawOhlcRow>, FetchError>;
}

/// Best-effort byte fetcher for asset icons.
#[async_trait]
pub trait IconTransport: Send + Sync + 'static {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
