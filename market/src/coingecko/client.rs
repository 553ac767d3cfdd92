use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::coingecko::types::MarketRecord;
use crate::errors::FetchError;
use crate::provider::{IconTransport, MarketDataProvider};
use crate::series::RawOhlcRow;
use crate::types::{AssetId, AssetSnapshot};

/// Percent-change windows requested alongside the market snapshot.
const PRICE_CHANGE_WINDOWS: &str = "24h,7d";

#[derive(Clone)]
pub struct CoinGeckoClient {
    http: Client,
    url: String,
    vs_currency: String,
    market_timeout: Duration,
    icon_timeout: Duration,
}

impl CoinGeckoClient {
    pub fn new(
        url: String,
        vs_currency: String,
        market_timeout: Duration,
        icon_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("asset-tracker/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            vs_currency,
            market_timeout,
            icon_timeout,
        })
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoClient {
    #[instrument(skip(self, ids), fields(assets = ids.len()), level = "debug")]
    async fn fetch_snapshot(&self, ids: &[AssetId]) -> Result<Vec<AssetSnapshot>, FetchError> {
        let url = format!("{}/coins/markets", self.url);
        let ids_param = ids
            .iter()
            .map(AssetId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", self.vs_currency.as_str()),
                ("ids", ids_param.as_str()),
                ("price_change_percentage", PRICE_CHANGE_WINDOWS),
            ])
            .timeout(self.market_timeout)
            .send()
            .await?
            .error_for_status()?;

        let records: Vec<MarketRecord> = resp.json().await?;

        let snapshots: Vec<AssetSnapshot> = records
            .into_iter()
            .filter(|r| {
                let keep = !r.id.is_empty();
                if !keep {
                    warn!(name = %r.name, "market record without id dropped");
                }
                keep
            })
            .map(AssetSnapshot::from)
            .collect();

        debug!(received = snapshots.len(), "coingecko markets fetched");

        Ok(snapshots)
    }

    #[instrument(skip(self), fields(asset_id = %id), level = "debug")]
    async fn fetch_ohlc(&self, id: &AssetId, days: u32) -> Result<Vec<RawOhlcRow>, FetchError> {
        let url = format!("{}/coins/{}/ohlc", self.url, id);
        let days_param = days.to_string();

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", self.vs_currency.as_str()),
                ("days", days_param.as_str()),
            ])
            .timeout(self.market_timeout)
            .send()
            .await?
            .error_for_status()?;

        let rows: Vec<RawOhlcRow> = resp.json().await?;

        debug!(rows = rows.len(), "coingecko ohlc fetched");

        Ok(rows)
    }
}

#[async_trait]
impl IconTransport for CoinGeckoClient {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .http
            .get(url)
            .timeout(self.icon_timeout)
            .send()
            .await?
            .error_for_status()?;

        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}
