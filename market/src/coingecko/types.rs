use serde::Deserialize;

use crate::types::{AssetId, AssetSnapshot};

/// One row of `GET /coins/markets`.
///
/// CoinGecko reports `null` for most numeric fields on thinly traded
/// assets, so everything but the identity is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketRecord {
    pub id: String,
    pub symbol: String,
    pub name: String,

    pub image: Option<String>,

    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,

    pub price_change_percentage_24h: Option<f64>,
    pub price_change_percentage_7d_in_currency: Option<f64>,

    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
}

impl From<MarketRecord> for AssetSnapshot {
    fn from(r: MarketRecord) -> Self {
        AssetSnapshot {
            id: AssetId::new(r.id),
            name: r.name,
            symbol: r.symbol.to_lowercase(),
            price: r.current_price.unwrap_or(0.0),
            market_cap: r.market_cap.unwrap_or(0.0),
            change_24h_pct: r.price_change_percentage_24h.unwrap_or(0.0),
            change_7d_pct: r.price_change_percentage_7d_in_currency.unwrap_or(0.0),
            volume_24h: r.total_volume.unwrap_or(0.0),
            circulating_supply: r.circulating_supply.unwrap_or(0.0),
            // Zero supply means "uncapped" on the provider side.
            total_supply: r.total_supply.filter(|s| *s > 0.0),
            icon_url: r.image.filter(|u| !u.is_empty()),
        }
    }
}
