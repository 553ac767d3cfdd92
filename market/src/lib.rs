pub mod coingecko;
pub mod errors;
pub mod provider;
pub mod series;
pub mod types;

pub use errors::FetchError;
pub use provider::{IconTransport, MarketDataProvider};
pub use series::{OhlcSeries, RawOhlcRow};
pub use types::{AssetId, AssetSnapshot, IconImage, OhlcCandle};
