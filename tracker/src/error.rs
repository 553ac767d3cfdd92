use market::{AssetId, FetchError};
use thiserror::Error;

use crate::config::UnknownOption;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Asset id not present in the current snapshot.
    #[error("asset {asset_id} is not in the current table")]
    RoutingMiss { asset_id: AssetId },

    #[error("no visible row {row}")]
    UnknownRow { row: usize },

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error(transparent)]
    UnknownOption(#[from] UnknownOption),

    /// The foreground loop has exited.
    #[error("tracker stopped")]
    Stopped,
}
