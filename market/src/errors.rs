use thiserror::Error;

/// Failure of a single provider or transport call.
///
/// Cloneable so that one failed fetch can be delivered to every waiter of
/// the same job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network failure, timeout or non-2xx status.
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload was empty or could not be interpreted.
    #[error("unexpected data: {0}")]
    DataShape(String),
}

impl FetchError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn data_shape(msg: impl Into<String>) -> Self {
        Self::DataShape(msg.into())
    }

    pub fn is_data_shape(&self) -> bool {
        matches!(self, Self::DataShape(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::DataShape(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
