pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logger;
pub mod metrics;
pub mod presentation;
pub mod registry;
pub mod scheduler;
pub mod time;

pub use app::{Tracker, TrackerCommand, TrackerHandle};
pub use config::{AppConfig, ChartRange, RefreshInterval};
pub use error::TrackerError;
pub use presentation::{Presentation, TerminalPresentation};
pub use registry::{DisplayHandle, EntityRegistry, SortKey, SortSpec};
