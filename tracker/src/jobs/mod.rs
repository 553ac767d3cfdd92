pub mod dispatcher;
pub mod key;

pub use dispatcher::{Completion, JobDispatcher, JobEvent, JobHandle, JobOutcome};
pub use key::{JobKey, JobValue};
