//! Engine facade: the operations offered to callers.

mod acquisition;
mod error;
mod types;

pub use acquisition::AcquisitionEngine;
pub use error::EngineError;
pub use types::{AcquisitionOutcome, EnqueuedDownload, Outcome, Resolution, SelectionAction};
