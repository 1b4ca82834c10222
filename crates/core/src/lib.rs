pub mod config;
pub mod engine;
pub mod events;
pub mod metrics;
pub mod monitor;
pub mod network;
pub mod quality;
pub mod query;
pub mod reputation;
pub mod search;
pub mod selection;
pub mod selector;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LogFormat,
    SanitizedConfig, SelectionMode,
};
pub use engine::{
    AcquisitionEngine, AcquisitionOutcome, EngineError, EnqueuedDownload, Outcome, Resolution,
    SelectionAction,
};
pub use events::{EngineEvent, EventBus, EventEnvelope};
pub use monitor::DownloadMonitor;
pub use network::{
    CandidateResponse, DownloadJob, DownloadRunner, JobStatus, NetworkError, SearchNetwork,
    SharedFile, SlskdClient,
};
pub use query::{QueryBuilder, SearchContext, SearchKind};
pub use reputation::{
    ReputationRecord, ReputationSettings, ReputationStore, ReputationTracker,
    SqliteReputationStore, SuccessOutcome, UserStatus,
};
pub use search::{SearchConfig, SearchOrchestrator};
pub use selection::{PendingSelection, SelectionCache};
