pub mod api;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod jobs;
pub mod poller;
pub mod session;
pub mod shutdown;

pub use api::{GradingService, HttpGradingService, SubmitMode};
pub use catalog::{Task, TaskCatalog};
pub use config::ClientConfig;
pub use controller::{JobHandle, SubmissionController};
pub use error::{Result, TrainerError};
pub use jobs::{Job, JobId, JobRegistry, JobState, MergeOutcome};
pub use poller::{Poller, PollerHandle, TickOutcome};
pub use session::{Session, SharedSession};
