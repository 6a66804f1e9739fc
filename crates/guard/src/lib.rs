//! Checkpoint validation and live enforcement for protected document fields.
//!
//! The guard never closes a document or cancels a save on its own: it decides, then
//! asks the host through [`host::FailureSink`].

use lock3r_ledger::RecordError;
use uuid::Uuid;

pub mod checkpoint;
pub mod config;
pub mod host;
pub mod session;

pub use checkpoint::{CheckpointDecision, Guard, Violation};
pub use config::GuardConfig;
pub use host::{FailureDefinitionId, FailureSink, HostError, MutationNotifier, Severity, UpdaterId};
pub use session::{EnforcementSession, Verdict};

/// Failure definition posted for every live veto unless configured otherwise.
pub const DEFAULT_FAILURE_ID: FailureDefinitionId =
    FailureDefinitionId(Uuid::from_u128(0xf04836cc_a698_4bec_9e02_0603d0bd8cf9));

/// Identifies the live updater when it registers with the host.
pub const UPDATER_ID: UpdaterId = UpdaterId(Uuid::from_u128(0x5a7c1e52_3b8f_4c61_9d2e_7f04a6b1c3d8));

pub const PERMISSION_DENIED_MESSAGE: &str =
    "Permission Denied: you are not allowed to modify protected parameter values.";

pub const CORRUPTED_FILE_MESSAGE: &str = "Corrupted File: the original vendor data has been modified and the authenticity compromised.";

#[derive(Debug)]
pub enum GuardError {
    Record(RecordError),
    Host(HostError),
}

impl GuardError {
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::Record(err) => err.code(),
            GuardError::Host(err) => err.code,
        }
    }
}

impl std::fmt::Display for GuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardError::Record(err) => write!(f, "{}", err),
            GuardError::Host(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for GuardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GuardError::Record(err) => Some(err),
            GuardError::Host(err) => Some(err),
        }
    }
}

impl From<RecordError> for GuardError {
    fn from(value: RecordError) -> Self {
        GuardError::Record(value)
    }
}

impl From<HostError> for GuardError {
    fn from(value: HostError) -> Self {
        GuardError::Host(value)
    }
}
