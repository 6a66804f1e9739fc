use std::path::PathBuf;

use lock3r_contracts::Document;
use lock3r_ledger::{GroundTruthRecord, RecordError, RecordStore};
use lock3r_policy::{ValidationResult, describe_altered, validate};

use crate::config::GuardConfig;
use crate::host::{FailureSink, Severity};
use crate::session::EnforcementSession;
use crate::{CORRUPTED_FILE_MESSAGE, GuardError, PERMISSION_DENIED_MESSAGE};

/// Why a checkpoint refused the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Mismatch(ValidationResult),
    CorruptRecord { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointDecision {
    Proceed,
    Established { path: PathBuf, entries: usize },
    CancelSave(Violation),
    CloseDocument(Violation),
    /// Failure posted on open, closure disabled by configuration.
    Flagged(Violation),
}

impl CheckpointDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointDecision::Proceed => "PROCEED",
            CheckpointDecision::Established { .. } => "ESTABLISHED",
            CheckpointDecision::CancelSave(_) => "CANCEL_SAVE",
            CheckpointDecision::CloseDocument(_) => "CLOSE_DOCUMENT",
            CheckpointDecision::Flagged(_) => "FLAGGED",
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            CheckpointDecision::CancelSave(_)
                | CheckpointDecision::CloseDocument(_)
                | CheckpointDecision::Flagged(_)
        )
    }
}

/// Checkpoint validation and ground truth establishment for one configuration.
#[derive(Debug, Clone)]
pub struct Guard {
    config: GuardConfig,
    store: RecordStore,
}

impl Guard {
    pub fn new(config: GuardConfig) -> Self {
        let store = RecordStore::new(config.record_extension.clone());
        Self { config, store }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn session(&self) -> EnforcementSession {
        EnforcementSession::new(self.config.failure_id)
    }

    /// Builds the ground truth from the current state and replaces any existing sidecar.
    pub fn establish<D: Document + ?Sized>(&self, document: &D) -> Result<PathBuf, GuardError> {
        let record = GroundTruthRecord::build(document);
        let path = self.store.save(&record, document.path())?;
        tracing::info!(
            document = %document.path().display(),
            entries = record.len(),
            "ground truth established"
        );
        Ok(path)
    }

    pub fn validate<D: Document + ?Sized>(
        &self,
        document: &D,
    ) -> Result<ValidationResult, GuardError> {
        let record = self.store.load(document.path())?;
        Ok(validate(document, &record))
    }

    /// Validates a freshly opened document. A first open establishes the ground truth
    /// when configured to; a diverging document is reported and its closure requested.
    pub fn on_document_opened<D: Document + ?Sized>(
        &self,
        document: &D,
        sink: &mut dyn FailureSink,
    ) -> Result<CheckpointDecision, GuardError> {
        let violation = match self.store.load(document.path()) {
            Ok(record) => {
                let result = validate(document, &record);
                if result.ok() {
                    return Ok(CheckpointDecision::Proceed);
                }
                Violation::Mismatch(result)
            }
            Err(RecordError::NotFound { .. }) if self.config.establish_on_open => {
                let record = GroundTruthRecord::build(document);
                let path = self.store.save(&record, document.path())?;
                tracing::info!(
                    document = %document.path().display(),
                    entries = record.len(),
                    "ground truth established on first open"
                );
                return Ok(CheckpointDecision::Established {
                    path,
                    entries: record.len(),
                });
            }
            Err(RecordError::NotFound { .. }) => return Ok(CheckpointDecision::Proceed),
            Err(err @ RecordError::Corrupt { .. }) => Violation::CorruptRecord {
                reason: err.to_string(),
            },
            Err(err) => return Err(err.into()),
        };

        let message = failure_message(CORRUPTED_FILE_MESSAGE, document, &violation);
        tracing::warn!(
            document = %document.path().display(),
            close = self.config.close_on_corrupt,
            "document failed validation on open"
        );
        sink.post_failure(Severity::Error, self.config.failure_id, &message);

        if self.config.close_on_corrupt {
            sink.request_close_document();
            Ok(CheckpointDecision::CloseDocument(violation))
        } else {
            Ok(CheckpointDecision::Flagged(violation))
        }
    }

    /// Validates pending state before a save commits; a diverging document has its save
    /// cancelled.
    pub fn on_document_saving<D: Document + ?Sized>(
        &self,
        document: &D,
        sink: &mut dyn FailureSink,
    ) -> Result<CheckpointDecision, GuardError> {
        let violation = match self.store.load(document.path()) {
            Ok(record) => {
                let result = validate(document, &record);
                if result.ok() {
                    return Ok(CheckpointDecision::Proceed);
                }
                Violation::Mismatch(result)
            }
            Err(RecordError::NotFound { .. }) => return Ok(CheckpointDecision::Proceed),
            Err(err @ RecordError::Corrupt { .. }) => Violation::CorruptRecord {
                reason: err.to_string(),
            },
            Err(err) => return Err(err.into()),
        };

        let message = failure_message(PERMISSION_DENIED_MESSAGE, document, &violation);
        tracing::warn!(
            document = %document.path().display(),
            "save cancelled: document diverges from ground truth"
        );
        sink.post_failure(Severity::Error, self.config.failure_id, &message);
        sink.request_cancel_save();
        Ok(CheckpointDecision::CancelSave(violation))
    }
}

fn failure_message<D: Document + ?Sized>(headline: &str, document: &D, violation: &Violation) -> String {
    match violation {
        Violation::Mismatch(result) => {
            format!("{}\n{}", headline, describe_altered(document, result))
        }
        Violation::CorruptRecord { reason } => {
            format!("{}\nground truth record is unreadable: {}", headline, reason)
        }
    }
}
