use std::collections::BTreeSet;

use lock3r_contracts::document::InMemoryDocument;
use lock3r_contracts::{ElementId, FieldMutation};
use uuid::Uuid;

use crate::session::{EnforcementSession, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

/// Stable identifier of a failure the host knows how to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FailureDefinitionId(pub Uuid);

impl std::fmt::Display for FailureDefinitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdaterId(pub Uuid);

impl std::fmt::Display for UpdaterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for HostError {}

/// The host's pre-commit mutation notification mechanism.
pub trait MutationNotifier {
    fn register_updater(&mut self, updater: UpdaterId) -> Result<(), HostError>;

    /// Asks the host to call the updater for mutations on these elements.
    fn add_triggers(
        &mut self,
        updater: UpdaterId,
        element_ids: &BTreeSet<ElementId>,
    ) -> Result<(), HostError>;
}

/// The host's failure reporting boundary. Destructive actions are requests; the host
/// performs them.
pub trait FailureSink {
    fn post_failure(&mut self, severity: Severity, failure_id: FailureDefinitionId, message: &str);

    fn request_close_document(&mut self);

    fn request_cancel_save(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedFailure {
    pub severity: Severity,
    pub failure_id: FailureDefinitionId,
    pub message: String,
}

/// Collects everything the guard asks of the host.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub failures: Vec<PostedFailure>,
    pub close_requested: bool,
    pub cancel_requested: bool,
}

impl FailureSink for RecordingSink {
    fn post_failure(&mut self, severity: Severity, failure_id: FailureDefinitionId, message: &str) {
        self.failures.push(PostedFailure {
            severity,
            failure_id,
            message: message.to_string(),
        });
    }

    fn request_close_document(&mut self) {
        self.close_requested = true;
    }

    fn request_cancel_save(&mut self) {
        self.cancel_requested = true;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub registrations: Vec<UpdaterId>,
    pub triggers: BTreeSet<ElementId>,
}

impl MutationNotifier for RecordingNotifier {
    fn register_updater(&mut self, updater: UpdaterId) -> Result<(), HostError> {
        if self.registrations.contains(&updater) {
            return Err(HostError {
                code: "ERR_UPDATER_ALREADY_REGISTERED",
                message: format!("updater {} is already registered", updater),
            });
        }
        self.registrations.push(updater);
        Ok(())
    }

    fn add_triggers(
        &mut self,
        updater: UpdaterId,
        element_ids: &BTreeSet<ElementId>,
    ) -> Result<(), HostError> {
        if !self.registrations.contains(&updater) {
            return Err(HostError {
                code: "ERR_UPDATER_NOT_REGISTERED",
                message: format!("updater {} has no registration", updater),
            });
        }
        self.triggers.extend(element_ids.iter().copied());
        Ok(())
    }
}

/// Delivers a mutation to the session before committing it to the document. The value
/// only lands when the session allows it.
pub fn apply_mutation(
    document: &mut InMemoryDocument,
    session: &EnforcementSession,
    mutation: FieldMutation,
    sink: &mut dyn FailureSink,
) -> Result<Verdict, HostError> {
    if document
        .field(mutation.element_id, mutation.field_id)
        .is_none()
    {
        return Err(HostError {
            code: "ERR_UNKNOWN_FIELD",
            message: format!(
                "element {} has no field {}",
                mutation.element_id, mutation.field_id
            ),
        });
    }

    let verdict = session.check(&mutation, sink);
    if verdict == Verdict::Allowed {
        document.commit_field(mutation.element_id, mutation.field_id, mutation.proposed);
    }
    Ok(verdict)
}
