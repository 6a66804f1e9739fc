use std::collections::BTreeSet;

use lock3r_contracts::canonical;
use lock3r_contracts::{Document, ElementId, FieldMutation};
use lock3r_ledger::{GroundTruthRecord, RecordStore};

use crate::host::{FailureDefinitionId, FailureSink, MutationNotifier, Severity, UpdaterId};
use crate::{GuardError, PERMISSION_DENIED_MESSAGE, UPDATER_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Vetoed,
}

/// Live enforcement state for one open document.
///
/// Only `toggle_on` and `toggle_off` mutate the session; `check` borrows it shared, so a
/// toggle can never run while a check is in flight.
#[derive(Debug, Clone)]
pub struct EnforcementSession {
    active: bool,
    watched_ids: BTreeSet<ElementId>,
    record: GroundTruthRecord,
    registered: bool,
    updater_id: UpdaterId,
    failure_id: FailureDefinitionId,
}

impl EnforcementSession {
    pub fn new(failure_id: FailureDefinitionId) -> Self {
        Self {
            active: false,
            watched_ids: BTreeSet::new(),
            record: GroundTruthRecord::new(),
            registered: false,
            updater_id: UPDATER_ID,
            failure_id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn watched_ids(&self) -> &BTreeSet<ElementId> {
        &self.watched_ids
    }

    pub fn record(&self) -> &GroundTruthRecord {
        &self.record
    }

    /// Loads the document's ground truth and starts vetoing mutations on its elements.
    ///
    /// A no-op when already active. Without a sidecar the session stays inactive and
    /// `RecordNotFound` is returned.
    pub fn toggle_on<D, N>(
        &mut self,
        document: &D,
        store: &RecordStore,
        notifier: &mut N,
    ) -> Result<(), GuardError>
    where
        D: Document + ?Sized,
        N: MutationNotifier + ?Sized,
    {
        if self.active {
            return Ok(());
        }

        let record = store.load(document.path())?;

        if !self.registered {
            notifier.register_updater(self.updater_id)?;
            self.registered = true;
        }

        let watched_ids = record.element_ids();
        notifier.add_triggers(self.updater_id, &watched_ids)?;

        tracing::info!(
            path = %document.path().display(),
            watched = watched_ids.len(),
            entries = record.len(),
            "live enforcement enabled"
        );

        self.watched_ids = watched_ids;
        self.record = record;
        self.active = true;
        Ok(())
    }

    /// Stops vetoing. The host registration stays installed but inert.
    pub fn toggle_off(&mut self) {
        if self.active {
            tracing::info!("live enforcement disabled");
        }
        self.active = false;
    }

    /// Pre-commit check of one mutation. Vetoes post a failure to the sink.
    pub fn check(&self, mutation: &FieldMutation, sink: &mut dyn FailureSink) -> Verdict {
        if !self.active || !self.watched_ids.contains(&mutation.element_id) {
            return Verdict::Allowed;
        }

        let Some(stored) = self
            .record
            .digest_for(mutation.element_id, mutation.field_id)
        else {
            return Verdict::Allowed;
        };

        if canonical::digest_value(&mutation.proposed).as_ref() == Some(stored) {
            return Verdict::Allowed;
        }

        tracing::warn!(
            element_id = %mutation.element_id,
            field_id = %mutation.field_id,
            storage_kind = mutation.proposed.storage_kind().as_str(),
            "vetoed mutation of protected field"
        );
        sink.post_failure(Severity::Error, self.failure_id, PERMISSION_DENIED_MESSAGE);
        Verdict::Vetoed
    }
}
