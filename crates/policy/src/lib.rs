use std::collections::{BTreeMap, BTreeSet};

use lock3r_contracts::{Document, ElementId, FieldId};
use lock3r_ledger::{GroundTruthRecord, RecordKey};

/// Outcome of comparing a document against its ground truth.
///
/// A mismatch is a normal result, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub mismatched: BTreeSet<RecordKey>,
}

impl ValidationResult {
    pub fn ok(&self) -> bool {
        self.mismatched.is_empty()
    }

    /// Mismatched fields grouped by element.
    pub fn altered_elements(&self) -> BTreeMap<ElementId, Vec<FieldId>> {
        let mut out = BTreeMap::<ElementId, Vec<FieldId>>::new();
        for key in &self.mismatched {
            out.entry(key.element_id).or_default().push(key.field_id);
        }
        out
    }
}

/// Rebuilds the record from the document and reports every stored entry that is missing
/// or different. Entries only present in the document are not reported.
pub fn validate<D: Document + ?Sized>(
    document: &D,
    record: &GroundTruthRecord,
) -> ValidationResult {
    let candidate = GroundTruthRecord::build(document);
    let mismatched = record
        .entries()
        .filter(|(key, digest)| candidate.get(key) != Some(*digest))
        .map(|(key, _)| *key)
        .collect::<BTreeSet<_>>();

    if mismatched.is_empty() {
        tracing::debug!(
            path = %document.path().display(),
            entries = record.len(),
            "document matches ground truth"
        );
    } else {
        tracing::warn!(
            path = %document.path().display(),
            mismatched = mismatched.len(),
            "document diverges from ground truth"
        );
    }

    ValidationResult { mismatched }
}

/// One line per altered element: its description and the fields that diverged.
pub fn describe_altered<D: Document + ?Sized>(document: &D, result: &ValidationResult) -> String {
    let mut lines = Vec::new();
    for (element_id, field_ids) in result.altered_elements() {
        let description = document
            .describe(element_id)
            .unwrap_or_else(|| format!("<missing> <{}>", element_id));
        let fields = field_ids
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("{}: {}", description, fields));
    }
    lines.join("\n")
}
