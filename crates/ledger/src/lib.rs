use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use lock3r_contracts::canonical::{self, Digest};
use lock3r_contracts::{Document, ElementId, FieldId};

mod store;

pub use store::{DEFAULT_RECORD_EXTENSION, RecordStore, sidecar_path};

#[derive(Debug)]
pub enum RecordError {
    NotFound {
        path: PathBuf,
    },
    Corrupt {
        path: Option<PathBuf>,
        line: usize,
        reason: String,
    },
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

impl RecordError {
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::NotFound { .. } => "ERR_RECORD_NOT_FOUND",
            RecordError::Corrupt { .. } => "ERR_RECORD_CORRUPT",
            RecordError::Io { .. } => "ERR_RECORD_IO",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RecordError::NotFound { .. })
    }

    fn corrupt(line: usize, reason: impl Into<String>) -> Self {
        RecordError::Corrupt {
            path: None,
            line,
            reason: reason.into(),
        }
    }

    fn at_path(self, file: &Path) -> Self {
        match self {
            RecordError::Corrupt { line, reason, .. } => RecordError::Corrupt {
                path: Some(file.to_path_buf()),
                line,
                reason,
            },
            other => other,
        }
    }
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::NotFound { path } => {
                write!(f, "{}: no ground truth record at {}", self.code(), path.display())
            }
            RecordError::Corrupt {
                path: Some(path),
                line,
                reason,
            } => write!(
                f,
                "{}: {} line {}: {}",
                self.code(),
                path.display(),
                line,
                reason
            ),
            RecordError::Corrupt {
                path: None,
                line,
                reason,
            } => write!(f, "{}: line {}: {}", self.code(), line, reason),
            RecordError::Io { path, source } => {
                write!(f, "{}: {}: {}", self.code(), path.display(), source)
            }
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub element_id: ElementId,
    pub field_id: FieldId,
}

impl RecordKey {
    pub fn new(element_id: ElementId, field_id: FieldId) -> Self {
        Self {
            element_id,
            field_id,
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.element_id, self.field_id)
    }
}

/// Digests of every non-empty protected field, keyed by element and field.
///
/// A record is never patched: it is built in full from a document or parsed in full
/// from its sidecar text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundTruthRecord {
    entries: BTreeMap<RecordKey, Digest>,
}

impl GroundTruthRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<D: Document + ?Sized>(document: &D) -> Self {
        let mut entries = BTreeMap::new();

        for element_id in document.element_ids() {
            let Some(fields) = document.protected_fields(element_id) else {
                continue;
            };

            for field in fields {
                let Some(digest) = canonical::canonicalize(&field.value).digest() else {
                    continue;
                };
                let reference = field.reference(element_id);
                tracing::debug!(
                    element_id = %reference.element_id,
                    field_id = %reference.field_id,
                    storage_kind = reference.storage_kind.as_str(),
                    digest = %digest,
                    "captured ground truth entry"
                );
                entries.insert(RecordKey::new(reference.element_id, reference.field_id), digest);
            }
        }

        Self { entries }
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Digest> {
        self.entries.get(key)
    }

    pub fn digest_for(&self, element_id: ElementId, field_id: FieldId) -> Option<&Digest> {
        self.entries.get(&RecordKey::new(element_id, field_id))
    }

    pub fn contains_key(&self, key: &RecordKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&RecordKey, &Digest)> {
        self.entries.iter()
    }

    pub fn element_ids(&self) -> BTreeSet<ElementId> {
        self.entries.keys().map(|key| key.element_id).collect()
    }

    /// One `"<element_id> <field_id> <digest>\r\n"` line per entry, in key order.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.entries.len() * 112);
        for (key, digest) in &self.entries {
            out.push_str(&format!(
                "{} {} {}\r\n",
                key.element_id, key.field_id, digest
            ));
        }
        out
    }

    /// Parses sidecar text. Any malformed line fails the whole record; blank lines
    /// carry no entry and are ignored.
    pub fn deserialize(text: &str) -> Result<Self, RecordError> {
        let mut entries = BTreeMap::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if raw_line.trim().is_empty() {
                continue;
            }

            let mut tokens = raw_line.split_whitespace();
            let (Some(element_raw), Some(field_raw), Some(digest_raw), None) =
                (tokens.next(), tokens.next(), tokens.next(), tokens.next())
            else {
                return Err(RecordError::corrupt(
                    line_no,
                    "expected `<element_id> <field_id> <digest>`",
                ));
            };

            let element_id = element_raw
                .parse::<ElementId>()
                .map_err(|err| RecordError::corrupt(line_no, err.to_string()))?;
            let field_id = field_raw
                .parse::<FieldId>()
                .map_err(|err| RecordError::corrupt(line_no, err.to_string()))?;
            let digest = Digest::parse(digest_raw).ok_or_else(|| {
                RecordError::corrupt(
                    line_no,
                    format!("`{}` is not a lowercase sha256 hex digest", digest_raw),
                )
            })?;

            let key = RecordKey::new(element_id, field_id);
            if entries.insert(key, digest).is_some() {
                return Err(RecordError::corrupt(
                    line_no,
                    format!("duplicate entry for {}", key),
                ));
            }
        }

        Ok(Self { entries })
    }
}

impl FromIterator<(RecordKey, Digest)> for GroundTruthRecord {
    fn from_iter<T: IntoIterator<Item = (RecordKey, Digest)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
