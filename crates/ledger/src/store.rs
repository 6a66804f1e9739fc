use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ulid::Ulid;

use crate::{GroundTruthRecord, RecordError};

pub const DEFAULT_RECORD_EXTENSION: &str = "lock3r";

/// The document path with its extension replaced by the record extension.
pub fn sidecar_path(document_path: &Path, extension: &str) -> PathBuf {
    document_path.with_extension(extension)
}

/// Sidecar files stored next to the documents they protect.
#[derive(Debug, Clone)]
pub struct RecordStore {
    extension: String,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_EXTENSION)
    }
}

impl RecordStore {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn sidecar_path(&self, document_path: &Path) -> PathBuf {
        sidecar_path(document_path, &self.extension)
    }

    pub fn exists(&self, document_path: &Path) -> bool {
        self.sidecar_path(document_path).is_file()
    }

    pub fn load(&self, document_path: &Path) -> Result<GroundTruthRecord, RecordError> {
        let path = self.resolve(document_path)?;

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(RecordError::NotFound { path });
            }
            Err(source) => return Err(RecordError::Io { path, source }),
        };

        let text = String::from_utf8(bytes).map_err(|err| {
            let valid = &err.as_bytes()[..err.utf8_error().valid_up_to()];
            let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
            RecordError::Corrupt {
                path: Some(path.clone()),
                line,
                reason: "record is not valid utf-8".to_string(),
            }
        })?;

        let record = GroundTruthRecord::deserialize(&text).map_err(|err| err.at_path(&path))?;
        tracing::debug!(path = %path.display(), entries = record.len(), "loaded ground truth record");
        Ok(record)
    }

    /// Replaces the sidecar atomically and returns its path.
    pub fn save(
        &self,
        record: &GroundTruthRecord,
        document_path: &Path,
    ) -> Result<PathBuf, RecordError> {
        let path = self.resolve(document_path)?;
        write_atomic(&path, record.serialize().as_bytes()).map_err(|source| RecordError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), entries = record.len(), "saved ground truth record");
        Ok(path)
    }

    fn resolve(&self, document_path: &Path) -> Result<PathBuf, RecordError> {
        let path = self.sidecar_path(document_path);
        if path == document_path {
            return Err(RecordError::Io {
                path,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "document already carries the record extension",
                ),
            });
        }
        Ok(path)
    }
}

fn write_atomic(path: &Path, payload: &[u8]) -> io::Result<()> {
    let temp_name = format!(
        "{}.tmp-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("tmp"),
        Ulid::new()
    );
    let temp_path = path.with_file_name(temp_name);
    fs::write(&temp_path, payload)?;
    if fs::rename(&temp_path, path).is_err() {
        let _ = fs::remove_file(path);
        if let Err(err) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_replaces_document_extension() {
        assert_eq!(
            sidecar_path(Path::new("/models/tower.rte"), "lock3r"),
            PathBuf::from("/models/tower.lock3r")
        );
        assert_eq!(
            sidecar_path(Path::new("/models/tower"), "lock3r"),
            PathBuf::from("/models/tower.lock3r")
        );
        assert_eq!(
            sidecar_path(Path::new("relative/a.b.json"), "gt"),
            PathBuf::from("relative/a.b.gt")
        );
    }

    #[test]
    fn store_refuses_to_overwrite_the_document_itself() {
        let store = RecordStore::default();
        let err = store
            .save(&GroundTruthRecord::new(), Path::new("x.lock3r"))
            .unwrap_err();
        assert_eq!(err.code(), "ERR_RECORD_IO");
    }
}
