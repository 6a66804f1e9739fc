use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Document, ElementId, FieldId, FieldValue, ProtectedField};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InMemoryField {
    pub field_id: FieldId,
    /// Only shared fields are protected.
    #[serde(default)]
    pub shared: bool,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InMemoryElement {
    pub id: ElementId,
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<InMemoryField>,
}

impl InMemoryElement {
    pub fn new(id: ElementId, type_name: &str, name: &str) -> Self {
        Self {
            id,
            type_name: type_name.to_string(),
            category: None,
            family: None,
            symbol: None,
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Replaces any field with the same id.
    pub fn with_field(mut self, field_id: FieldId, shared: bool, value: FieldValue) -> Self {
        self.fields.retain(|f| f.field_id != field_id);
        self.fields.push(InMemoryField {
            field_id,
            shared,
            value,
        });
        self
    }

    /// `"<type> <category> <family> <symbol> <<id> <name>>"`, skipping parts that do not
    /// apply and the symbol when it repeats the element name.
    pub fn description(&self) -> String {
        let category = self
            .category
            .as_deref()
            .map(|c| format!("{} ", c))
            .unwrap_or_default();
        let family = self
            .family
            .as_deref()
            .map(|f| format!("{} ", f))
            .unwrap_or_default();
        let symbol = self
            .symbol
            .as_deref()
            .filter(|s| *s != self.name)
            .map(|s| format!("{} ", s))
            .unwrap_or_default();

        format!(
            "{} {}{}{}<{} {}>",
            self.type_name, category, family, symbol, self.id, self.name
        )
    }
}

/// A JSON-backed document, used as the host model by the CLI and in tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InMemoryDocument {
    #[serde(skip)]
    path: PathBuf,
    #[serde(default)]
    elements: Vec<InMemoryElement>,
}

impl InMemoryDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            elements: Vec::new(),
        }
    }

    pub fn from_json_file(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let mut document = serde_json::from_slice::<InMemoryDocument>(&bytes).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to parse {}: {}", path.display(), err),
            )
        })?;
        document.check_unique_ids().map_err(|reason| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to parse {}: {}", path.display(), reason),
            )
        })?;
        document.path = path.to_path_buf();
        Ok(document)
    }

    /// Element ids are unique per document and field ids unique per element.
    fn check_unique_ids(&self) -> Result<(), String> {
        let mut element_ids = BTreeSet::new();
        for element in &self.elements {
            if !element_ids.insert(element.id) {
                return Err(format!("duplicate element id {}", element.id));
            }

            let mut field_ids = BTreeSet::new();
            for field in &element.fields {
                if !field_ids.insert(field.field_id) {
                    return Err(format!(
                        "duplicate field id {} on element {}",
                        field.field_id, element.id
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn write_json_file(&self) -> io::Result<()> {
        let payload = serde_json::to_vec_pretty(self).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize {}: {}", self.path.display(), err),
            )
        })?;
        fs::write(&self.path, payload)
    }

    /// Replaces any element with the same id.
    pub fn insert_element(&mut self, element: InMemoryElement) {
        self.elements.retain(|e| e.id != element.id);
        self.elements.push(element);
    }

    pub fn remove_element(&mut self, element_id: ElementId) -> Option<InMemoryElement> {
        let idx = self.elements.iter().position(|e| e.id == element_id)?;
        Some(self.elements.remove(idx))
    }

    pub fn element(&self, element_id: ElementId) -> Option<&InMemoryElement> {
        self.elements.iter().find(|e| e.id == element_id)
    }

    pub fn field(&self, element_id: ElementId, field_id: FieldId) -> Option<&InMemoryField> {
        self.element(element_id)?
            .fields
            .iter()
            .find(|f| f.field_id == field_id)
    }

    pub fn field_value(&self, element_id: ElementId, field_id: FieldId) -> Option<&FieldValue> {
        self.field(element_id, field_id).map(|f| &f.value)
    }

    /// Writes the value without any integrity check. Returns `false` when the field does
    /// not exist.
    pub fn commit_field(&mut self, element_id: ElementId, field_id: FieldId, value: FieldValue) -> bool {
        let Some(field) = self
            .elements
            .iter_mut()
            .find(|e| e.id == element_id)
            .and_then(|e| e.fields.iter_mut().find(|f| f.field_id == field_id))
        else {
            return false;
        };
        field.value = value;
        true
    }
}

impl Document for InMemoryDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn element_ids(&self) -> Vec<ElementId> {
        self.elements.iter().map(|e| e.id).collect()
    }

    fn protected_fields(&self, element_id: ElementId) -> Option<Vec<ProtectedField>> {
        let element = self.element(element_id)?;
        Some(
            element
                .fields
                .iter()
                .filter(|f| f.shared)
                .map(|f| ProtectedField {
                    field_id: f.field_id,
                    value: f.value.clone(),
                })
                .collect(),
        )
    }

    fn describe(&self, element_id: ElementId) -> Option<String> {
        self.element(element_id).map(InMemoryElement::description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: FieldId = FieldId::from_u128(0x0b1d_0000_0000_4000_8000_0000_0000_0001);
    const NOTE: FieldId = FieldId::from_u128(0x0b1d_0000_0000_4000_8000_0000_0000_0002);

    #[test]
    fn protected_fields_hide_unshared_values() {
        let mut doc = InMemoryDocument::new("model.rte");
        doc.insert_element(
            InMemoryElement::new(ElementId(1), "WallType", "Generic - 200mm")
                .with_field(WIDTH, true, FieldValue::Number(200.0))
                .with_field(NOTE, false, FieldValue::Text("scratch".to_string())),
        );

        let fields = doc
            .protected_fields(ElementId(1))
            .expect("element should resolve");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_id, WIDTH);
        assert!(doc.protected_fields(ElementId(2)).is_none());
    }

    #[test]
    fn description_skips_symbol_equal_to_name() {
        let mut element = InMemoryElement::new(ElementId(311), "FamilyInstance", "Door 1");
        element.category = Some("Doors".to_string());
        element.family = Some("Single-Flush".to_string());
        element.symbol = Some("Door 1".to_string());
        assert_eq!(
            element.description(),
            "FamilyInstance Doors Single-Flush <311 Door 1>"
        );

        element.symbol = Some("0915 x 2134mm".to_string());
        assert_eq!(
            element.description(),
            "FamilyInstance Doors Single-Flush 0915 x 2134mm <311 Door 1>"
        );
    }

    #[test]
    fn commit_field_reports_missing_fields() {
        let mut doc = InMemoryDocument::new("model.rte");
        doc.insert_element(
            InMemoryElement::new(ElementId(1), "WallType", "W")
                .with_field(WIDTH, true, FieldValue::Number(200.0)),
        );
        assert!(doc.commit_field(ElementId(1), WIDTH, FieldValue::Number(250.0)));
        assert_eq!(
            doc.field_value(ElementId(1), WIDTH),
            Some(&FieldValue::Number(250.0))
        );
        assert!(!doc.commit_field(ElementId(1), NOTE, FieldValue::None));
    }

    #[test]
    fn json_document_parses_elements_and_defaults_shared_to_false() {
        let raw = serde_json::json!({
            "elements": [{
                "id": 5,
                "type_name": "WallType",
                "name": "Exterior",
                "fields": [
                    { "field_id": WIDTH.to_string(), "shared": true, "value": { "kind": "integer", "value": 3 } },
                    { "field_id": NOTE.to_string(), "value": { "kind": "text", "value": "n" } }
                ]
            }]
        });
        let doc: InMemoryDocument = serde_json::from_value(raw).expect("document should parse");
        let element = doc.element(ElementId(5)).expect("element exists");
        assert!(element.fields[0].shared);
        assert!(!element.fields[1].shared);
    }

    fn write_temp_json(value: serde_json::Value) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lock3r-document-test-{}", ulid::Ulid::new()));
        fs::create_dir_all(&dir).expect("temp dir should be created");
        let path = dir.join("doc.json");
        fs::write(&path, serde_json::to_vec(&value).expect("json serializes"))
            .expect("document should be written");
        path
    }

    fn field_json(field_id: FieldId, value: &str) -> serde_json::Value {
        serde_json::json!({
            "field_id": field_id.to_string(),
            "shared": true,
            "value": { "kind": "text", "value": value }
        })
    }

    #[test]
    fn json_document_rejects_repeated_field_id_on_one_element() {
        let path = write_temp_json(serde_json::json!({
            "elements": [{
                "id": 1,
                "type_name": "WallType",
                "name": "W",
                "fields": [field_json(WIDTH, "100"), field_json(WIDTH, "100")]
            }]
        }));

        let err = InMemoryDocument::from_json_file(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("duplicate field id"));

        let _ = fs::remove_dir_all(path.parent().expect("temp dir"));
    }

    #[test]
    fn json_document_rejects_repeated_element_id() {
        let element = serde_json::json!({
            "id": 1,
            "type_name": "WallType",
            "name": "W",
            "fields": [field_json(WIDTH, "100")]
        });
        let path = write_temp_json(serde_json::json!({ "elements": [element.clone(), element] }));

        let err = InMemoryDocument::from_json_file(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("duplicate element id 1"));

        let _ = fs::remove_dir_all(path.parent().expect("temp dir"));
    }

    #[test]
    fn with_field_replaces_same_field_id() {
        let element = InMemoryElement::new(ElementId(1), "WallType", "W")
            .with_field(WIDTH, true, FieldValue::Number(200.0))
            .with_field(WIDTH, true, FieldValue::Number(250.0));
        assert_eq!(element.fields.len(), 1);
        assert_eq!(element.fields[0].value, FieldValue::Number(250.0));
    }
}
