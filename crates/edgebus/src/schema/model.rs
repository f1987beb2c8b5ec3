// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON data-model schemas.
//!
//! A model file looks like:
//!
//! ```json
//! {
//!   "name": "Robot",
//!   "version": "0.0.1",
//!   "fields": [
//!     { "name": "temperature", "kind": "number", "required": true },
//!     { "name": "label", "kind": "string" }
//!   ]
//! }
//! ```
//!
//! The representation id is `"{name}_{version}"`. Objects must be JSON objects
//! whose members are declared fields of the right kind, with every required
//! field present. Wire bytes are `{"model": <id>, "data": <object>}`.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DataObject, Representation, RepresentationLoader, SchemaError};

/// JSON kind of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Bool,
    Object,
    Array,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// One declared field of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    name: String,
    version: String,
    #[serde(default)]
    fields: Vec<FieldSpec>,
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    model: &'a str,
    data: &'a DataObject,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    model: String,
    data: DataObject,
}

/// Representation backed by a JSON data-model description.
#[derive(Debug, Clone)]
pub struct ModelRepresentation {
    id: String,
    fields: Vec<FieldSpec>,
}

impl ModelRepresentation {
    pub fn new(
        name: &str,
        version: &str,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, SchemaError> {
        if name.is_empty() || version.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "name and version must not be empty".to_string(),
            ));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(SchemaError::InvalidSchema(format!(
                    "field #{} has an empty name",
                    i
                )));
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::InvalidSchema(format!(
                    "duplicate field '{}'",
                    field.name
                )));
            }
        }
        Ok(Self {
            id: format!("{}_{}", name, version),
            fields,
        })
    }

    /// Parse a model description from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let file: ModelFile =
            serde_json::from_str(text).map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Self::new(&file.name, &file.version, file.fields)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn validate(&self, object: &DataObject) -> Result<(), SchemaError> {
        let members = object
            .as_object()
            .ok_or_else(|| SchemaError::Mismatch("data must be a JSON object".to_string()))?;

        for (key, value) in members {
            let field = self
                .fields
                .iter()
                .find(|f| f.name == *key)
                .ok_or_else(|| SchemaError::Mismatch(format!("undeclared field '{}'", key)))?;
            if !field.kind.matches(value) {
                return Err(SchemaError::Mismatch(format!(
                    "field '{}' is not of kind {:?}",
                    key, field.kind
                )));
            }
        }
        if let Some(missing) = self
            .fields
            .iter()
            .find(|f| f.required && !members.contains_key(&f.name))
        {
            return Err(SchemaError::Mismatch(format!(
                "missing required field '{}'",
                missing.name
            )));
        }
        Ok(())
    }
}

impl Representation for ModelRepresentation {
    fn id(&self) -> &str {
        &self.id
    }

    fn encode(&self, object: &DataObject) -> Result<Vec<u8>, SchemaError> {
        self.validate(object)?;
        serde_json::to_vec(&EnvelopeOut {
            model: &self.id,
            data: object,
        })
        .map_err(|e| SchemaError::Mismatch(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<DataObject, SchemaError> {
        let envelope: EnvelopeIn =
            serde_json::from_slice(bytes).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        if envelope.model != self.id {
            return Err(SchemaError::Malformed(format!(
                "payload model '{}' does not match '{}'",
                envelope.model, self.id
            )));
        }
        self.validate(&envelope.data)
            .map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Ok(envelope.data)
    }

    fn to_text(&self, object: &DataObject) -> Result<String, SchemaError> {
        self.validate(object)?;
        serde_json::to_string_pretty(object).map_err(|e| SchemaError::Mismatch(e.to_string()))
    }
}

/// Loads [`ModelRepresentation`]s from model files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelLoader;

impl RepresentationLoader for ModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Representation>, SchemaError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Io(format!("{}: {}", path.display(), e)))?;
        let model = ModelRepresentation::from_json(&text)?;
        log::debug!("[SCHEMA] Loaded model {} from {}", model.id, path.display());
        Ok(Arc::new(model))
    }
}
