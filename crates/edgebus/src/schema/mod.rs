// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema representations: convert data objects to and from wire bytes.
//!
//! A [`Representation`] is loaded from a schema file by a
//! [`RepresentationLoader`] and cached by the context under its id. Publishers
//! encode with the representation named by their topic's data model;
//! subscribers decode with the representation cached for each topic.

mod model;

pub use model::{FieldKind, FieldSpec, ModelLoader, ModelRepresentation};

use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Structured value carried on a topic.
pub type DataObject = serde_json::Value;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by representations and loaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Schema file could not be read.
    Io(String),
    /// Schema file content is not a valid schema.
    InvalidSchema(String),
    /// Object does not conform to the schema.
    Mismatch(String),
    /// Payload bytes are not a valid message for this schema.
    Malformed(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "schema I/O error: {}", msg),
            Self::InvalidSchema(msg) => write!(f, "invalid schema: {}", msg),
            Self::Mismatch(msg) => write!(f, "schema mismatch: {}", msg),
            Self::Malformed(msg) => write!(f, "malformed payload: {}", msg),
        }
    }
}

impl std::error::Error for SchemaError {}

// ============================================================================
// Traits
// ============================================================================

/// Encoder/decoder for one schema.
pub trait Representation: Send + Sync {
    /// Stable schema id used as the topic data model.
    fn id(&self) -> &str;

    /// Serialize a data object to wire bytes.
    fn encode(&self, object: &DataObject) -> Result<Vec<u8>, SchemaError>;

    /// Parse wire bytes into a data object.
    fn decode(&self, bytes: &[u8]) -> Result<DataObject, SchemaError>;

    /// Render a data object as human-readable text.
    fn to_text(&self, object: &DataObject) -> Result<String, SchemaError>;
}

/// Loads representations from schema files.
pub trait RepresentationLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Representation>, SchemaError>;
}
