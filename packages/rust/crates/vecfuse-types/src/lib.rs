//! vecfuse-types - Data model for the vecfuse collection adapter
//!
//! Transient value types passed between the caller, the modality adapter and
//! the fusion engine. Nothing here is persisted; the backend store owns all
//! durable state.
//!
//! # Schema Registry
//! Types derive `schemars::JsonSchema` so that consumers (CLI, bindings, LLM
//! tooling) can retrieve the authoritative shapes with [`get_schema_json`].

#![allow(clippy::doc_markdown)]

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flat metadata mapping as stored by the backend.
pub type Metadata = serde_json::Map<String, Value>;

/// Reserved metadata key: path of the source file relative to the indexed root.
pub const RELATIVE_PATH_KEY: &str = "relativePath";
/// Reserved metadata key: first line of the chunk (1-based).
pub const START_LINE_KEY: &str = "startLine";
/// Reserved metadata key: last line of the chunk (inclusive).
pub const END_LINE_KEY: &str = "endLine";
/// Reserved metadata key: file extension including the leading dot.
pub const FILE_EXTENSION_KEY: &str = "fileExtension";

/// Keys promoted out of the flat metadata mapping into [`Document`] fields.
pub const RESERVED_METADATA_KEYS: [&str; 4] = [
    RELATIVE_PATH_KEY,
    START_LINE_KEY,
    END_LINE_KEY,
    FILE_EXTENSION_KEY,
];

/// Returns `true` when `key` is one of the four reserved metadata keys.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_METADATA_KEYS.contains(&key)
}

/// A code chunk stored in a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier within a collection
    pub id: String,
    /// Dense embedding; empty on documents read back from a search
    #[serde(default)]
    pub vector: Vec<f32>,
    /// Chunk text
    pub content: String,
    /// Source file path relative to the indexed root
    #[serde(default)]
    pub relative_path: String,
    /// First line of the chunk
    #[serde(default)]
    pub start_line: i64,
    /// Last line of the chunk
    #[serde(default)]
    pub end_line: i64,
    /// File extension (e.g. `.rs`)
    #[serde(default)]
    pub file_extension: String,
    /// Caller metadata that is not one of the reserved keys
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Build the flat mapping written to the backend.
    ///
    /// Reserved fields always win over residual keys that reuse a reserved
    /// name, so such keys do not survive a round trip.
    #[must_use]
    pub fn to_flat_metadata(&self) -> Metadata {
        let mut flat: Metadata = self
            .metadata
            .iter()
            .filter(|(k, _)| !is_reserved_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        flat.insert(
            RELATIVE_PATH_KEY.to_string(),
            Value::String(self.relative_path.clone()),
        );
        flat.insert(START_LINE_KEY.to_string(), Value::from(self.start_line));
        flat.insert(END_LINE_KEY.to_string(), Value::from(self.end_line));
        flat.insert(
            FILE_EXTENSION_KEY.to_string(),
            Value::String(self.file_extension.clone()),
        );
        flat
    }

    /// Split a flat backend mapping back into structural fields and residual metadata.
    ///
    /// Missing reserved keys fall back to empty strings / zero.
    #[must_use]
    pub fn from_flat_metadata(
        id: impl Into<String>,
        content: impl Into<String>,
        vector: Vec<f32>,
        mut flat: Metadata,
    ) -> Self {
        let relative_path = take_string(&mut flat, RELATIVE_PATH_KEY);
        let start_line = take_line(&mut flat, START_LINE_KEY);
        let end_line = take_line(&mut flat, END_LINE_KEY);
        let file_extension = take_string(&mut flat, FILE_EXTENSION_KEY);
        Self {
            id: id.into(),
            vector,
            content: content.into(),
            relative_path,
            start_line,
            end_line,
            file_extension,
            metadata: flat,
        }
    }
}

fn take_string(flat: &mut Metadata, key: &str) -> String {
    match flat.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

// Float line numbers truncate toward zero; `as` saturates out-of-range values and maps NaN to 0.
#[allow(clippy::cast_possible_truncation)]
fn take_line(flat: &mut Metadata, key: &str) -> i64 {
    match flat.remove(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

/// One search technique contributing a ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Dense-vector similarity
    Dense,
    /// Lexical / full-text similarity
    Lexical,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dense => f.write_str("dense"),
            Self::Lexical => f.write_str("lexical"),
        }
    }
}

/// Modality-specific payload of a [`SearchRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "modality", rename_all = "lowercase")]
pub enum ModalityQuery {
    /// Nearest-neighbour query by embedding
    Dense {
        /// Query embedding
        vector: Vec<f32>,
    },
    /// Backend-native text similarity query
    Lexical {
        /// Query text
        text: String,
    },
}

impl ModalityQuery {
    /// The modality this payload belongs to.
    #[must_use]
    pub const fn modality(&self) -> Modality {
        match self {
            Self::Dense { .. } => Modality::Dense,
            Self::Lexical { .. } => Modality::Lexical,
        }
    }
}

/// A single-modality search issued against one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Payload, tagged by modality
    #[serde(flatten)]
    pub query: ModalityQuery,
    /// Maximum number of hits requested from the backend
    pub limit: usize,
    /// Backend-specific parameters passed through unchanged
    #[serde(default)]
    pub extra_params: Metadata,
}

impl SearchRequest {
    /// Dense-vector request.
    #[must_use]
    pub fn dense(vector: Vec<f32>, limit: usize) -> Self {
        Self {
            query: ModalityQuery::Dense { vector },
            limit,
            extra_params: Metadata::new(),
        }
    }

    /// Lexical request.
    #[must_use]
    pub fn lexical(text: impl Into<String>, limit: usize) -> Self {
        Self {
            query: ModalityQuery::Lexical { text: text.into() },
            limit,
            extra_params: Metadata::new(),
        }
    }

    /// Attach a backend parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Modality of this request.
    #[must_use]
    pub const fn modality(&self) -> Modality {
        self.query.modality()
    }
}

/// What to do with a filter expression that does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FilterFallback {
    /// Fail the call with an invalid-filter error
    Reject,
    /// Search without any predicate
    IgnoreFilter,
    /// Substitute the configured default predicate
    #[default]
    UseDefault,
}

/// Options applied uniformly to every request of one fusion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FusionOptions {
    /// Maximum number of fused results
    pub limit: usize,
    /// Optional filter expression, e.g. `fileExtension in [".rs"]`
    #[serde(default)]
    pub filter_expression: Option<String>,
    /// Policy for unparseable filter expressions; `None` defers to the
    /// policy configured on the engine or client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_fallback: Option<FilterFallback>,
}

impl FusionOptions {
    /// Options with a limit and no filter.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            filter_expression: None,
            filter_fallback: None,
        }
    }

    /// Set the filter expression.
    #[must_use]
    pub fn with_filter(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    /// Override the fallback policy for unparseable filters.
    #[must_use]
    pub const fn with_fallback(mut self, fallback: FilterFallback) -> Self {
        self.filter_fallback = Some(fallback);
        self
    }
}

/// A document scored by a single modality, `score` in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoredResult {
    /// Matched document
    pub document: Document,
    /// Similarity derived from the backend distance
    pub score: f64,
}

/// A document after cross-modality fusion, `score` in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FusedResult {
    /// Matched document
    pub document: Document,
    /// Fused score
    pub score: f64,
}

// =============================================================================
// Schema Registry
// =============================================================================

/// Schema generation error
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Type name not present in the registry
    #[error("Unknown type: {0}")]
    UnknownType(String),
}

/// Get JSON Schema for a registered type.
///
/// # Errors
/// Returns `SchemaError::UnknownType` if the type name is not registered.
pub fn get_schema_json(type_name: &str) -> Result<String, SchemaError> {
    let schema = match type_name {
        "Document" => schemars::schema_for!(Document),
        "SearchRequest" => schemars::schema_for!(SearchRequest),
        "FusionOptions" => schemars::schema_for!(FusionOptions),
        "ScoredResult" => schemars::schema_for!(ScoredResult),
        "FusedResult" => schemars::schema_for!(FusedResult),
        _ => return Err(SchemaError::UnknownType(type_name.to_string())),
    };
    serde_json::to_string_pretty(&schema)
        .map_err(|e| SchemaError::UnknownType(format!("Serialization failed: {e}")))
}

/// Get list of all registered type names.
#[must_use]
pub fn get_registered_types() -> Vec<&'static str> {
    vec![
        "Document",
        "SearchRequest",
        "FusionOptions",
        "ScoredResult",
        "FusedResult",
    ]
}
