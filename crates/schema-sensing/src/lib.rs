//! Schema Sensing - structural schema inference for JSON responses.
//!
//! Derives a schema from any JSON value, merges schemas observed for the
//! same position, and reduces a schema to a stable fingerprint so two
//! observations can be compared cheaply.
//!
//! # Features
//!
//! - **Inference**: total over all JSON values, including empty containers
//! - **Unification**: arrays of heterogeneous elements fold into one schema
//! - **Fingerprinting**: key-order independent SHA-256 digests
//! - **Description**: dotted field paths and truncated value previews
//! - **JSON Schema export**: converts inferred schemas to JSON Schema
//!
//! # Example
//!
//! ```
//! use schema_sensing::{compute_fingerprint, describe, infer};
//! use serde_json::json;
//!
//! let schema = infer(&json!({"id": "u1", "level": 5}));
//! let same = infer(&json!({"level": 7, "id": "u2"}));
//!
//! assert_eq!(compute_fingerprint(&schema), compute_fingerprint(&same));
//! assert!(describe(&schema).contains("level: integer"));
//! ```

mod describe;
mod fingerprint;
mod infer;
mod json_schema;
mod schema;

pub use describe::{FieldPath, describe, field_paths, summarize_value};
pub use fingerprint::compute_fingerprint;
pub use infer::{infer, unify};
pub use json_schema::{JsonSchema, JsonSchemaType, to_json_schema};
pub use schema::{FieldSchema, SchemaKind, TypeTag};
