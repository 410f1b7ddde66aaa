//! Structural schema model.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Primitive type tag of a schema position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
    Mixed,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Mixed => "mixed",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of one schema position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaKind {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array {
        items: Box<FieldSchema>,
    },
    Object {
        fields: IndexMap<String, FieldSchema>,
    },
    /// Conflicting types were observed. Terminal: no further structure.
    Mixed,
    /// Element placeholder of an array that was only ever seen empty.
    Unknown,
}

/// Structural description of one observed field or value position.
///
/// Values are never mutated once built; folding in a new sample goes
/// through [`crate::unify`] and yields a fresh schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Observed null (or, for object fields, observed absent).
    #[serde(default)]
    pub nullable: bool,

    #[serde(flatten)]
    pub kind: SchemaKind,
}

impl FieldSchema {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            nullable: false,
            kind,
        }
    }

    pub fn null() -> Self {
        Self {
            nullable: true,
            kind: SchemaKind::Null,
        }
    }

    pub fn unknown() -> Self {
        Self::new(SchemaKind::Unknown)
    }

    pub fn mixed(nullable: bool) -> Self {
        Self {
            nullable,
            kind: SchemaKind::Mixed,
        }
    }

    pub fn array(items: FieldSchema) -> Self {
        Self::new(SchemaKind::Array {
            items: Box::new(items),
        })
    }

    pub fn object(fields: IndexMap<String, FieldSchema>) -> Self {
        Self::new(SchemaKind::Object { fields })
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Type tag of this position. The empty-array placeholder reports `null`.
    pub fn type_tag(&self) -> TypeTag {
        match &self.kind {
            SchemaKind::Null | SchemaKind::Unknown => TypeTag::Null,
            SchemaKind::Boolean => TypeTag::Boolean,
            SchemaKind::Integer => TypeTag::Integer,
            SchemaKind::Float => TypeTag::Float,
            SchemaKind::String => TypeTag::String,
            SchemaKind::Array { .. } => TypeTag::Array,
            SchemaKind::Object { .. } => TypeTag::Object,
            SchemaKind::Mixed => TypeTag::Mixed,
        }
    }

    /// True for the "no samples yet" element placeholder.
    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, SchemaKind::Unknown)
    }

    /// Object children, if this is an object.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldSchema>> {
        match &self.kind {
            SchemaKind::Object { fields } => Some(fields),
            _ => None,
        }
    }

    /// Array element schema, if this is an array.
    pub fn items(&self) -> Option<&FieldSchema> {
        match &self.kind {
            SchemaKind::Array { items } => Some(items),
            _ => None,
        }
    }

    /// Number of direct children (object fields); 0 for everything else.
    pub fn field_count(&self) -> usize {
        self.fields().map(IndexMap::len).unwrap_or(0)
    }
}
