//! Error types for the schema algebra

use thiserror::Error;

use crate::name::Name;
use crate::schema::{Field, Schema};
use crate::version::WireVersion;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema algebra errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid recursive structure around {name}: {reason}")]
    InvalidRecursiveStructure { name: Name, reason: &'static str },

    #[error("Field conflict: {left_field} in {left} vs {right_field} in {right}")]
    FieldConflict {
        left_field: Field,
        right_field: Field,
        left: Schema,
        right: Schema,
    },

    #[error("Types conflict: {left} vs {right}")]
    TypesConflict { left: Schema, right: Schema },

    #[error("Unresolved recursive name: {0}")]
    UnresolvedRecursiveName(Name),

    #[error("Unbound name: {0}")]
    UnboundName(Name),

    #[error("Unsupported tuple arity {arity}: {node}")]
    UnsupportedArity { arity: usize, node: Schema },

    #[error("Cannot downgrade to {version}: {reason}")]
    NotDowngradable { version: WireVersion, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn types_conflict(left: &Schema, right: &Schema) -> Self {
        SchemaError::TypesConflict {
            left: left.clone(),
            right: right.clone(),
        }
    }

    pub(crate) fn dangling(name: Name) -> Self {
        SchemaError::InvalidRecursiveStructure {
            name,
            reason: "back-reference has no binding",
        }
    }
}
