//! Content fingerprints of schemas

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::name::Name;
use crate::reduce::reduce;
use crate::schema::{Schema, Shape};
use crate::traverse::{iterate, transform};

/// SHA256 checksum of a schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Fingerprint of a schema's structure.
    ///
    /// The schema is reduced and its identifiers renumbered in pre-order, so
    /// the fingerprint only depends on the shape, not on which names a
    /// process happened to mint or how much sharing the input had.
    pub fn of_schema(schema: &Schema) -> Result<Self> {
        let canonical = canonical_names(&reduce(schema));
        let json = serde_json::to_vec(&canonical)?;
        Ok(Self::from_bytes(&json))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that a schema matches this checksum
    pub fn verify_schema(&self, schema: &Schema) -> Result<bool> {
        Ok(Self::of_schema(schema)? == *self)
    }
}

/// Renumber identifiers 0, 1, 2... in order of first occurrence
fn canonical_names(schema: &Schema) -> Schema {
    fn number(node: &Schema, renaming: &mut HashMap<Name, Name>) {
        if let Shape::Named(name, _) = node.shape() {
            let next = Name::new(renaming.len() as u64);
            renaming.entry(*name).or_insert(next);
        }
        iterate(node, |child| number(child, renaming));
    }
    let mut renaming = HashMap::new();
    number(schema, &mut renaming);
    if renaming.is_empty() {
        return schema.clone();
    }
    transform(schema, &mut |n| match n.shape() {
        Shape::Named(name, content) => match renaming.get(name) {
            Some(canonical) => Schema::new(Shape::Named(*canonical, content.clone())),
            None => n,
        },
        _ => n,
    })
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Checksum {
    fn from(s: &str) -> Self {
        Self(s.trim().to_lowercase())
    }
}
