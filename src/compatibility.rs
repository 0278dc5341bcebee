//! Schema compatibility checking
//!
//! Turns a structural diff into a report of which changes break readers of
//! the old schema.

use serde::{Deserialize, Serialize};

use crate::diff::{diff, Diff, DiffAtom};
use crate::error::Result;
use crate::schema::Schema;

/// Reader-side verdict on a schema change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// Whether values of the old schema can be read under the new one
    pub is_compatible: bool,
    /// Whether any change stops old values from being read
    pub is_breaking: bool,
    /// Changes that keep old values readable, such as appended cases
    pub safe_additions: usize,
    /// Every structural change, in diff order
    pub changes: Vec<SchemaChange>,
    /// One-line verdict for terminal output
    pub summary: String,
}

impl CompatibilityResult {
    fn from_changes(changes: Vec<SchemaChange>, strict: bool) -> Self {
        let safe_additions = changes.iter().filter(|c| c.is_safe_addition()).count();
        let breaking = changes.iter().filter(|c| c.is_breaking).count();
        let summary = match (breaking, safe_additions) {
            (0, 0) => "Schemas are structurally identical".to_string(),
            (0, safe) => format!("Old values stay readable: {}", case_additions(safe)),
            (breaking, _) if strict => {
                format!("Strict mode rejects {} of {} changes", breaking, changes.len())
            }
            (breaking, 0) => format!("{} of {} changes break old readers", breaking, changes.len()),
            (breaking, safe) => format!(
                "{} of {} changes break old readers, besides {}",
                breaking,
                changes.len(),
                case_additions(safe)
            ),
        };
        Self {
            is_compatible: breaking == 0,
            is_breaking: breaking > 0,
            safe_additions,
            changes,
            summary,
        }
    }

    pub fn breaking(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter().filter(|c| c.is_breaking)
    }
}

fn case_additions(count: usize) -> String {
    if count == 1 {
        "1 safe case addition".to_string()
    } else {
        format!("{} safe case additions", count)
    }
}

/// A detected change between schema versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaChange {
    /// Type of change
    pub change_type: ChangeType,
    /// Path to the changed element (e.g., "tags.list.f1")
    pub path: String,
    /// Old value (if applicable)
    pub old_value: Option<String>,
    /// New value (if applicable)
    pub new_value: Option<String>,
    /// Whether this change is breaking
    pub is_breaking: bool,
    /// Human-readable description
    pub description: String,
}

/// Type of schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// A node changed kind or arity
    TypeChanged,
    /// A new field was added
    FieldAdded,
    /// A field was removed
    FieldRemoved,
    /// A field was renamed or moved
    FieldChanged,
    /// A variant case was added
    CaseAdded,
    /// A variant case was removed
    CaseRemoved,
    /// A case was renamed, moved or retagged
    CaseChanged,
}

impl SchemaChange {
    fn from_diff(d: &Diff, strict: bool) -> Self {
        let (change_type, old_value, new_value) = match &d.atom {
            DiffAtom::Update { old, new } => {
                (ChangeType::TypeChanged, Some(old.to_string()), Some(new.to_string()))
            }
            DiffAtom::AddField { field, schema } => {
                (ChangeType::FieldAdded, None, Some(format!("{}: {}", field, schema)))
            }
            DiffAtom::RemoveField { field, schema } => {
                (ChangeType::FieldRemoved, Some(format!("{}: {}", field, schema)), None)
            }
            DiffAtom::UpdateField { old, new } => {
                (ChangeType::FieldChanged, Some(old.to_string()), Some(new.to_string()))
            }
            DiffAtom::AddVariant { case, .. } => (ChangeType::CaseAdded, None, Some(case.to_string())),
            DiffAtom::RemoveVariant { case, .. } => {
                (ChangeType::CaseRemoved, Some(case.to_string()), None)
            }
            DiffAtom::UpdateVariant { old, new } => {
                (ChangeType::CaseChanged, Some(old.to_string()), Some(new.to_string()))
            }
        };
        Self {
            change_type,
            path: d.path_string(),
            old_value,
            new_value,
            is_breaking: strict || !d.atom.is_safe_addition(),
            description: d.atom.to_string(),
        }
    }

    /// A case added without breaking old readers
    pub fn is_safe_addition(&self) -> bool {
        self.change_type == ChangeType::CaseAdded && !self.is_breaking
    }
}

/// Compatibility checker for schema versions
#[derive(Debug, Clone, Default)]
pub struct CompatibilityChecker {
    /// Strict mode - any change is considered breaking
    strict_mode: bool,
}

impl CompatibilityChecker {
    /// Create a new compatibility checker
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// Enable strict mode
    pub fn strict(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Check whether values written under `old` can be read under `new`
    pub fn check(&self, old: &Schema, new: &Schema) -> Result<CompatibilityResult> {
        let changes = diff(old, new)?
            .iter()
            .map(|d| SchemaChange::from_diff(d, self.strict_mode))
            .collect();
        Ok(CompatibilityResult::from_changes(changes, self.strict_mode))
    }
}
