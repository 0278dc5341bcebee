//! Shape Schemas
//!
//! A structural description of algebraic data shapes, independent of any
//! in-memory encoding, with the algorithms needed to evolve them: two
//! independently built programs can decide at runtime whether values written
//! under one schema can be read under another.
//!
//! ## Features
//!
//! - **Schema Tree**: atoms, wrappers, tuples, records and variants, with named
//!   nodes for recursion and sharing
//! - **Reduction**: hash-consing of identical records and variants
//! - **Equivalence**: coinductive comparison up to renaming
//! - **Diff**: ordered structural changes with compatibility classification
//! - **Merge**: least upper bound of two schema versions
//! - **Wire Encoding**: versions `v0` to `v5` of the schema encoding itself
//! - **Fingerprints**: SHA256 checksums of a schema's structure
//!
//! ## Example
//!
//! ```
//! use shape_schemas::{diff, is_read_compatible, Schema};
//!
//! let old = Schema::record([("foo", Schema::int())]);
//! let new = Schema::record([("foo", Schema::int()), ("bar", Schema::float())]);
//!
//! let changes = diff(&old, &new).unwrap();
//! assert_eq!(changes[0].to_string(), "<root>: added field bar@1: float");
//! assert!(!is_read_compatible(&old, &new).unwrap());
//! ```

pub mod checksum;
pub mod compatibility;
pub mod config;
pub mod derive;
pub mod diff;
pub mod equivalence;
pub mod error;
pub mod merge;
pub mod name;
pub mod named;
pub mod reduce;
pub mod runtime;
pub mod schema;
pub mod traverse;
pub mod version;
pub mod versioned;

pub use checksum::Checksum;
pub use compatibility::{CompatibilityChecker, CompatibilityResult};
pub use derive::{derive, HasSchema};
pub use diff::{breaking_changes, diff, is_read_compatible, Diff, DiffAtom};
pub use equivalence::equivalent;
pub use error::{Result, SchemaError};
pub use merge::merge;
pub use name::Name;
pub use named::{alpha_convert, contains_named, remove_dead_links, standalone, Bindings};
pub use reduce::reduce;
pub use runtime::{materialize, TypeHandle};
pub use schema::{Field, Schema, Shape, VariantCase, VariantKind};
pub use version::WireVersion;
pub use versioned::{change_version, serialize, unserialize, Versioned};
