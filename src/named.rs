//! Named-node utilities
//!
//! Named nodes express recursion and sharing: `Named(id, Some(content))` binds
//! `id`, `Named(id, None)` refers back to that binding. These helpers find,
//! prune, rename and resolve them.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::name::Name;
use crate::schema::{Schema, Shape};
use crate::traverse::{any, iterate, transform, try_map_children};

/// Whether any named node, bound or not, occurs in `node`
pub fn contains_named(node: &Schema) -> bool {
    any(node, &mut |n| matches!(n.shape(), Shape::Named(..)))
}

/// Identifiers occurring as back-references
pub fn back_references(node: &Schema) -> HashSet<Name> {
    fn walk(node: &Schema, out: &mut HashSet<Name>) {
        if let Shape::Named(name, None) = node.shape() {
            out.insert(*name);
        }
        iterate(node, |child| walk(child, out));
    }
    let mut out = HashSet::new();
    walk(node, &mut out);
    out
}

/// Unwrap every binding that nothing refers back to
pub fn remove_dead_links(node: &Schema) -> Schema {
    if !contains_named(node) {
        return node.clone();
    }
    let referenced = back_references(node);
    transform(node, &mut |n| match n.shape() {
        Shape::Named(name, Some(content)) if !referenced.contains(name) => content.clone(),
        _ => n,
    })
}

/// Rename every identifier to a fresh one, keeping the binding structure
pub fn alpha_convert(node: &Schema) -> Schema {
    if !contains_named(node) {
        return node.clone();
    }
    let mut renaming: HashMap<Name, Name> = HashMap::new();
    transform(node, &mut |n| match n.shape() {
        Shape::Named(name, content) => {
            let fresh = *renaming.entry(*name).or_insert_with(Name::fresh);
            Schema::new(Shape::Named(fresh, content.clone()))
        }
        _ => n,
    })
}

/// Bindings of a single tree, used to resolve back-references wherever they sit
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    table: HashMap<Name, Schema>,
}

impl Bindings {
    /// Collect the bindings of `node`, rejecting identifiers bound twice
    pub fn collect(node: &Schema) -> Result<Self> {
        let mut bindings = Bindings::default();
        let mut duplicate = None;
        bindings.walk(node, &mut |name| {
            duplicate.get_or_insert(name);
        });
        match duplicate {
            Some(name) => Err(SchemaError::InvalidRecursiveStructure {
                name,
                reason: "identifier is bound more than once",
            }),
            None => Ok(bindings),
        }
    }

    /// Collect the bindings of `node`, keeping the first of any duplicates
    pub fn collect_lenient(node: &Schema) -> Self {
        let mut bindings = Bindings::default();
        bindings.walk(node, &mut |_| {});
        bindings
    }

    fn walk(&mut self, node: &Schema, on_duplicate: &mut impl FnMut(Name)) {
        if let Shape::Named(name, Some(content)) = node.shape() {
            if self.table.contains_key(name) {
                on_duplicate(*name);
            } else {
                self.table.insert(*name, content.clone());
            }
        }
        iterate(node, |child| self.walk(child, &mut *on_duplicate));
    }

    pub fn get(&self, name: Name) -> Option<&Schema> {
        self.table.get(&name)
    }

    pub fn contains(&self, name: Name) -> bool {
        self.table.contains_key(&name)
    }

    pub fn as_map(&self) -> &HashMap<Name, Schema> {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Content bound to a named node, for either a binding or a back-reference
    pub fn content_of(&self, node: &Schema) -> Option<Schema> {
        match node.shape() {
            Shape::Named(_, Some(content)) => Some(content.clone()),
            Shape::Named(name, None) => self.get(*name).cloned(),
            _ => Some(node.clone()),
        }
    }

    /// Follow named links down to the first structural node.
    ///
    /// `None` when a link is dangling or the links only lead back to themselves.
    pub fn unfold(&self, node: &Schema) -> Option<Schema> {
        let mut seen = HashSet::new();
        let mut current = node.clone();
        while let Shape::Named(name, _) = current.shape() {
            if !seen.insert(*name) {
                return None;
            }
            current = self.content_of(&current)?;
        }
        Some(current)
    }
}

/// Make `node` self-contained.
///
/// Back-references bound nowhere in `node` are looked up in `dictionary`; the
/// first use becomes a local binding and later uses stay back-references to it.
pub fn standalone(node: &Schema, dictionary: &HashMap<Name, Schema>) -> Result<Schema> {
    if !contains_named(node) {
        return Ok(node.clone());
    }
    let local = Bindings::collect_lenient(node);
    let mut defined: HashSet<Name> = local.table.keys().copied().collect();
    resolve(node, dictionary, &mut defined)
}

fn resolve(
    node: &Schema,
    dictionary: &HashMap<Name, Schema>,
    defined: &mut HashSet<Name>,
) -> Result<Schema> {
    match node.shape() {
        Shape::Named(name, None) if !defined.contains(name) => {
            let content = dictionary
                .get(name)
                .ok_or(SchemaError::UnresolvedRecursiveName(*name))?;
            debug!(%name, "materializing binding from dictionary");
            defined.insert(*name);
            let content = resolve(content, dictionary, defined)?;
            Ok(Schema::bound(*name, content))
        }
        _ => try_map_children(node, |child| resolve(child, dictionary, defined)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VariantKind;

    fn int_list(name: Name) -> Schema {
        Schema::bound(
            name,
            Schema::variant(
                VariantKind::Ordered,
                [("Nil", vec![]), ("Cons", vec![Schema::int(), Schema::back_ref(name)])],
            ),
        )
    }

    #[test]
    fn test_contains_named() {
        assert!(!contains_named(&Schema::list(Schema::int())));
        assert!(contains_named(&Schema::option(Schema::back_ref(Name::new(1)))));
        assert!(contains_named(&int_list(Name::new(2))));
    }

    #[test]
    fn test_remove_dead_links_unwraps_unreferenced_bindings() {
        let dead = Schema::bound(Name::new(1), Schema::int());
        let schema = Schema::tuple(vec![dead, int_list(Name::new(2))]);
        let cleaned = remove_dead_links(&schema);
        assert_eq!(
            cleaned.to_string(),
            "(int, #2=[ Nil | Cons of int * #2 ])"
        );
        assert_eq!(remove_dead_links(&cleaned), cleaned);
    }

    #[test]
    fn test_remove_dead_links_without_names_is_identity() {
        let schema = Schema::record([("a", Schema::int())]);
        assert!(remove_dead_links(&schema).ptr_eq(&schema));
    }

    #[test]
    fn test_alpha_convert_renames_consistently() {
        let schema = int_list(Name::new(5));
        let renamed = alpha_convert(&schema);
        let Shape::Named(fresh, Some(_)) = renamed.shape() else {
            panic!("Expected binding, got {}", renamed);
        };
        assert_ne!(*fresh, Name::new(5));
        assert_eq!(back_references(&renamed), HashSet::from([*fresh]));

        let plain = Schema::list(Schema::int());
        assert!(alpha_convert(&plain).ptr_eq(&plain));
    }

    #[test]
    fn test_standalone_unresolved_name() {
        let err = standalone(&Schema::back_ref(Name::new(7)), &HashMap::new()).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedRecursiveName(name) if name == Name::new(7)));
    }

    #[test]
    fn test_standalone_materializes_first_use_only() {
        let name = Name::new(9);
        let dictionary = HashMap::from([(
            name,
            Schema::record([("value", Schema::int()), ("next", Schema::option(Schema::back_ref(name)))]),
        )]);
        let schema = Schema::tuple(vec![Schema::back_ref(name), Schema::back_ref(name)]);
        let resolved = standalone(&schema, &dictionary).unwrap();
        assert_eq!(
            resolved.to_string(),
            "(#9={ value: int; next: option<#9> }, #9)"
        );
        assert!(Bindings::collect(&resolved).is_ok());
    }

    #[test]
    fn test_standalone_prefers_local_binding() {
        let name = Name::new(4);
        let schema = Schema::tuple(vec![Schema::back_ref(name), int_list(name)]);
        let resolved = standalone(&schema, &HashMap::new()).unwrap();
        assert_eq!(resolved, schema);
    }

    #[test]
    fn test_bindings_reject_duplicates() {
        let name = Name::new(3);
        let schema = Schema::tuple(vec![Schema::bound(name, Schema::int()), Schema::bound(name, Schema::int())]);
        assert!(matches!(
            Bindings::collect(&schema),
            Err(SchemaError::InvalidRecursiveStructure { .. })
        ));
        assert_eq!(Bindings::collect_lenient(&schema).len(), 1);
    }

    #[test]
    fn test_unfold_follows_links() {
        let schema = Schema::tuple(vec![
            Schema::bound(Name::new(1), Schema::back_ref(Name::new(2))),
            Schema::bound(Name::new(2), Schema::float()),
            Schema::bound(Name::new(3), Schema::back_ref(Name::new(3))),
        ]);
        let bindings = Bindings::collect(&schema).unwrap();
        assert_eq!(bindings.unfold(&Schema::back_ref(Name::new(1))), Some(Schema::float()));
        assert_eq!(bindings.unfold(&Schema::back_ref(Name::new(3))), None);
        assert_eq!(bindings.unfold(&Schema::back_ref(Name::new(8))), None);
    }
}
