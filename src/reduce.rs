//! Canonical sharing (hash-consing) of record and variant subtrees

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::name::Name;
use crate::named::remove_dead_links;
use crate::schema::{Schema, Shape};
use crate::traverse::{map_children, transform};

/// Collapse structurally identical records and variants into one shared binding.
///
/// Every record or variant is bound under a freshly minted name; later
/// identical occurrences become back-references to it. Existing bindings that
/// merely alias another name are folded into it. Bindings nobody refers to are
/// unwrapped at the end.
pub fn reduce(node: &Schema) -> Schema {
    let mut reducer = Reducer::default();
    let shared = transform(node, &mut |n| reducer.visit(n));
    let renamed = reducer.apply_aliases(&shared);
    remove_dead_links(&renamed)
}

/// Call-scoped interning state
#[derive(Default)]
struct Reducer {
    /// Key form of each record or variant seen so far
    interned: HashMap<Schema, Name>,
    minted: HashSet<Name>,
    aliases: HashMap<Name, Name>,
}

impl Reducer {
    fn canonical(&self, mut name: Name) -> Name {
        let mut hops = 0;
        while let Some(target) = self.aliases.get(&name) {
            name = *target;
            hops += 1;
            if hops > self.aliases.len() {
                break;
            }
        }
        name
    }

    fn visit(&mut self, node: Schema) -> Schema {
        match node.shape() {
            Shape::Record { .. } | Shape::Variant { .. } => {
                let key = self.key_of(&node);
                if let Some(name) = self.interned.get(&key) {
                    trace!(%name, "sharing identical subtree");
                    return Schema::back_ref(*name);
                }
                let name = Name::fresh();
                self.interned.insert(key, name);
                self.minted.insert(name);
                Schema::bound(name, node)
            }
            Shape::Named(name, None) => {
                let canonical = self.canonical(*name);
                if canonical == *name {
                    node
                } else {
                    Schema::back_ref(canonical)
                }
            }
            Shape::Named(name, Some(content)) => match content.shape() {
                Shape::Named(target, _) => {
                    let target = self.canonical(*target);
                    if target == *name {
                        return node;
                    }
                    trace!(%name, %target, "aliasing binding");
                    self.aliases.insert(*name, target);
                    content.clone()
                }
                _ => node,
            },
            _ => node,
        }
    }

    /// Structural key of an already reduced subtree.
    ///
    /// Minted bindings and all back-references are keyed by canonical name
    /// only, so the first occurrence of a shared child keys the same as a later
    /// reference to it.
    fn key_of(&self, node: &Schema) -> Schema {
        match node.shape() {
            Shape::Named(name, None) => Schema::back_ref(self.canonical(*name)),
            Shape::Named(name, Some(_)) if self.minted.contains(name) => Schema::back_ref(*name),
            Shape::Named(name, Some(content)) => {
                Schema::bound(self.canonical(*name), self.key_of(content))
            }
            _ => map_children(node, |child| self.key_of(child)),
        }
    }

    fn apply_aliases(&self, node: &Schema) -> Schema {
        if self.aliases.is_empty() {
            return node.clone();
        }
        transform(node, &mut |n| match n.shape() {
            Shape::Named(name, content) if self.canonical(*name) != *name => {
                Schema::new(Shape::Named(self.canonical(*name), content.clone()))
            }
            _ => n,
        })
    }
}
