//! Runtime type handles
//!
//! A [`TypeHandle`] is a flat, cyclic description of a schema's runtime
//! layout: every node lives in an arena and refers to its children by
//! [`TypeId`], so recursive schemas become cycles instead of named links.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{Result, SchemaError};
use crate::name::Name;
use crate::named::Bindings;
use crate::schema::{Schema, Shape, VariantKind, Wrapper};
use crate::versioned::Atom;

/// Largest tuple with a runtime handle
pub const MAX_TUPLE_ARITY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

/// Runtime layout of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repr {
    Atom(Atom),
    Wrapped(Wrapper, TypeId),
    Tuple(Vec<TypeId>),
    Record {
        fields: Vec<(String, TypeId)>,
        mutable: Vec<bool>,
        float_block: bool,
    },
    Variant {
        tagged: bool,
        cases: Vec<(String, i64, Vec<TypeId>)>,
    },
    /// A binding whose content is itself a named link
    Alias(TypeId),
}

#[derive(Debug, Clone)]
pub struct TypeHandle {
    nodes: Vec<Repr>,
    root: TypeId,
}

impl TypeHandle {
    pub fn root(&self) -> TypeId {
        self.root
    }

    pub fn get(&self, id: TypeId) -> &Repr {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Build the runtime handle of `schema`
pub fn materialize(schema: &Schema) -> Result<TypeHandle> {
    let mut builder = Builder {
        bindings: Bindings::collect_lenient(schema),
        slots: HashMap::new(),
        nodes: Vec::new(),
    };
    let root = builder.node(schema)?;
    Ok(TypeHandle {
        nodes: builder.nodes,
        root,
    })
}

struct Builder {
    bindings: Bindings,
    /// Arena slot of every binding materialized so far
    slots: HashMap<Name, TypeId>,
    nodes: Vec<Repr>,
}

impl Builder {
    fn push(&mut self, repr: Repr) -> TypeId {
        self.nodes.push(repr);
        TypeId(self.nodes.len() - 1)
    }

    fn node(&mut self, schema: &Schema) -> Result<TypeId> {
        match schema.shape() {
            Shape::Named(name, content) => {
                if let Some(slot) = self.slots.get(name) {
                    return Ok(*slot);
                }
                let content = match content {
                    Some(content) => content.clone(),
                    None => self
                        .bindings
                        .get(*name)
                        .cloned()
                        .ok_or(SchemaError::UnboundName(*name))?,
                };
                // Reserve the slot first so self-references close the cycle
                let slot = self.push(Repr::Alias(TypeId(self.nodes.len())));
                self.slots.insert(*name, slot);
                trace!(%name, slot = slot.0, "materializing binding");
                let repr = self.repr(&content)?;
                self.nodes[slot.0] = repr;
                Ok(slot)
            }
            _ => {
                let repr = self.repr(schema)?;
                Ok(self.push(repr))
            }
        }
    }

    fn children(&mut self, schemas: &[Schema]) -> Result<Vec<TypeId>> {
        schemas.iter().map(|s| self.node(s)).collect()
    }

    fn repr(&mut self, schema: &Schema) -> Result<Repr> {
        if let Some(atom) = Atom::of(schema) {
            return Ok(Repr::Atom(atom));
        }
        if let Some((wrapper, inner)) = schema.as_wrapper() {
            return Ok(Repr::Wrapped(wrapper, self.node(inner)?));
        }
        Ok(match schema.shape() {
            Shape::Tuple(elems) => {
                if elems.len() > MAX_TUPLE_ARITY {
                    return Err(SchemaError::UnsupportedArity {
                        arity: elems.len(),
                        node: schema.clone(),
                    });
                }
                Repr::Tuple(self.children(elems)?)
            }
            Shape::Record { meta, fields } => {
                let mut ids = Vec::with_capacity(fields.len());
                for (field, x) in fields {
                    ids.push((field.label.clone(), self.node(x)?));
                }
                Repr::Record {
                    fields: ids,
                    mutable: fields.iter().map(|(f, _)| f.mutable).collect(),
                    float_block: meta.special_layout,
                }
            }
            Shape::Variant { meta, cases } => {
                let mut out = Vec::with_capacity(cases.len());
                for (case, args) in cases {
                    out.push((case.label.clone(), case.repr_tag, self.children(args)?));
                }
                Repr::Variant {
                    tagged: meta.kind == VariantKind::Tagged,
                    cases: out,
                }
            }
            Shape::Named(..) => Repr::Alias(self.node(schema)?),
            _ => unreachable!("atoms and wrappers handled above"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursive_schema_becomes_cycle() {
        let name = Name::new(1);
        let list = Schema::bound(
            name,
            Schema::variant(
                VariantKind::Ordered,
                [("Nil", vec![]), ("Cons", vec![Schema::int(), Schema::back_ref(name)])],
            ),
        );
        let handle = materialize(&list).unwrap();
        let Repr::Variant { tagged, cases } = handle.get(handle.root()) else {
            panic!("Expected variant, got {:?}", handle.get(handle.root()));
        };
        assert!(!tagged);
        assert_eq!(cases[1].2[1], handle.root());
        assert_eq!(handle.get(cases[1].2[0]), &Repr::Atom(Atom::Int));
    }

    #[test]
    fn test_back_reference_before_binding() {
        let name = Name::new(2);
        let schema = Schema::tuple(vec![
            Schema::back_ref(name),
            Schema::bound(name, Schema::record([("x", Schema::float())])),
        ]);
        let handle = materialize(&schema).unwrap();
        let Repr::Tuple(elems) = handle.get(handle.root()) else {
            panic!("Expected tuple");
        };
        assert_eq!(elems[0], elems[1]);
    }

    #[test]
    fn test_unbound_name() {
        let err = materialize(&Schema::list(Schema::back_ref(Name::new(3)))).unwrap_err();
        assert!(matches!(err, SchemaError::UnboundName(name) if name == Name::new(3)));
    }

    #[test]
    fn test_tuple_arity_limit() {
        let tuple = |n| Schema::tuple(vec![Schema::int(); n]);
        assert!(materialize(&tuple(MAX_TUPLE_ARITY)).is_ok());
        match materialize(&tuple(MAX_TUPLE_ARITY + 1)) {
            Err(SchemaError::UnsupportedArity { arity, .. }) => assert_eq!(arity, 6),
            other => panic!("Expected arity error, got {:?}", other),
        }
    }
}
