//! Versioned wire encoding of schemas
//!
//! Each wire version is a separate, frozen node type. Conversions run one
//! version at a time: upgrades fill in the defaults older versions imply and
//! never fail, downgrades refuse any feature the older version cannot carry.
//! A [`Versioned`] value is the self-describing envelope
//! `{"version": "v3", "schema": ...}`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::name::Name;
use crate::schema::{
    ordered_repr_tags, Field, RecordMeta, Schema, Shape, VariantCase, VariantKind, VariantMeta,
    Wrapper,
};
use crate::version::WireVersion;

/// Leaf kinds, shared by every wire version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atom {
    Int,
    Int32,
    Int64,
    NativeInt,
    Char,
    Float,
    String,
    Bool,
    Unit,
}

impl Atom {
    pub fn of(shape: &Shape) -> Option<Atom> {
        Some(match shape {
            Shape::Int => Atom::Int,
            Shape::Int32 => Atom::Int32,
            Shape::Int64 => Atom::Int64,
            Shape::NativeInt => Atom::NativeInt,
            Shape::Char => Atom::Char,
            Shape::Float => Atom::Float,
            Shape::String => Atom::String,
            Shape::Bool => Atom::Bool,
            Shape::Unit => Atom::Unit,
            _ => return None,
        })
    }

    pub fn to_schema(self) -> Schema {
        Schema::new(match self {
            Atom::Int => Shape::Int,
            Atom::Int32 => Shape::Int32,
            Atom::Int64 => Shape::Int64,
            Atom::NativeInt => Shape::NativeInt,
            Atom::Char => Shape::Char,
            Atom::Float => Shape::Float,
            Atom::String => Shape::String,
            Atom::Bool => Shape::Bool,
            Atom::Unit => Shape::Unit,
        })
    }
}

macro_rules! wrapper_variants {
    ($node:ident) => {
        impl $node {
            fn wrap(wrapper: Wrapper, inner: $node) -> $node {
                let inner = Box::new(inner);
                match wrapper {
                    Wrapper::Option => $node::Option(inner),
                    Wrapper::List => $node::List(inner),
                    Wrapper::Array => $node::Array(inner),
                    Wrapper::Lazy => $node::Lazy(inner),
                    Wrapper::Ref => $node::Ref(inner),
                }
            }

            fn as_wrapper(&self) -> Option<(Wrapper, &$node)> {
                match self {
                    $node::Option(inner) => Some((Wrapper::Option, inner)),
                    $node::List(inner) => Some((Wrapper::List, inner)),
                    $node::Array(inner) => Some((Wrapper::Array, inner)),
                    $node::Lazy(inner) => Some((Wrapper::Lazy, inner)),
                    $node::Ref(inner) => Some((Wrapper::Ref, inner)),
                    _ => None,
                }
            }
        }
    };
}

/// V1: full structure, labels only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum V1Node {
    Atom(Atom),
    Option(Box<V1Node>),
    List(Box<V1Node>),
    Array(Box<V1Node>),
    Lazy(Box<V1Node>),
    Ref(Box<V1Node>),
    Tuple(Vec<V1Node>),
    Record(Vec<(String, V1Node)>),
    Variant(Vec<(String, Vec<V1Node>)>),
}

/// V2: V1 plus named sharing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum V2Node {
    Atom(Atom),
    Option(Box<V2Node>),
    List(Box<V2Node>),
    Array(Box<V2Node>),
    Lazy(Box<V2Node>),
    Ref(Box<V2Node>),
    Tuple(Vec<V2Node>),
    Record(Vec<(String, V2Node)>),
    Variant(Vec<(String, Vec<V2Node>)>),
    Named(Name, Option<Box<V2Node>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedField {
    pub label: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedCase {
    pub label: String,
    pub index: usize,
    pub repr_tag: i64,
}

/// V3: V2 plus record and variant metadata blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum V3Node {
    Atom(Atom),
    Option(Box<V3Node>),
    List(Box<V3Node>),
    Array(Box<V3Node>),
    Lazy(Box<V3Node>),
    Ref(Box<V3Node>),
    Tuple(Vec<V3Node>),
    Record {
        #[serde(default)]
        meta: RecordMeta,
        fields: Vec<(IndexedField, V3Node)>,
    },
    Variant {
        meta: VariantMeta,
        cases: Vec<(TaggedCase, Vec<V3Node>)>,
    },
    Named(Name, Option<Box<V3Node>>),
}

/// V4: V3 plus field mutability and case argument labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum V4Node {
    Atom(Atom),
    Option(Box<V4Node>),
    List(Box<V4Node>),
    Array(Box<V4Node>),
    Lazy(Box<V4Node>),
    Ref(Box<V4Node>),
    Tuple(Vec<V4Node>),
    Record {
        #[serde(default)]
        meta: RecordMeta,
        fields: Vec<(Field, V4Node)>,
    },
    Variant {
        meta: VariantMeta,
        cases: Vec<(VariantCase, Vec<V4Node>)>,
    },
    Named(Name, Option<Box<V4Node>>),
}

wrapper_variants!(V1Node);
wrapper_variants!(V2Node);
wrapper_variants!(V3Node);
wrapper_variants!(V4Node);

/// A schema tagged with the wire version it is encoded in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "version", content = "schema", rename_all = "lowercase")]
pub enum Versioned {
    V0(Atom),
    V1(V1Node),
    V2(V2Node),
    V3(V3Node),
    V4(V4Node),
    V5(Schema),
}

impl Versioned {
    pub fn version(&self) -> WireVersion {
        match self {
            Versioned::V0(_) => WireVersion::V0,
            Versioned::V1(_) => WireVersion::V1,
            Versioned::V2(_) => WireVersion::V2,
            Versioned::V3(_) => WireVersion::V3,
            Versioned::V4(_) => WireVersion::V4,
            Versioned::V5(_) => WireVersion::V5,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One downgrade step; the error is the reason the step was refused
type Downgrade<T> = std::result::Result<T, String>;

/// Encode `schema` in `version`, refusing features the version cannot express
pub fn serialize(schema: &Schema, version: WireVersion) -> Result<Versioned> {
    downgrade(schema, version).map_err(|reason| {
        debug!(%version, %reason, "downgrade refused");
        SchemaError::NotDowngradable { version, reason }
    })
}

fn downgrade(schema: &Schema, version: WireVersion) -> Downgrade<Versioned> {
    if version == WireVersion::V5 {
        return Ok(Versioned::V5(schema.clone()));
    }
    let v4 = to_v4(schema);
    if version == WireVersion::V4 {
        return Ok(Versioned::V4(v4));
    }
    let v3 = v4_to_v3(&v4)?;
    if version == WireVersion::V3 {
        return Ok(Versioned::V3(v3));
    }
    let v2 = v3_to_v2(&v3)?;
    if version == WireVersion::V2 {
        return Ok(Versioned::V2(v2));
    }
    let v1 = v2_to_v1(&v2)?;
    if version == WireVersion::V1 {
        return Ok(Versioned::V1(v1));
    }
    Ok(Versioned::V0(v1_to_v0(&v1)?))
}

/// Decode any version into the in-memory tree
pub fn unserialize(value: &Versioned) -> Schema {
    match value {
        Versioned::V0(atom) => atom.to_schema(),
        Versioned::V1(node) => from_v4(&v3_to_v4(&v2_to_v3(&v1_to_v2(node)))),
        Versioned::V2(node) => from_v4(&v3_to_v4(&v2_to_v3(node))),
        Versioned::V3(node) => from_v4(&v3_to_v4(node)),
        Versioned::V4(node) => from_v4(node),
        Versioned::V5(schema) => schema.clone(),
    }
}

/// Re-encode `value` in `target`; values already at `target` are returned as they are
pub fn change_version(value: &Versioned, target: WireVersion) -> Result<Versioned> {
    if value.version() == target {
        return Ok(value.clone());
    }
    serialize(&unserialize(value), target)
}

fn boxed<T>(node: Option<T>) -> Option<Box<T>> {
    node.map(Box::new)
}

// ============================================================================
// Downgrades
// ============================================================================

/// V4 carries everything the in-memory tree holds
fn to_v4(node: &Schema) -> V4Node {
    if let Some(atom) = Atom::of(node) {
        return V4Node::Atom(atom);
    }
    if let Some((wrapper, inner)) = node.as_wrapper() {
        return V4Node::wrap(wrapper, to_v4(inner));
    }
    match node.shape() {
        Shape::Tuple(elems) => V4Node::Tuple(elems.iter().map(to_v4).collect()),
        Shape::Record { meta, fields } => V4Node::Record {
            meta: *meta,
            fields: fields
                .iter()
                .map(|(field, x)| (field.clone(), to_v4(x)))
                .collect(),
        },
        Shape::Variant { meta, cases } => V4Node::Variant {
            meta: *meta,
            cases: cases
                .iter()
                .map(|(case, args)| (case.clone(), args.iter().map(to_v4).collect()))
                .collect(),
        },
        Shape::Named(name, content) => V4Node::Named(*name, boxed(content.as_ref().map(to_v4))),
        _ => unreachable!("atoms and wrappers handled above"),
    }
}

fn v4_to_v3(node: &V4Node) -> Downgrade<V3Node> {
    if let Some((wrapper, inner)) = node.as_wrapper() {
        return Ok(V3Node::wrap(wrapper, v4_to_v3(inner)?));
    }
    Ok(match node {
        V4Node::Atom(atom) => V3Node::Atom(*atom),
        V4Node::Tuple(elems) => {
            V3Node::Tuple(elems.iter().map(v4_to_v3).collect::<Downgrade<_>>()?)
        }
        V4Node::Record { meta, fields } => V3Node::Record {
            meta: *meta,
            fields: fields
                .iter()
                .map(|(field, x)| {
                    if field.mutable {
                        return Err(format!("mutable field `{}` requires v4", field.label));
                    }
                    let field = IndexedField {
                        label: field.label.clone(),
                        index: field.index,
                    };
                    Ok((field, v4_to_v3(x)?))
                })
                .collect::<Downgrade<_>>()?,
        },
        V4Node::Variant { meta, cases } => V3Node::Variant {
            meta: *meta,
            cases: cases
                .iter()
                .map(|(case, args)| {
                    if !case.arg_labels.is_empty() {
                        return Err(format!("argument labels of case `{}` require v4", case.label));
                    }
                    let case = TaggedCase {
                        label: case.label.clone(),
                        index: case.index,
                        repr_tag: case.repr_tag,
                    };
                    Ok((case, args.iter().map(v4_to_v3).collect::<Downgrade<_>>()?))
                })
                .collect::<Downgrade<_>>()?,
        },
        V4Node::Named(name, content) => {
            V3Node::Named(*name, boxed(content.as_deref().map(v4_to_v3).transpose()?))
        }
        _ => unreachable!("wrappers handled above"),
    })
}

fn v3_to_v2(node: &V3Node) -> Downgrade<V2Node> {
    if let Some((wrapper, inner)) = node.as_wrapper() {
        return Ok(V2Node::wrap(wrapper, v3_to_v2(inner)?));
    }
    Ok(match node {
        V3Node::Atom(atom) => V2Node::Atom(*atom),
        V3Node::Tuple(elems) => {
            V2Node::Tuple(elems.iter().map(v3_to_v2).collect::<Downgrade<_>>()?)
        }
        V3Node::Record { meta, fields } => {
            if meta.special_layout {
                let labels: Vec<&str> = fields.iter().map(|(f, _)| f.label.as_str()).collect();
                return Err(format!(
                    "all-float record layout of {{ {} }} requires v3",
                    labels.join("; ")
                ));
            }
            V2Node::Record(
                fields
                    .iter()
                    .enumerate()
                    .map(|(position, (field, x))| {
                        if field.index != position {
                            return Err(format!(
                                "field `{}` sits at index {} instead of {}, which requires v3",
                                field.label, field.index, position
                            ));
                        }
                        Ok((field.label.clone(), v3_to_v2(x)?))
                    })
                    .collect::<Downgrade<_>>()?,
            )
        }
        V3Node::Variant { meta, cases } => {
            if meta.kind != VariantKind::Ordered {
                return Err("tagged variants require v3".to_string());
            }
            let defaults = ordered_repr_tags(cases.iter().map(|(_, args)| args.len()));
            V2Node::Variant(
                cases
                    .iter()
                    .zip(defaults)
                    .enumerate()
                    .map(|(position, ((case, args), tag))| {
                        if case.index != position || case.repr_tag != tag {
                            return Err(format!(
                                "case `{}` has a non-default index or tag, which requires v3",
                                case.label
                            ));
                        }
                        Ok((case.label.clone(), args.iter().map(v3_to_v2).collect::<Downgrade<_>>()?))
                    })
                    .collect::<Downgrade<_>>()?,
            )
        }
        V3Node::Named(name, content) => {
            V2Node::Named(*name, boxed(content.as_deref().map(v3_to_v2).transpose()?))
        }
        _ => unreachable!("wrappers handled above"),
    })
}

fn v2_to_v1(node: &V2Node) -> Downgrade<V1Node> {
    if let Some((wrapper, inner)) = node.as_wrapper() {
        return Ok(V1Node::wrap(wrapper, v2_to_v1(inner)?));
    }
    Ok(match node {
        V2Node::Atom(atom) => V1Node::Atom(*atom),
        V2Node::Tuple(elems) => {
            V1Node::Tuple(elems.iter().map(v2_to_v1).collect::<Downgrade<_>>()?)
        }
        V2Node::Record(fields) => V1Node::Record(
            fields
                .iter()
                .map(|(label, x)| Ok((label.clone(), v2_to_v1(x)?)))
                .collect::<Downgrade<_>>()?,
        ),
        V2Node::Variant(cases) => V1Node::Variant(
            cases
                .iter()
                .map(|(label, args)| {
                    Ok((label.clone(), args.iter().map(v2_to_v1).collect::<Downgrade<_>>()?))
                })
                .collect::<Downgrade<_>>()?,
        ),
        V2Node::Named(name, _) => return Err(format!("named node {} requires v2", name)),
        _ => unreachable!("wrappers handled above"),
    })
}

fn v1_to_v0(node: &V1Node) -> Downgrade<Atom> {
    match node {
        V1Node::Atom(atom) => Ok(*atom),
        _ => Err("only atoms can be encoded in v0".to_string()),
    }
}

// ============================================================================
// Upgrades
// ============================================================================

fn v1_to_v2(node: &V1Node) -> V2Node {
    if let Some((wrapper, inner)) = node.as_wrapper() {
        return V2Node::wrap(wrapper, v1_to_v2(inner));
    }
    match node {
        V1Node::Atom(atom) => V2Node::Atom(*atom),
        V1Node::Tuple(elems) => V2Node::Tuple(elems.iter().map(v1_to_v2).collect()),
        V1Node::Record(fields) => V2Node::Record(
            fields
                .iter()
                .map(|(label, x)| (label.clone(), v1_to_v2(x)))
                .collect(),
        ),
        V1Node::Variant(cases) => V2Node::Variant(
            cases
                .iter()
                .map(|(label, args)| (label.clone(), args.iter().map(v1_to_v2).collect()))
                .collect(),
        ),
        _ => unreachable!("wrappers handled above"),
    }
}

/// Default metadata, positional indices and default ordered tags
fn v2_to_v3(node: &V2Node) -> V3Node {
    if let Some((wrapper, inner)) = node.as_wrapper() {
        return V3Node::wrap(wrapper, v2_to_v3(inner));
    }
    match node {
        V2Node::Atom(atom) => V3Node::Atom(*atom),
        V2Node::Tuple(elems) => V3Node::Tuple(elems.iter().map(v2_to_v3).collect()),
        V2Node::Record(fields) => V3Node::Record {
            meta: RecordMeta::default(),
            fields: fields
                .iter()
                .enumerate()
                .map(|(index, (label, x))| {
                    let field = IndexedField {
                        label: label.clone(),
                        index,
                    };
                    (field, v2_to_v3(x))
                })
                .collect(),
        },
        V2Node::Variant(cases) => {
            let tags = ordered_repr_tags(cases.iter().map(|(_, args)| args.len()));
            V3Node::Variant {
                meta: VariantMeta::default(),
                cases: cases
                    .iter()
                    .zip(tags)
                    .enumerate()
                    .map(|(index, ((label, args), repr_tag))| {
                        let case = TaggedCase {
                            label: label.clone(),
                            index,
                            repr_tag,
                        };
                        (case, args.iter().map(v2_to_v3).collect())
                    })
                    .collect(),
            }
        }
        V2Node::Named(name, content) => {
            V3Node::Named(*name, content.as_deref().map(v2_to_v3).map(Box::new))
        }
        _ => unreachable!("wrappers handled above"),
    }
}

fn v3_to_v4(node: &V3Node) -> V4Node {
    if let Some((wrapper, inner)) = node.as_wrapper() {
        return V4Node::wrap(wrapper, v3_to_v4(inner));
    }
    match node {
        V3Node::Atom(atom) => V4Node::Atom(*atom),
        V3Node::Tuple(elems) => V4Node::Tuple(elems.iter().map(v3_to_v4).collect()),
        V3Node::Record { meta, fields } => V4Node::Record {
            meta: *meta,
            fields: fields
                .iter()
                .map(|(field, x)| (Field::new(field.label.clone(), field.index), v3_to_v4(x)))
                .collect(),
        },
        V3Node::Variant { meta, cases } => V4Node::Variant {
            meta: *meta,
            cases: cases
                .iter()
                .map(|(case, args)| {
                    let case = VariantCase::new(case.label.clone(), case.index, case.repr_tag);
                    (case, args.iter().map(v3_to_v4).collect())
                })
                .collect(),
        },
        V3Node::Named(name, content) => {
            V4Node::Named(*name, content.as_deref().map(v3_to_v4).map(Box::new))
        }
        _ => unreachable!("wrappers handled above"),
    }
}

fn from_v4(node: &V4Node) -> Schema {
    if let Some((wrapper, inner)) = node.as_wrapper() {
        return wrapper.wrap(from_v4(inner));
    }
    match node {
        V4Node::Atom(atom) => atom.to_schema(),
        V4Node::Tuple(elems) => Schema::tuple(elems.iter().map(from_v4).collect()),
        V4Node::Record { meta, fields } => Schema::record_with(
            *meta,
            fields
                .iter()
                .map(|(field, x)| (field.clone(), from_v4(x)))
                .collect(),
        ),
        V4Node::Variant { meta, cases } => Schema::variant_with(
            *meta,
            cases
                .iter()
                .map(|(case, args)| (case.clone(), args.iter().map(from_v4).collect()))
                .collect(),
        ),
        V4Node::Named(name, content) => {
            Schema::new(Shape::Named(*name, content.as_deref().map(from_v4)))
        }
        _ => unreachable!("wrappers handled above"),
    }
}
