//! Schema tree and its structural descriptors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::name::Name;

/// A record field descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Label, unique within the owning record
    pub label: String,
    /// Zero-based position in the owning record
    pub index: usize,
    #[serde(default)]
    pub mutable: bool,
}

impl Field {
    pub fn new(label: impl Into<String>, index: usize) -> Self {
        Self {
            label: label.into(),
            index,
            mutable: false,
        }
    }

    pub fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }

    /// Identity used by comparison and merge: label and position, not mutability
    pub fn same_identity(&self, other: &Field) -> bool {
        self.label == other.label && self.index == other.index
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.label, self.index)
    }
}

/// A variant case descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantCase {
    pub label: String,
    /// Position of the case in its variant set
    pub index: usize,
    /// Runtime discriminant distinguishing this case
    pub repr_tag: i64,
    /// Names of the case arguments, empty unless the case carries named arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arg_labels: Vec<String>,
}

impl VariantCase {
    pub fn new(label: impl Into<String>, index: usize, repr_tag: i64) -> Self {
        Self {
            label: label.into(),
            index,
            repr_tag,
            arg_labels: Vec::new(),
        }
    }

    pub fn with_arg_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Same case apart from its position in the set
    pub fn same_case(&self, other: &VariantCase) -> bool {
        self.repr_tag == other.repr_tag
            && self.label == other.label
            && self.arg_labels == other.arg_labels
    }

    /// Discriminant of a tagged case, derived from its label.
    ///
    /// Folds the label bytes with multiplier 223 into 31 bits and maps the
    /// upper half of the range to negative values.
    pub fn hash_label(label: &str) -> i64 {
        let mut accu: u32 = 0;
        for byte in label.bytes() {
            accu = accu.wrapping_mul(223).wrapping_add(u32::from(byte));
        }
        let accu = i64::from(accu & ((1 << 31) - 1));
        if accu > 0x3FFF_FFFF {
            accu - (1 << 31)
        } else {
            accu
        }
    }
}

impl fmt::Display for VariantCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.label, self.index, self.repr_tag)
    }
}

/// How a variant set is keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// Case order is load-bearing (dense 0..n-1 discriminants)
    #[default]
    Ordered,
    /// Cases form a set keyed by `repr_tag`; declaration order is incidental
    Tagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VariantMeta {
    pub kind: VariantKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Record is laid out as a flat float block at runtime
    #[serde(default)]
    pub special_layout: bool,
}

/// Payload of a variant case
pub type Case = (VariantCase, Vec<Schema>);

/// The closed set of schema node kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Int,
    Int32,
    Int64,
    NativeInt,
    Char,
    Float,
    String,
    Bool,
    Unit,
    Option(Schema),
    List(Schema),
    Array(Schema),
    Lazy(Schema),
    Ref(Schema),
    Tuple(Vec<Schema>),
    Record {
        meta: RecordMeta,
        fields: Vec<(Field, Schema)>,
    },
    Variant {
        meta: VariantMeta,
        cases: Vec<Case>,
    },
    /// A binding (`Some`) or a back-reference (`None`) to a shared sub-schema
    Named(Name, Option<Schema>),
}

/// The unary wrapper kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrapper {
    Option,
    List,
    Array,
    Lazy,
    Ref,
}

impl Wrapper {
    pub fn name(self) -> &'static str {
        match self {
            Wrapper::Option => "option",
            Wrapper::List => "list",
            Wrapper::Array => "array",
            Wrapper::Lazy => "lazy",
            Wrapper::Ref => "ref",
        }
    }

    pub fn wrap(self, inner: Schema) -> Schema {
        Schema::new(match self {
            Wrapper::Option => Shape::Option(inner),
            Wrapper::List => Shape::List(inner),
            Wrapper::Array => Shape::Array(inner),
            Wrapper::Lazy => Shape::Lazy(inner),
            Wrapper::Ref => Shape::Ref(inner),
        })
    }
}

impl Shape {
    /// Short name of the node kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Int => "int",
            Shape::Int32 => "int32",
            Shape::Int64 => "int64",
            Shape::NativeInt => "nativeint",
            Shape::Char => "char",
            Shape::Float => "float",
            Shape::String => "string",
            Shape::Bool => "bool",
            Shape::Unit => "unit",
            Shape::Option(_) => "option",
            Shape::List(_) => "list",
            Shape::Array(_) => "array",
            Shape::Lazy(_) => "lazy",
            Shape::Ref(_) => "ref",
            Shape::Tuple(_) => "tuple",
            Shape::Record { .. } => "record",
            Shape::Variant { .. } => "variant",
            Shape::Named(..) => "named",
        }
    }

    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            Shape::Int
                | Shape::Int32
                | Shape::Int64
                | Shape::NativeInt
                | Shape::Char
                | Shape::Float
                | Shape::String
                | Shape::Bool
                | Shape::Unit
        )
    }

    pub fn as_wrapper(&self) -> Option<(Wrapper, &Schema)> {
        match self {
            Shape::Option(inner) => Some((Wrapper::Option, inner)),
            Shape::List(inner) => Some((Wrapper::List, inner)),
            Shape::Array(inner) => Some((Wrapper::Array, inner)),
            Shape::Lazy(inner) => Some((Wrapper::Lazy, inner)),
            Shape::Ref(inner) => Some((Wrapper::Ref, inner)),
            _ => None,
        }
    }
}

/// Immutable, cheaply clonable handle to a schema node.
///
/// Equality and hashing are structural over the whole tree, identifiers
/// included. Use [`crate::equivalence::equivalent`] to compare up to renaming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(Arc<Shape>);

impl Deref for Schema {
    type Target = Shape;

    fn deref(&self) -> &Shape {
        &self.0
    }
}

impl From<Shape> for Schema {
    fn from(shape: Shape) -> Self {
        Schema::new(shape)
    }
}

impl Schema {
    pub fn new(shape: Shape) -> Self {
        Schema(Arc::new(shape))
    }

    pub fn shape(&self) -> &Shape {
        &self.0
    }

    /// Whether both handles point at the same node
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn int() -> Self {
        Shape::Int.into()
    }

    pub fn int32() -> Self {
        Shape::Int32.into()
    }

    pub fn int64() -> Self {
        Shape::Int64.into()
    }

    pub fn native_int() -> Self {
        Shape::NativeInt.into()
    }

    pub fn char() -> Self {
        Shape::Char.into()
    }

    pub fn float() -> Self {
        Shape::Float.into()
    }

    pub fn string() -> Self {
        Shape::String.into()
    }

    pub fn bool() -> Self {
        Shape::Bool.into()
    }

    pub fn unit() -> Self {
        Shape::Unit.into()
    }

    pub fn option(inner: Schema) -> Self {
        Wrapper::Option.wrap(inner)
    }

    pub fn list(inner: Schema) -> Self {
        Wrapper::List.wrap(inner)
    }

    pub fn array(inner: Schema) -> Self {
        Wrapper::Array.wrap(inner)
    }

    pub fn lazy(inner: Schema) -> Self {
        Wrapper::Lazy.wrap(inner)
    }

    pub fn reference(inner: Schema) -> Self {
        Wrapper::Ref.wrap(inner)
    }

    pub fn tuple(elems: Vec<Schema>) -> Self {
        Shape::Tuple(elems).into()
    }

    /// Record with positional indices and the generic layout
    pub fn record<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Schema)>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(index, (label, schema))| (Field::new(label, index), schema))
            .collect();
        Self::record_with(RecordMeta::default(), fields)
    }

    pub fn record_with(meta: RecordMeta, fields: Vec<(Field, Schema)>) -> Self {
        Shape::Record { meta, fields }.into()
    }

    /// Variant with positional indices and default representation tags.
    ///
    /// Ordered sets number constant and non-constant cases independently;
    /// tagged sets derive each tag from the case label.
    pub fn variant<I, S>(kind: VariantKind, cases: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Schema>)>,
        S: Into<String>,
    {
        let cases: Vec<(String, Vec<Schema>)> =
            cases.into_iter().map(|(l, args)| (l.into(), args)).collect();
        let tags = match kind {
            VariantKind::Ordered => ordered_repr_tags(cases.iter().map(|(_, args)| args.len())),
            VariantKind::Tagged => cases.iter().map(|(l, _)| VariantCase::hash_label(l)).collect(),
        };
        let cases = cases
            .into_iter()
            .zip(tags)
            .enumerate()
            .map(|(index, ((label, args), tag))| (VariantCase::new(label, index, tag), args))
            .collect();
        Self::variant_with(VariantMeta { kind }, cases)
    }

    pub fn variant_with(meta: VariantMeta, cases: Vec<Case>) -> Self {
        Shape::Variant { meta, cases }.into()
    }

    /// Binding of `name` to `content`
    pub fn bound(name: Name, content: Schema) -> Self {
        Shape::Named(name, Some(content)).into()
    }

    /// Back-reference to the binding of `name`
    pub fn back_ref(name: Name) -> Self {
        Shape::Named(name, None).into()
    }
}

/// Default tags of an ordered variant: constant and non-constant cases are counted separately.
pub fn ordered_repr_tags(arities: impl IntoIterator<Item = usize>) -> Vec<i64> {
    let mut constant = 0;
    let mut block = 0;
    arities
        .into_iter()
        .map(|arity| {
            let counter = if arity == 0 { &mut constant } else { &mut block };
            let tag = *counter;
            *counter += 1;
            tag
        })
        .collect()
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.shape(), f)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Schema], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_atom() {
            return f.write_str(self.kind_name());
        }
        if let Some((wrapper, inner)) = self.as_wrapper() {
            return write!(f, "{}<{}>", wrapper.name(), inner);
        }
        match self {
            Shape::Tuple(elems) => {
                f.write_str("(")?;
                write_list(f, elems, ", ")?;
                f.write_str(")")
            }
            Shape::Record { meta, fields } => {
                f.write_str(if meta.special_layout { "{| " } else { "{ " })?;
                for (i, (field, schema)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    if field.mutable {
                        f.write_str("mutable ")?;
                    }
                    write!(f, "{}: {}", field.label, schema)?;
                }
                f.write_str(if meta.special_layout { " |}" } else { " }" })
            }
            Shape::Variant { meta, cases } => {
                let (open, quote) = match meta.kind {
                    VariantKind::Ordered => ("[ ", ""),
                    VariantKind::Tagged => ("[> ", "`"),
                };
                f.write_str(open)?;
                for (i, (case, args)) in cases.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}{}", quote, case.label)?;
                    if !args.is_empty() {
                        f.write_str(" of ")?;
                        write_list(f, args, " * ")?;
                    }
                }
                f.write_str(" ]")
            }
            Shape::Named(name, Some(content)) => write!(f, "{}={}", name, content),
            Shape::Named(name, None) => write!(f, "{}", name),
            _ => unreachable!("atoms and wrappers handled above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder_assigns_positions() {
        let schema = Schema::record([("foo", Schema::int()), ("bar", Schema::float())]);
        match schema.shape() {
            Shape::Record { meta, fields } => {
                assert!(!meta.special_layout);
                assert_eq!(fields[0].0, Field::new("foo", 0));
                assert_eq!(fields[1].0, Field::new("bar", 1));
            }
            other => panic!("Expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_ordered_tags_number_constant_and_block_cases_separately() {
        assert_eq!(ordered_repr_tags([0, 1, 0, 2, 0]), vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_tagged_variant_uses_label_hash() {
        let schema = Schema::variant(VariantKind::Tagged, [("A", vec![]), ("B", vec![Schema::int()])]);
        match schema.shape() {
            Shape::Variant { cases, .. } => {
                assert_eq!(cases[0].0.repr_tag, 65);
                assert_eq!(cases[1].0.repr_tag, 66);
            }
            other => panic!("Expected variant, got {:?}", other),
        }
    }

    #[test]
    fn test_hash_label_wraps_into_signed_31_bits() {
        for label in ["Foo", "a_very_long_constructor_name", ""] {
            let tag = VariantCase::hash_label(label);
            assert!((-(1 << 30)..(1 << 30)).contains(&tag));
        }
        assert_eq!(VariantCase::hash_label(""), 0);
    }

    #[test]
    fn test_display() {
        let point = Schema::record([("x", Schema::float()), ("y", Schema::option(Schema::int()))]);
        assert_eq!(point.to_string(), "{ x: float; y: option<int> }");

        let tree = Schema::bound(
            Name::new(3),
            Schema::variant(
                VariantKind::Ordered,
                [("Leaf", vec![]), ("Node", vec![Schema::back_ref(Name::new(3)), Schema::back_ref(Name::new(3))])],
            ),
        );
        assert_eq!(tree.to_string(), "#3=[ Leaf | Node of #3 * #3 ]");
    }

    #[test]
    fn test_serde_shape() {
        let schema = Schema::tuple(vec![Schema::native_int(), Schema::list(Schema::char())]);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json, serde_json::json!({ "tuple": ["native_int", { "list": "char" }] }));
        let back: Schema = serde_json::from_value(json).unwrap();
        assert_eq!(back, schema);
    }
}
