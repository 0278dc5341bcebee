//! Ordered structural diff with compatibility classification

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::equivalence::normalized_cases;
use crate::error::{Result, SchemaError};
use crate::name::Name;
use crate::named::Bindings;
use crate::schema::{Case, Field, Schema, Shape, VariantCase, VariantKind};

/// Whether an added variant case can disturb existing readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    BackwardCompatible,
    Break,
}

/// A single structural change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffAtom {
    /// The whole node changed shape
    Update { old: Schema, new: Schema },
    AddField { field: Field, schema: Schema },
    RemoveField { field: Field, schema: Schema },
    UpdateField { old: Field, new: Field },
    AddVariant {
        compatibility: Compatibility,
        case: VariantCase,
        args: Vec<Schema>,
    },
    RemoveVariant { case: VariantCase, args: Vec<Schema> },
    UpdateVariant { old: VariantCase, new: VariantCase },
}

impl DiffAtom {
    /// A case appended where no existing discriminant moves
    pub fn is_safe_addition(&self) -> bool {
        matches!(
            self,
            DiffAtom::AddVariant {
                compatibility: Compatibility::BackwardCompatible,
                ..
            }
        )
    }
}

/// A change and the path leading to it, outermost step first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub path: Vec<String>,
    pub atom: DiffAtom,
}

impl Diff {
    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            String::from("<root>")
        } else {
            self.path.join(".")
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Schema]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        f.write_str(if i == 0 { " of " } else { " * " })?;
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for DiffAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffAtom::Update { old, new } => write!(f, "changed {} -> {}", old, new),
            DiffAtom::AddField { field, schema } => write!(f, "added field {}: {}", field, schema),
            DiffAtom::RemoveField { field, schema } => {
                write!(f, "removed field {}: {}", field, schema)
            }
            DiffAtom::UpdateField { old, new } => write!(f, "changed field {} -> {}", old, new),
            DiffAtom::AddVariant { compatibility, case, args } => {
                write!(f, "added case {}", case)?;
                write_args(f, args)?;
                if *compatibility == Compatibility::Break {
                    f.write_str(" (breaking)")?;
                }
                Ok(())
            }
            DiffAtom::RemoveVariant { case, args } => {
                write!(f, "removed case {}", case)?;
                write_args(f, args)
            }
            DiffAtom::UpdateVariant { old, new } => write!(f, "changed case {} -> {}", old, new),
        }
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path_string(), self.atom)
    }
}

/// Structural changes turning `a` into `b`, in traversal order
pub fn diff(a: &Schema, b: &Schema) -> Result<Vec<Diff>> {
    let mut differ = Differ {
        left: Bindings::collect(a)?,
        right: Bindings::collect(b)?,
        visited: HashSet::new(),
        path: Vec::new(),
        out: Vec::new(),
    };
    differ.node(a, b)?;
    debug!(changes = differ.out.len(), "diff complete");
    Ok(differ.out)
}

/// Whether values written under `subtype` can be read under `supertype`
pub fn is_read_compatible(subtype: &Schema, supertype: &Schema) -> Result<bool> {
    Ok(diff(subtype, supertype)?
        .iter()
        .all(|d| d.atom.is_safe_addition()))
}

/// All changes except backward compatible case additions
pub fn breaking_changes(diffs: &[Diff]) -> Vec<&Diff> {
    diffs.iter().filter(|d| !d.atom.is_safe_addition()).collect()
}

struct Differ {
    left: Bindings,
    right: Bindings,
    /// Pairs of named nodes already diffed or being diffed
    visited: HashSet<(Name, Name)>,
    path: Vec<String>,
    out: Vec<Diff>,
}

enum Step<'a, T> {
    Matched(&'a T, &'a T),
    Reordered(&'a T, &'a T),
    Added(usize, &'a T),
    Removed(&'a T),
}

/// Lockstep alignment by label.
///
/// On a label mismatch: both labels known to the other side means a reorder,
/// a right label unknown to the left is an addition, otherwise the left label
/// was removed.
fn align<'a, T>(left: &[&'a T], right: &[&'a T], label: fn(&T) -> &str) -> Vec<Step<'a, T>> {
    let left_labels: HashSet<&str> = left.iter().map(|l| label(l)).collect();
    let right_labels: HashSet<&str> = right.iter().map(|r| label(r)).collect();
    let (mut i, mut j) = (0, 0);
    let mut steps = Vec::new();
    loop {
        match (left.get(i), right.get(j)) {
            (None, None) => break,
            (Some(l), None) => {
                steps.push(Step::Removed(*l));
                i += 1;
            }
            (None, Some(r)) => {
                steps.push(Step::Added(j, *r));
                j += 1;
            }
            (Some(l), Some(r)) if label(l) == label(r) => {
                steps.push(Step::Matched(*l, *r));
                i += 1;
                j += 1;
            }
            (Some(l), Some(r)) => {
                match (right_labels.contains(label(l)), left_labels.contains(label(r))) {
                    (true, true) => {
                        steps.push(Step::Reordered(*l, *r));
                        i += 1;
                        j += 1;
                    }
                    (_, false) => {
                        steps.push(Step::Added(j, *r));
                        j += 1;
                    }
                    (false, true) => {
                        steps.push(Step::Removed(*l));
                        i += 1;
                    }
                }
            }
        }
    }
    steps
}

fn field_label(entry: &(Field, Schema)) -> &str {
    &entry.0.label
}

fn case_label(entry: &Case) -> &str {
    &entry.0.label
}

impl Differ {
    fn emit(&mut self, atom: DiffAtom) {
        self.out.push(Diff {
            path: self.path.clone(),
            atom,
        });
    }

    fn update(&mut self, a: &Schema, b: &Schema) {
        self.emit(DiffAtom::Update {
            old: a.clone(),
            new: b.clone(),
        });
    }

    fn nested(&mut self, step: String, a: &Schema, b: &Schema) -> Result<()> {
        self.path.push(step);
        let result = self.node(a, b);
        self.path.pop();
        result
    }

    fn node(&mut self, a: &Schema, b: &Schema) -> Result<()> {
        match (a.shape(), b.shape()) {
            (Shape::Named(x, _), Shape::Named(y, _)) => {
                if !self.visited.insert((*x, *y)) {
                    return Ok(());
                }
                let ca = self.left.content_of(a).ok_or_else(|| SchemaError::dangling(*x))?;
                let cb = self.right.content_of(b).ok_or_else(|| SchemaError::dangling(*y))?;
                self.node(&ca, &cb)
            }
            (Shape::Named(x, _), _) => {
                let a = self.left.unfold(a).ok_or_else(|| SchemaError::dangling(*x))?;
                self.node(&a, b)
            }
            (_, Shape::Named(y, _)) => {
                let b = self.right.unfold(b).ok_or_else(|| SchemaError::dangling(*y))?;
                self.node(a, &b)
            }
            (sa, sb) if sa.is_atom() => {
                if sa != sb {
                    self.update(a, b);
                }
                Ok(())
            }
            (Shape::Tuple(xs), Shape::Tuple(ys)) => {
                if xs.len() != ys.len() {
                    self.update(a, b);
                    return Ok(());
                }
                for (i, (x, y)) in xs.iter().zip(ys).enumerate() {
                    self.nested(format!("f{}", i), x, y)?;
                }
                Ok(())
            }
            (
                Shape::Record { meta: ma, fields: fa },
                Shape::Record { meta: mb, fields: fb },
            ) => {
                if ma != mb {
                    self.update(a, b);
                    return Ok(());
                }
                self.fields(fa, fb)
            }
            (
                Shape::Variant { meta: ma, cases: ca },
                Shape::Variant { meta: mb, cases: cb },
            ) => {
                if ma != mb {
                    self.update(a, b);
                    return Ok(());
                }
                self.cases(ma.kind, ca, cb)
            }
            (sa, sb) => match (sa.as_wrapper(), sb.as_wrapper()) {
                (Some((wa, x)), Some((wb, y))) if wa == wb => self.nested(wa.name().to_string(), x, y),
                _ => {
                    self.update(a, b);
                    Ok(())
                }
            },
        }
    }

    fn fields(&mut self, fa: &[(Field, Schema)], fb: &[(Field, Schema)]) -> Result<()> {
        let left: Vec<_> = fa.iter().collect();
        let right: Vec<_> = fb.iter().collect();
        for step in align(&left, &right, field_label) {
            match step {
                Step::Matched((fx, x), (fy, y)) => {
                    if !fx.same_identity(fy) {
                        self.emit(DiffAtom::UpdateField {
                            old: fx.clone(),
                            new: fy.clone(),
                        });
                    }
                    self.nested(fx.label.clone(), x, y)?;
                }
                Step::Reordered((fx, _), (fy, _)) => self.emit(DiffAtom::UpdateField {
                    old: fx.clone(),
                    new: fy.clone(),
                }),
                Step::Added(_, (field, schema)) => self.emit(DiffAtom::AddField {
                    field: field.clone(),
                    schema: schema.clone(),
                }),
                Step::Removed((field, schema)) => self.emit(DiffAtom::RemoveField {
                    field: field.clone(),
                    schema: schema.clone(),
                }),
            }
        }
        Ok(())
    }

    fn cases(&mut self, kind: VariantKind, ca: &[Case], cb: &[Case]) -> Result<()> {
        let left = normalized_cases(kind, ca);
        let right = normalized_cases(kind, cb);
        let left_labels: HashSet<&str> = left.iter().map(|c| case_label(c)).collect();
        let last_shared = right
            .iter()
            .rposition(|c| left_labels.contains(case_label(c)));

        for step in align(&left, &right, case_label) {
            match step {
                Step::Matched((cx, xs), (cy, ys)) => {
                    if !cx.same_case(cy) || xs.len() != ys.len() {
                        self.emit(DiffAtom::UpdateVariant {
                            old: cx.clone(),
                            new: cy.clone(),
                        });
                    }
                    if xs.len() == ys.len() {
                        self.path.push(cx.label.clone());
                        let result = self.args(xs, ys);
                        self.path.pop();
                        result?;
                    }
                }
                Step::Reordered((cx, _), (cy, _)) => self.emit(DiffAtom::UpdateVariant {
                    old: cx.clone(),
                    new: cy.clone(),
                }),
                Step::Added(position, (case, args)) => {
                    let appended = last_shared.map_or(true, |last| position > last);
                    let compatibility = if kind == VariantKind::Tagged || appended {
                        Compatibility::BackwardCompatible
                    } else {
                        Compatibility::Break
                    };
                    self.emit(DiffAtom::AddVariant {
                        compatibility,
                        case: case.clone(),
                        args: args.clone(),
                    });
                }
                Step::Removed((case, args)) => self.emit(DiffAtom::RemoveVariant {
                    case: case.clone(),
                    args: args.clone(),
                }),
            }
        }
        Ok(())
    }

    fn args(&mut self, xs: &[Schema], ys: &[Schema]) -> Result<()> {
        if let ([x], [y]) = (xs, ys) {
            return self.node(x, y);
        }
        for (i, (x, y)) in xs.iter().zip(ys).enumerate() {
            self.nested(format!("f{}", i), x, y)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::equivalent;

    fn list_of(name: Name, elem: Schema) -> Schema {
        Schema::bound(
            name,
            Schema::variant(
                VariantKind::Ordered,
                [("Nil", vec![]), ("Cons", vec![elem, Schema::back_ref(name)])],
            ),
        )
    }

    #[test]
    fn test_added_field() {
        let old = Schema::record([("foo", Schema::int())]);
        let new = Schema::record([("foo", Schema::int()), ("bar", Schema::float())]);
        let diffs = diff(&old, &new).unwrap();
        assert_eq!(
            diffs,
            vec![Diff {
                path: vec![],
                atom: DiffAtom::AddField {
                    field: Field::new("bar", 1),
                    schema: Schema::float(),
                },
            }]
        );
        assert_eq!(diffs[0].to_string(), "<root>: added field bar@1: float");
        assert!(!is_read_compatible(&old, &new).unwrap());
    }

    #[test]
    fn test_removed_and_reordered_fields() {
        let old = Schema::record([("a", Schema::int()), ("b", Schema::int()), ("c", Schema::int())]);
        let new = Schema::record([("b", Schema::int()), ("a", Schema::int())]);
        let diffs = diff(&old, &new).unwrap();
        let atoms: Vec<_> = diffs.iter().map(|d| d.atom.clone()).collect();
        assert_eq!(
            atoms,
            vec![
                DiffAtom::UpdateField { old: Field::new("a", 0), new: Field::new("b", 0) },
                DiffAtom::UpdateField { old: Field::new("b", 1), new: Field::new("a", 1) },
                DiffAtom::RemoveField { field: Field::new("c", 2), schema: Schema::int() },
            ]
        );
    }

    #[test]
    fn test_nested_paths() {
        let old = Schema::record([("tags", Schema::list(Schema::tuple(vec![Schema::int(), Schema::string()])))]);
        let new = Schema::record([("tags", Schema::list(Schema::tuple(vec![Schema::int(), Schema::char()])))]);
        let diffs = diff(&old, &new).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, vec!["tags", "list", "f1"]);
        assert_eq!(diffs[0].atom, DiffAtom::Update { old: Schema::string(), new: Schema::char() });
    }

    #[test]
    fn test_tuple_arity_is_a_whole_node_update() {
        let old = Schema::tuple(vec![Schema::int()]);
        let new = Schema::tuple(vec![Schema::int(), Schema::int()]);
        let diffs = diff(&old, &new).unwrap();
        assert_eq!(diffs, vec![Diff { path: vec![], atom: DiffAtom::Update { old, new } }]);
    }

    #[test]
    fn test_recursive_change_reported_once() {
        let old = list_of(Name::new(1), Schema::int());
        let new = list_of(Name::new(2), Schema::float());
        let diffs = diff(&old, &new).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, vec!["Cons", "f0"]);
    }

    #[test]
    fn test_tagged_append_is_backward_compatible() {
        let old = Schema::variant(VariantKind::Tagged, [("Red", vec![]), ("Green", vec![])]);
        let new = Schema::variant(VariantKind::Tagged, [("Red", vec![]), ("Green", vec![]), ("Blue", vec![])]);
        let diffs = diff(&old, &new).unwrap();
        assert_eq!(diffs.len(), 1);
        assert!(matches!(
            &diffs[0].atom,
            DiffAtom::AddVariant { compatibility: Compatibility::BackwardCompatible, case, .. } if case.label == "Blue"
        ));
        assert!(is_read_compatible(&old, &new).unwrap());
        assert!(breaking_changes(&diffs).is_empty());
    }

    #[test]
    fn test_ordered_insert_breaks_but_append_does_not() {
        let old = Schema::variant(VariantKind::Ordered, [("A", vec![]), ("B", vec![])]);
        let appended = Schema::variant(VariantKind::Ordered, [("A", vec![]), ("B", vec![]), ("C", vec![])]);
        assert!(is_read_compatible(&old, &appended).unwrap());

        let inserted = Schema::variant(VariantKind::Ordered, [("A", vec![]), ("C", vec![]), ("B", vec![])]);
        let diffs = diff(&old, &inserted).unwrap();
        assert!(diffs.iter().any(|d| matches!(
            d.atom,
            DiffAtom::AddVariant { compatibility: Compatibility::Break, .. }
        )));
        assert!(!is_read_compatible(&old, &inserted).unwrap());
        assert!(!breaking_changes(&diffs).is_empty());
    }

    #[test]
    fn test_removed_case_is_breaking() {
        let old = Schema::variant(VariantKind::Tagged, [("A", vec![]), ("B", vec![Schema::int()])]);
        let new = Schema::variant(VariantKind::Tagged, [("A", vec![])]);
        let diffs = diff(&old, &new).unwrap();
        assert!(matches!(&diffs[0].atom, DiffAtom::RemoveVariant { case, .. } if case.label == "B"));
        assert!(!is_read_compatible(&old, &new).unwrap());
    }

    #[test]
    fn test_dangling_reference_is_rejected() {
        let err = diff(&Schema::back_ref(Name::new(5)), &Schema::int()).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRecursiveStructure { name, .. } if name == Name::new(5)));
    }

    #[test]
    fn test_empty_diff_iff_equivalent() {
        let samples = vec![
            Schema::int(),
            Schema::option(Schema::int()),
            Schema::record([("a", Schema::int())]),
            Schema::record([("a", Schema::int()), ("b", Schema::unit())]),
            list_of(Name::new(1), Schema::int()),
            list_of(Name::new(2), Schema::int()),
            Schema::variant(VariantKind::Tagged, [("X", vec![]), ("Y", vec![])]),
            Schema::variant(VariantKind::Tagged, [("Y", vec![]), ("X", vec![])]),
        ];
        for x in &samples {
            for y in &samples {
                assert_eq!(diff(x, y).unwrap().is_empty(), equivalent(x, y), "{} vs {}", x, y);
            }
        }
    }
}
