//! Coinductive structural equality up to renaming
//!
//! Two schemas are equivalent when they unfold to the same infinite tree.
//! Pairs of named nodes already under comparison are assumed equivalent,
//! which lets comparison of recursive schemas terminate.

use std::collections::HashMap;

use crate::name::Name;
use crate::named::Bindings;
use crate::schema::{Case, Schema, Shape, VariantKind};

/// Whether `a` and `b` describe the same shape, regardless of naming and sharing
pub fn equivalent(a: &Schema, b: &Schema) -> bool {
    Equivalence::new(a, b).check(a, b)
}

/// Status of a pair of named nodes. Pairs never compared have no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PairStatus<T> {
    InProgress(T),
    Done(T),
}

struct Equivalence {
    left: Bindings,
    right: Bindings,
    pairs: HashMap<(Name, Name), PairStatus<bool>>,
    /// Back-references bound on neither side must pair up one to one
    opaque_left: HashMap<Name, Name>,
    opaque_right: HashMap<Name, Name>,
}

impl Equivalence {
    fn new(a: &Schema, b: &Schema) -> Self {
        Self {
            left: Bindings::collect_lenient(a),
            right: Bindings::collect_lenient(b),
            pairs: HashMap::new(),
            opaque_left: HashMap::new(),
            opaque_right: HashMap::new(),
        }
    }

    fn check(&mut self, a: &Schema, b: &Schema) -> bool {
        match (a.shape(), b.shape()) {
            (Shape::Named(x, _), Shape::Named(y, _)) => self.check_named(*x, a, *y, b),
            (Shape::Named(..), _) => match self.left.unfold(a) {
                Some(a) => self.check(&a, b),
                None => false,
            },
            (_, Shape::Named(..)) => match self.right.unfold(b) {
                Some(b) => self.check(a, &b),
                None => false,
            },
            (sa, sb) if sa.is_atom() => sa == sb,
            (Shape::Tuple(xs), Shape::Tuple(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.check(x, y))
            }
            (
                Shape::Record { meta: ma, fields: fa },
                Shape::Record { meta: mb, fields: fb },
            ) => {
                ma == mb
                    && fa.len() == fb.len()
                    && fa.iter().zip(fb).all(|((fx, x), (fy, y))| {
                        fx.same_identity(fy) && self.check(x, y)
                    })
            }
            (
                Shape::Variant { meta: ma, cases: ca },
                Shape::Variant { meta: mb, cases: cb },
            ) => ma == mb && self.check_cases(ma.kind, ca, cb),
            (sa, sb) => match (sa.as_wrapper(), sb.as_wrapper()) {
                (Some((wa, x)), Some((wb, y))) => wa == wb && self.check(x, y),
                _ => false,
            },
        }
    }

    fn check_named(&mut self, x: Name, a: &Schema, y: Name, b: &Schema) -> bool {
        match self.pairs.get(&(x, y)) {
            Some(PairStatus::InProgress(_)) => return true,
            Some(PairStatus::Done(result)) => return *result,
            None => {}
        }
        let result = match (self.left.content_of(a), self.right.content_of(b)) {
            (Some(ca), Some(cb)) => {
                self.pairs.insert((x, y), PairStatus::InProgress(true));
                self.check(&ca, &cb)
            }
            (None, None) => self.check_opaque(x, y),
            _ => false,
        };
        self.pairs.insert((x, y), PairStatus::Done(result));
        result
    }

    fn check_opaque(&mut self, x: Name, y: Name) -> bool {
        let paired_right = *self.opaque_left.entry(x).or_insert(y);
        let paired_left = *self.opaque_right.entry(y).or_insert(x);
        paired_right == y && paired_left == x
    }

    fn check_cases(&mut self, kind: VariantKind, ca: &[Case], cb: &[Case]) -> bool {
        if ca.len() != cb.len() {
            return false;
        }
        let xs = normalized_cases(kind, ca);
        let ys = normalized_cases(kind, cb);
        xs.iter().zip(&ys).all(|((cx, ax), (cy, ay))| {
            cx.same_case(cy)
                && ax.len() == ay.len()
                && ax.iter().zip(ay).all(|(x, y)| self.check(x, y))
        })
    }
}

/// Cases in comparison order: declared order for ordered sets, by label for tagged ones
pub(crate) fn normalized_cases(kind: VariantKind, cases: &[Case]) -> Vec<&Case> {
    let mut sorted: Vec<&Case> = cases.iter().collect();
    if kind == VariantKind::Tagged {
        sorted.sort_by(|a, b| a.0.label.cmp(&b.0.label));
    }
    sorted
}
