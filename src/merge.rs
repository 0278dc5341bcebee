//! Least upper bound of two schemas
//!
//! Merging unifies two independently observed versions of one evolving shape
//! into a schema both can be decoded as. Named pairs follow the same
//! in-progress/done discipline as equivalence, except that a merged name is
//! minted as soon as a pair is first met so that self-references inside the
//! pair resolve to it.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::equivalence::PairStatus;
use crate::error::{Result, SchemaError};
use crate::name::Name;
use crate::named::{alpha_convert, standalone, Bindings};
use crate::schema::{Case, Field, Schema, Shape, VariantCase, VariantKind, VariantMeta};

/// Join `a` and `b`, failing with a typed conflict when they disagree
pub fn merge(a: &Schema, b: &Schema) -> Result<Schema> {
    let mut merger = Merger {
        left: Bindings::collect(a)?,
        right: Bindings::collect(b)?,
        pairs: HashMap::new(),
    };
    merger.node(a, b)
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

struct Merger {
    left: Bindings,
    right: Bindings,
    /// Merged name of each pair of named nodes met so far
    pairs: HashMap<(Name, Name), PairStatus<Name>>,
}

fn conflict(a: &Schema, b: &Schema) -> SchemaError {
    debug!(left = %a, right = %b, "merge conflict");
    SchemaError::types_conflict(a, b)
}

impl Merger {
    fn node(&mut self, a: &Schema, b: &Schema) -> Result<Schema> {
        match (a.shape(), b.shape()) {
            (Shape::Named(x, _), Shape::Named(y, _)) => self.named(*x, a, *y, b),
            (Shape::Named(x, _), _) => {
                let a = self.left.unfold(a).ok_or_else(|| SchemaError::dangling(*x))?;
                self.node(&a, b)
            }
            (_, Shape::Named(y, _)) => {
                let b = self.right.unfold(b).ok_or_else(|| SchemaError::dangling(*y))?;
                self.node(a, &b)
            }
            (sa, sb) if sa.is_atom() => {
                if sa == sb {
                    Ok(a.clone())
                } else {
                    Err(conflict(a, b))
                }
            }
            (Shape::Tuple(xs), Shape::Tuple(ys)) => {
                if xs.len() != ys.len() {
                    return Err(conflict(a, b));
                }
                let elems = xs
                    .iter()
                    .zip(ys)
                    .map(|(x, y)| self.node(x, y))
                    .collect::<Result<_>>()?;
                Ok(Schema::tuple(elems))
            }
            (
                Shape::Record { meta: ma, fields: fa },
                Shape::Record { meta: mb, fields: fb },
            ) => {
                if ma != mb || fa.len() != fb.len() {
                    return Err(conflict(a, b));
                }
                let mut fields = Vec::with_capacity(fa.len());
                for ((fx, x), (fy, y)) in fa.iter().zip(fb) {
                    if !fx.same_identity(fy) {
                        debug!(left = %fx, right = %fy, "field conflict");
                        return Err(SchemaError::FieldConflict {
                            left_field: fx.clone(),
                            right_field: fy.clone(),
                            left: a.clone(),
                            right: b.clone(),
                        });
                    }
                    let field = Field {
                        mutable: fx.mutable || fy.mutable,
                        ..fx.clone()
                    };
                    fields.push((field, self.node(x, y)?));
                }
                Ok(Schema::record_with(*ma, fields))
            }
            (
                Shape::Variant { meta: ma, cases: ca },
                Shape::Variant { meta: mb, cases: cb },
            ) => {
                if ma != mb {
                    return Err(conflict(a, b));
                }
                let cases = match ma.kind {
                    VariantKind::Tagged => self.tagged(ca, cb),
                    VariantKind::Ordered => self.ordered(ca, cb),
                }
                .ok_or_else(|| conflict(a, b))??;
                Ok(Schema::variant_with(VariantMeta { kind: ma.kind }, cases))
            }
            (sa, sb) => match (sa.as_wrapper(), sb.as_wrapper()) {
                (Some((wa, x)), Some((wb, y))) if wa == wb => Ok(wa.wrap(self.node(x, y)?)),
                _ => Err(conflict(a, b)),
            },
        }
    }

    fn named(&mut self, x: Name, a: &Schema, y: Name, b: &Schema) -> Result<Schema> {
        if let Some(PairStatus::InProgress(merged) | PairStatus::Done(merged)) = self.pairs.get(&(x, y)) {
            return Ok(Schema::back_ref(*merged));
        }
        let ca = self.left.content_of(a).ok_or_else(|| SchemaError::dangling(x))?;
        let cb = self.right.content_of(b).ok_or_else(|| SchemaError::dangling(y))?;
        let merged = Name::fresh();
        self.pairs.insert((x, y), PairStatus::InProgress(merged));
        let content = self.node(&ca, &cb)?;
        self.pairs.insert((x, y), PairStatus::Done(merged));
        Ok(Schema::bound(merged, content))
    }

    /// Merge one case present on both sides; `None` when the cases disagree
    fn shared_case(&mut self, (cx, xs): &Case, (cy, ys): &Case) -> Option<Result<Vec<Schema>>> {
        if !cx.same_case(cy) || xs.len() != ys.len() {
            return None;
        }
        Some(xs.iter().zip(ys).map(|(x, y)| self.node(x, y)).collect())
    }

    /// Union keyed by representation tag; one-sided cases get trailing indices
    fn tagged(&mut self, ca: &[Case], cb: &[Case]) -> Option<Result<Vec<Case>>> {
        let by_tag: HashMap<i64, &Case> = cb.iter().map(|c| (c.0.repr_tag, c)).collect();
        let left_tags: HashSet<i64> = ca.iter().map(|c| c.0.repr_tag).collect();
        let mut merged: Vec<Case> = Vec::with_capacity(ca.len().max(cb.len()));

        for left in ca {
            let args = match by_tag.get(&left.0.repr_tag) {
                Some(right) => match self.shared_case(left, right)? {
                    Ok(args) => args,
                    Err(err) => return Some(Err(err)),
                },
                None => match self.carry_args(Side::Left, &left.1) {
                    Ok(args) => args,
                    Err(err) => return Some(Err(err)),
                },
            };
            let case = VariantCase {
                index: merged.len(),
                ..left.0.clone()
            };
            merged.push((case, args));
        }
        for right in cb.iter().filter(|c| !left_tags.contains(&c.0.repr_tag)) {
            let args = match self.carry_args(Side::Right, &right.1) {
                Ok(args) => args,
                Err(err) => return Some(Err(err)),
            };
            let case = VariantCase {
                index: merged.len(),
                ..right.0.clone()
            };
            merged.push((case, args));
        }
        Some(Ok(merged))
    }

    /// One side must be a prefix of the other; the longer tail is appended
    fn ordered(&mut self, ca: &[Case], cb: &[Case]) -> Option<Result<Vec<Case>>> {
        let shared = ca.len().min(cb.len());
        let mut merged: Vec<Case> = Vec::with_capacity(ca.len().max(cb.len()));
        for (left, right) in ca.iter().zip(cb) {
            match self.shared_case(left, right)? {
                Ok(args) => merged.push((left.0.clone(), args)),
                Err(err) => return Some(Err(err)),
            }
        }
        let (side, tail) = if ca.len() > shared {
            (Side::Left, &ca[shared..])
        } else {
            (Side::Right, &cb[shared..])
        };
        for (case, args) in tail {
            match self.carry_args(side, args) {
                Ok(args) => merged.push((case.clone(), args)),
                Err(err) => return Some(Err(err)),
            }
        }
        Some(Ok(merged))
    }

    /// Copy one-sided payloads into the result.
    ///
    /// Their back-references may point at bindings the merged tree renamed, so
    /// each payload is made self-contained against its own side and given
    /// fresh names.
    fn carry_args(&self, side: Side, args: &[Schema]) -> Result<Vec<Schema>> {
        let bindings = match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        };
        args.iter()
            .map(|arg| {
                let resolved = standalone(arg, bindings.as_map()).map_err(|err| match err {
                    SchemaError::UnresolvedRecursiveName(name) => SchemaError::dangling(name),
                    other => other,
                })?;
                Ok(alpha_convert(&resolved))
            })
            .collect()
    }
}
