//! Generic structure-preserving traversal
//!
//! `iterate` hands each immediate child to a visitor and leaves recursion to
//! the caller. `transform` rebuilds bottom-up and hands back the original
//! node whenever nothing beneath it changed.

use std::convert::Infallible;

use crate::schema::{Schema, Shape};

/// Visit each immediate child of `node`
pub fn iterate(node: &Schema, mut visit: impl FnMut(&Schema)) {
    match node.shape() {
        Shape::Option(inner)
        | Shape::List(inner)
        | Shape::Array(inner)
        | Shape::Lazy(inner)
        | Shape::Ref(inner)
        | Shape::Named(_, Some(inner)) => visit(inner),
        Shape::Tuple(elems) => elems.iter().for_each(visit),
        Shape::Record { fields, .. } => fields.iter().for_each(|(_, schema)| visit(schema)),
        Shape::Variant { cases, .. } => cases
            .iter()
            .flat_map(|(_, args)| args.iter())
            .for_each(visit),
        _ => {}
    }
}

/// Rebuild `node` with each immediate child replaced by `f(child)`.
///
/// Returns `node` itself when every child comes back unchanged.
pub fn try_map_children<E>(
    node: &Schema,
    mut f: impl FnMut(&Schema) -> Result<Schema, E>,
) -> Result<Schema, E> {
    let mut changed = false;
    let mut step = |child: &Schema| -> Result<Schema, E> {
        let next = f(child)?;
        changed |= !next.ptr_eq(child);
        Ok(next)
    };

    let rebuilt = match node.shape() {
        Shape::Option(inner) => Shape::Option(step(inner)?),
        Shape::List(inner) => Shape::List(step(inner)?),
        Shape::Array(inner) => Shape::Array(step(inner)?),
        Shape::Lazy(inner) => Shape::Lazy(step(inner)?),
        Shape::Ref(inner) => Shape::Ref(step(inner)?),
        Shape::Tuple(elems) => Shape::Tuple(elems.iter().map(&mut step).collect::<Result<_, E>>()?),
        Shape::Record { meta, fields } => Shape::Record {
            meta: *meta,
            fields: fields
                .iter()
                .map(|(field, schema)| -> Result<_, E> { Ok((field.clone(), step(schema)?)) })
                .collect::<Result<_, E>>()?,
        },
        Shape::Variant { meta, cases } => Shape::Variant {
            meta: *meta,
            cases: cases
                .iter()
                .map(|(case, args)| -> Result<_, E> {
                    let args = args.iter().map(&mut step).collect::<Result<_, E>>()?;
                    Ok((case.clone(), args))
                })
                .collect::<Result<_, E>>()?,
        },
        Shape::Named(name, Some(content)) => Shape::Named(*name, Some(step(content)?)),
        _ => return Ok(node.clone()),
    };

    Ok(if changed { Schema::new(rebuilt) } else { node.clone() })
}

pub fn map_children(node: &Schema, mut f: impl FnMut(&Schema) -> Schema) -> Schema {
    match try_map_children(node, |child| Ok::<_, Infallible>(f(child))) {
        Ok(schema) => schema,
        Err(never) => match never {},
    }
}

/// Bottom-up rebuild: children first, then `f` on the rebuilt node
pub fn try_transform<E>(
    node: &Schema,
    f: &mut impl FnMut(Schema) -> Result<Schema, E>,
) -> Result<Schema, E> {
    let rebuilt = try_map_children(node, |child| try_transform(child, &mut *f))?;
    f(rebuilt)
}

pub fn transform(node: &Schema, f: &mut impl FnMut(Schema) -> Schema) -> Schema {
    match try_transform(node, &mut |schema| Ok::<_, Infallible>(f(schema))) {
        Ok(schema) => schema,
        Err(never) => match never {},
    }
}

/// Whether `pred` holds for `node` or any node beneath it
pub fn any(node: &Schema, pred: &mut impl FnMut(&Schema) -> bool) -> bool {
    if pred(node) {
        return true;
    }
    let mut found = false;
    iterate(node, |child| {
        if !found {
            found = any(child, &mut *pred);
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VariantKind;

    fn sample() -> Schema {
        Schema::record([
            ("id", Schema::int()),
            ("tags", Schema::list(Schema::string())),
            (
                "state",
                Schema::variant(VariantKind::Ordered, [("On", vec![]), ("Off", vec![Schema::float()])]),
            ),
        ])
    }

    #[test]
    fn test_iterate_visits_immediate_children_only() {
        let mut seen = Vec::new();
        iterate(&sample(), |child| seen.push(child.kind_name()));
        assert_eq!(seen, vec!["int", "list", "variant"]);

        let mut count = 0;
        iterate(&Schema::int(), |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_identity_transform_preserves_reference() {
        let schema = sample();
        let same = transform(&schema, &mut |node| node);
        assert!(same.ptr_eq(&schema));
    }

    #[test]
    fn test_transform_rebuilds_changed_path_only() {
        let schema = sample();
        let rewritten = transform(&schema, &mut |node| match node.shape() {
            Shape::Float => Schema::int64(),
            _ => node,
        });
        assert!(!rewritten.ptr_eq(&schema));
        assert_eq!(
            rewritten.to_string(),
            "{ id: int; tags: list<string>; state: [ On | Off of int64 ] }"
        );

        let (Shape::Record { fields: before, .. }, Shape::Record { fields: after, .. }) =
            (schema.shape(), rewritten.shape())
        else {
            panic!("Expected records");
        };
        assert!(before[1].1.ptr_eq(&after[1].1));
        assert!(!before[2].1.ptr_eq(&after[2].1));
    }

    #[test]
    fn test_try_transform_stops_on_error() {
        let result = try_transform(&sample(), &mut |node| match node.shape() {
            Shape::String => Err("string"),
            _ => Ok(node),
        });
        assert_eq!(result.unwrap_err(), "string");
    }

    #[test]
    fn test_any() {
        assert!(any(&sample(), &mut |node| matches!(node.shape(), Shape::Float)));
        assert!(!any(&sample(), &mut |node| matches!(node.shape(), Shape::Char)));
    }
}
