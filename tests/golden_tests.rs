//! Golden Tests for Versioned Schemas
//!
//! Loads hand-written wire fixtures of every version and checks how the
//! algebra treats them.

use std::fs;
use std::path::Path;
use std::process::Command;

use shape_schemas::diff::Compatibility;
use shape_schemas::runtime::Repr;
use shape_schemas::{
    breaking_changes, change_version, diff, equivalent, is_read_compatible, materialize, merge,
    reduce, serialize, unserialize, Checksum, CompatibilityChecker, DiffAtom, Schema,
    SchemaError, Versioned, WireVersion,
};

fn load(json: &str) -> Versioned {
    Versioned::from_json(json).unwrap()
}

fn schema(json: &str) -> Schema {
    unserialize(&load(json))
}

fn fixtures_path() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").leak()
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn test_fixture_versions() {
    assert_eq!(load(include_str!("fixtures/person_v1.json")).version(), WireVersion::V1);
    assert_eq!(load(include_str!("fixtures/int_list_v2.json")).version(), WireVersion::V2);
    assert_eq!(load(include_str!("fixtures/color_v3.json")).version(), WireVersion::V3);
    assert_eq!(load(include_str!("fixtures/counter_v4.json")).version(), WireVersion::V4);
    assert_eq!(load(include_str!("fixtures/int_list_v5.json")).version(), WireVersion::V5);
}

#[test]
fn test_same_shape_across_versions() {
    let v2 = schema(include_str!("fixtures/int_list_v2.json"));
    let v5 = schema(include_str!("fixtures/int_list_v5.json"));
    assert!(equivalent(&v2, &v5));
    assert_eq!(v2.to_string(), "#1=[ Nil | Cons of int * #1 ]");
    assert_eq!(
        Checksum::of_schema(&v2).unwrap(),
        Checksum::of_schema(&v5).unwrap()
    );
}

#[test]
fn test_upgrade_fills_metadata_defaults() {
    let v2 = load(include_str!("fixtures/int_list_v2.json"));
    let upgraded = change_version(&v2, WireVersion::V5).unwrap();
    let Versioned::V5(upgraded) = upgraded else {
        panic!("Expected v5 value");
    };
    let expected = schema(include_str!("fixtures/int_list_v5.json"));
    assert!(equivalent(&upgraded, &expected));
}

// =============================================================================
// Evolution
// =============================================================================

#[test]
fn test_added_field_breaks_readers() {
    let old = schema(include_str!("fixtures/person_v1.json"));
    let new = schema(include_str!("fixtures/person_v3.json"));

    let changes = diff(&old, &new).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0].atom, DiffAtom::AddField { field, .. } if field.label == "email"));
    assert_eq!(breaking_changes(&changes).len(), 1);
    assert!(!is_read_compatible(&old, &new).unwrap());
}

#[test]
fn test_appended_tagged_case_keeps_readers() {
    let old = schema(include_str!("fixtures/color_v3.json"));
    let new = schema(include_str!("fixtures/color_v4.json"));

    let changes = diff(&old, &new).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(matches!(
        &changes[0].atom,
        DiffAtom::AddVariant { compatibility: Compatibility::BackwardCompatible, case, .. } if case.label == "Blue"
    ));
    assert!(is_read_compatible(&old, &new).unwrap());
    assert!(!is_read_compatible(&new, &old).unwrap());

    let result = CompatibilityChecker::new().check(&old, &new).unwrap();
    assert!(result.is_compatible);
}

#[test]
fn test_merge_of_versions_reads_both() {
    let old = schema(include_str!("fixtures/color_v3.json"));
    let new = schema(include_str!("fixtures/color_v4.json"));
    let merged = merge(&old, &new).unwrap();
    assert!(equivalent(&merged, &new));
    assert!(is_read_compatible(&old, &merged).unwrap());
    assert!(is_read_compatible(&new, &merged).unwrap());
}

#[test]
fn test_merge_of_conflicting_records_fails() {
    let old = schema(include_str!("fixtures/person_v1.json"));
    let new = schema(include_str!("fixtures/person_v3.json"));
    assert!(matches!(merge(&old, &new), Err(SchemaError::TypesConflict { .. })));
}

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn test_downgrade_refuses_mutable_fields() {
    let counter = load(include_str!("fixtures/counter_v4.json"));
    match change_version(&counter, WireVersion::V3) {
        Err(SchemaError::NotDowngradable { version, reason }) => {
            assert_eq!(version, WireVersion::V3);
            assert!(reason.contains("hits"));
        }
        other => panic!("Expected downgrade failure, got {:?}", other),
    }
}

#[test]
fn test_reduced_schema_survives_every_sharing_version() {
    let point = Schema::record([("x", Schema::float()), ("y", Schema::float())]);
    let segment = reduce(&Schema::tuple(vec![point.clone(), point]));
    for version in [WireVersion::V2, WireVersion::V3, WireVersion::V4, WireVersion::V5] {
        let encoded = serialize(&segment, version).unwrap();
        let decoded = unserialize(&Versioned::from_json(&encoded.to_json().unwrap()).unwrap());
        assert_eq!(decoded, segment);
    }
    assert!(serialize(&segment, WireVersion::V1).is_err());
}

#[test]
fn test_materialize_fixture() {
    let list = schema(include_str!("fixtures/int_list_v5.json"));
    let handle = materialize(&list).unwrap();
    let Repr::Variant { cases, .. } = handle.get(handle.root()) else {
        panic!("Expected variant");
    };
    assert_eq!(cases[1].0, "Cons");
    assert_eq!(cases[1].2[1], handle.root());
}

// =============================================================================
// CLI
// =============================================================================

fn shapes(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_shapes"))
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_cli_check_exit_codes() {
    let fixtures = fixtures_path();
    let dir = tempfile::tempdir().unwrap();

    let breaking = shapes(
        dir.path(),
        &[
            "check",
            fixtures.join("person_v1.json").to_str().unwrap(),
            fixtures.join("person_v3.json").to_str().unwrap(),
        ],
    );
    assert_eq!(breaking.status.code(), Some(2));

    let compatible = shapes(
        dir.path(),
        &[
            "check",
            fixtures.join("color_v3.json").to_str().unwrap(),
            fixtures.join("color_v4.json").to_str().unwrap(),
        ],
    );
    assert_eq!(compatible.status.code(), Some(0));
}

#[test]
fn test_cli_convert() {
    let fixtures = fixtures_path();
    let dir = tempfile::tempdir().unwrap();
    let output = shapes(
        dir.path(),
        &[
            "--format",
            "compact",
            "convert",
            fixtures.join("int_list_v5.json").to_str().unwrap(),
            "--to",
            "v2",
        ],
    );
    assert!(output.status.success());
    let converted = load(String::from_utf8(output.stdout).unwrap().trim());
    assert_eq!(converted.version(), WireVersion::V2);
    assert!(equivalent(
        &unserialize(&converted),
        &schema(include_str!("fixtures/int_list_v2.json"))
    ));
}

#[test]
fn test_cli_history() {
    let dir = tempfile::tempdir().unwrap();
    let history = dir.path().join("colors");
    fs::create_dir(&history).unwrap();
    fs::write(history.join("001.json"), include_str!("fixtures/color_v3.json")).unwrap();
    fs::write(history.join("002.json"), include_str!("fixtures/color_v4.json")).unwrap();
    fs::write(history.join("notes.txt"), "ignored").unwrap();

    let output = shapes(dir.path(), &["history", "colors"]);
    assert_eq!(output.status.code(), Some(0));

    fs::write(history.join("003.json"), include_str!("fixtures/color_v3.json")).unwrap();
    let output = shapes(dir.path(), &["history", "colors"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_history_orders_unpadded_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let history = dir.path().join("colors");
    fs::create_dir(&history).unwrap();
    fs::write(history.join("2.json"), include_str!("fixtures/color_v3.json")).unwrap();
    fs::write(history.join("10.json"), include_str!("fixtures/color_v4.json")).unwrap();

    let output = shapes(dir.path(), &["history", "colors"]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_cli_history_reports_walk_errors() {
    let dir = tempfile::tempdir().unwrap();
    let output = shapes(dir.path(), &["history", "missing"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stderr).unwrap().contains("Failed to walk missing"));
}

#[test]
fn test_cli_rejects_unknown_format() {
    let fixtures = fixtures_path();
    let dir = tempfile::tempdir().unwrap();
    let output = shapes(
        dir.path(),
        &["--format", "yaml", "reduce", fixtures.join("int_list_v5.json").to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8(output.stderr).unwrap().contains("pretty"));
}
