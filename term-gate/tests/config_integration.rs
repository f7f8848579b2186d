//! Loading configurations from disk and running them.

mod common;

use common::{engine_with, good};
use std::io::Write;
use term_gate::error::{GateError, SchemaError};
use term_gate::prelude::*;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/purchases_config.json");

#[test]
fn test_fixture_matches_builtin_purchases() {
    let loaded = ValidationConfig::from_path(FIXTURE).unwrap();
    assert_eq!(loaded, ValidationConfig::purchases());
}

#[test]
fn test_round_trip_through_file() {
    let config = ValidationConfig::purchases();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(config.to_json().unwrap().as_bytes()).unwrap();

    let loaded = ValidationConfig::from_path(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ValidationConfig::from_path(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, GateError::Io(_)));
}

#[test]
fn test_rule_on_unknown_column_fails_before_run() {
    let json = r#"{
        "schema": [{"name": "id", "type": {"kind": "integer"}}],
        "keys": {"completeness_key": ["id"], "uniqueness_key": ["id"]},
        "rules": [{
            "id": "store_length",
            "column": "store",
            "kind": {"type": "bounds", "check": {"length_range": {"max": 4}}}
        }]
    }"#;
    let config = ValidationConfig::from_json_str(json).unwrap();
    let err = ValidationPipeline::new(config).unwrap_err();
    assert!(matches!(
        err.as_schema(),
        Some(SchemaError::UnknownColumn { column, .. }) if column == "store"
    ));
}

#[test]
fn test_completeness_rule_in_rule_set_is_rejected() {
    let json = r#"{
        "schema": [{"name": "id", "type": {"kind": "integer"}}],
        "keys": {"completeness_key": ["id"], "uniqueness_key": ["id"]},
        "rules": [{"id": "ids", "column": "id", "kind": {"type": "completeness"}}]
    }"#;
    let config = ValidationConfig::from_json_str(json).unwrap();
    assert!(matches!(
        config.validate().unwrap_err().as_schema(),
        Some(SchemaError::MisplacedRule { .. })
    ));
}

#[tokio::test]
async fn test_loaded_config_runs() {
    let config = ValidationConfig::from_path(FIXTURE).unwrap();
    let pipeline = ValidationPipeline::new(config).unwrap();
    let (engine, data) = engine_with(&[good("1"), good("2"), good("2")]);

    let (_, report) = pipeline.run(&engine, &data).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.final_row_count, 2);

    let json = JsonFormatter::new().format(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["final_state"], "completed");
    assert_eq!(value["entries"].as_array().map(Vec::len), Some(8));
}
