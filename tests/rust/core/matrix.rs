//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Ladle.
//! The Ladle project belongs to the Dunimd project team.

use std::sync::atomic::{AtomicUsize, Ordering};

use ladle::custom::{LdCustomOutput, LdFunctionRegistry, LdFunctionSignature};
use ladle::dataset::LdDataset;
use ladle::errors::{LdError, LdErrorKind};
use ladle::matrix::{candidate_values, expand, LdMatrixExecutor, LdMatrixStrategy};
use serde_json::{json, Value};

fn pairs(bindings: &[ladle::LdBindings]) -> Vec<(Value, Value)> {
    bindings
        .iter()
        .map(|binding| (binding["x"].clone(), binding["y"].clone()))
        .collect()
}

#[test]
fn test_permutations_and_loop() {
    let variables = json!({"x": [1, 2], "y": [10, 20]});
    let variables = variables.as_object().unwrap();
    let registry = LdFunctionRegistry::new();

    let permutations =
        expand(variables, LdMatrixStrategy::Permutations, None, &registry).unwrap();
    assert_eq!(
        pairs(&permutations),
        vec![
            (json!(1), json!(10)),
            (json!(1), json!(20)),
            (json!(2), json!(10)),
            (json!(2), json!(20)),
        ]
    );

    let looped = expand(variables, LdMatrixStrategy::Loop, None, &registry).unwrap();
    assert_eq!(
        pairs(&looped),
        vec![(json!(1), json!(10)), (json!(2), json!(20))]
    );
}

#[test]
fn test_strategy_parse() {
    assert_eq!(LdMatrixStrategy::parse(None).unwrap(), LdMatrixStrategy::Loop);
    assert_eq!(
        LdMatrixStrategy::parse(Some(&json!("Permutations"))).unwrap(),
        LdMatrixStrategy::Permutations
    );
    assert!(LdMatrixStrategy::parse(Some(&json!("zip"))).is_err());
}

#[test]
fn test_set_draws_unique_column_values() {
    let dataset = LdDataset::from_columns(vec![(
        "region".to_string(),
        vec![json!("north"), json!("south"), json!("north")],
    )])
    .unwrap();
    let values = candidate_values(
        &json!("set(region)"),
        Some(&dataset),
        &LdFunctionRegistry::new(),
    )
    .unwrap();
    assert_eq!(values, vec![json!("north"), json!("south")]);
}

#[test]
fn test_dir_lists_sorted_entries_with_prefix() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.csv"), "x").unwrap();
    std::fs::write(dir.path().join("a.csv"), "x").unwrap();
    let path = dir.path().to_string_lossy().into_owned();

    let values = candidate_values(
        &json!(format!("dir({path})")),
        None,
        &LdFunctionRegistry::new(),
    )
    .unwrap();
    let expected: Vec<Value> = ["a.csv", "b.csv"]
        .iter()
        .map(|name| json!(dir.path().join(name).to_string_lossy()))
        .collect();
    assert_eq!(values, expected);
}

#[test]
fn test_custom_candidates_and_scalars() {
    let mut registry = LdFunctionRegistry::new();
    registry.register("regions", LdFunctionSignature::row(&[]), |_| {
        Ok(LdCustomOutput::Value(json!(["east", "west"])))
    });
    assert_eq!(
        candidate_values(&json!("custom.regions"), None, &registry).unwrap(),
        vec![json!("east"), json!("west")]
    );
    assert_eq!(
        candidate_values(&json!("plain"), None, &registry).unwrap(),
        vec![json!("plain")]
    );
    assert_eq!(
        candidate_values(&json!(7), None, &registry).unwrap(),
        vec![json!(7)]
    );
}

#[test]
fn test_executor_keeps_binding_order() {
    let variables = json!({"n": [1, 2, 3, 4, 5, 6, 7, 8]});
    let bindings = expand(
        variables.as_object().unwrap(),
        LdMatrixStrategy::Loop,
        None,
        &LdFunctionRegistry::new(),
    )
    .unwrap();

    let executor = LdMatrixExecutor::new(3);
    let results = executor
        .run(bindings, |binding| {
            Ok(binding["n"].as_i64().unwrap_or_default() * 10)
        })
        .unwrap();
    assert_eq!(results, vec![10, 20, 30, 40, 50, 60, 70, 80]);
}

#[test]
fn test_executor_waits_for_all_then_reports_first_error() {
    let variables = json!({"n": [1, 2, 3, 4]});
    let bindings = expand(
        variables.as_object().unwrap(),
        LdMatrixStrategy::Loop,
        None,
        &LdFunctionRegistry::new(),
    )
    .unwrap();

    let finished = AtomicUsize::new(0);
    let err = LdMatrixExecutor::new(2)
        .run(bindings, |binding| {
            finished.fetch_add(1, Ordering::SeqCst);
            match binding["n"].as_i64() {
                Some(n) if n >= 2 => Err(LdError::validation(format!("failed {n}"))),
                _ => Ok(()),
            }
        })
        .unwrap_err();

    assert_eq!(finished.load(Ordering::SeqCst), 4);
    assert!(matches!(err.kind(), LdErrorKind::Validation { message } if message == "failed 2"));
}

#[test]
fn test_zero_workers_still_runs() {
    assert_eq!(LdMatrixExecutor::new(0).workers(), 1);
}
