//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Ladle.
//! The Ladle project belongs to the Dunimd project team.

use std::sync::{Arc, Mutex};

use ladle::custom::{
    call_with_params, invoke, LdCustomOutput, LdFunctionRegistry, LdFunctionSignature,
};
use ladle::dataset::LdDataset;
use ladle::errors::{LdError, LdErrorKind};
use serde_json::{json, Map, Value};

fn sample() -> LdDataset {
    LdDataset::from_columns(vec![
        ("first name".to_string(), vec![json!("ada"), json!("alan")]),
        ("score".to_string(), vec![json!(3), json!(5)]),
    ])
    .unwrap()
}

fn params(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_row_mode_binds_declared_columns_and_alias() {
    let mut registry = LdFunctionRegistry::new();
    registry.register(
        "greet",
        LdFunctionSignature::row(&["first_name", "greeting"]),
        |args| {
            assert!(!args.kwargs.contains_key("score"));
            let name = args.kwargs["first_name"].as_str().unwrap_or_default().to_string();
            let greeting = args.kwargs["greeting"].as_str().unwrap_or_default().to_string();
            Ok(LdCustomOutput::Value(json!(format!("{greeting} {name}"))))
        },
    );
    let function = registry.get("greet").unwrap();
    let result = invoke(
        function,
        &sample(),
        &params(json!({"output": "message", "greeting": "hi", "ignored": 1})),
    )
    .unwrap();

    assert_eq!(result.cell("message", 0), Some(&json!("hi ada")));
    assert_eq!(result.cell("message", 1), Some(&json!("hi alan")));
}

#[test]
fn test_open_signature_receives_everything() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let mut registry = LdFunctionRegistry::new();
    registry.register("collect", LdFunctionSignature::row(&[]).open(), move |args| {
        let mut keys: Vec<String> = args.kwargs.keys().cloned().collect();
        keys.sort();
        recorder.lock().unwrap().push(keys);
        Ok(LdCustomOutput::Value(json!(true)))
    });
    invoke(
        registry.get("collect").unwrap(),
        &sample(),
        &params(json!({"output": "flag", "extra": 1})),
    )
    .unwrap();

    assert_eq!(seen.lock().unwrap()[0], vec!["extra", "first name", "score"]);
}

#[test]
fn test_step_params_win_over_columns() {
    let mut registry = LdFunctionRegistry::new();
    registry.register("pick", LdFunctionSignature::row(&["score"]), |args| {
        Ok(LdCustomOutput::Value(args.kwargs["score"].clone()))
    });
    let result = invoke(
        registry.get("pick").unwrap(),
        &sample(),
        &params(json!({"input": "score", "output": "picked", "score": 99})),
    )
    .unwrap();
    assert_eq!(result.column("picked").unwrap(), &[json!(99), json!(99)]);
}

#[test]
fn test_output_defaults_to_input() {
    let mut registry = LdFunctionRegistry::new();
    registry.register("double", LdFunctionSignature::row(&["score"]), |args| {
        let score = args.kwargs["score"].as_i64().unwrap_or_default();
        Ok(LdCustomOutput::Value(json!(score * 2)))
    });
    let result = invoke(
        registry.get("double").unwrap(),
        &sample(),
        &params(json!({"input": "score"})),
    )
    .unwrap();
    assert_eq!(result.column("score").unwrap(), &[json!(6), json!(10)]);
}

#[test]
fn test_multiple_outputs_take_list_positions() {
    let mut registry = LdFunctionRegistry::new();
    registry.register("split", LdFunctionSignature::row(&["score"]), |args| {
        let score = args.kwargs["score"].as_i64().unwrap_or_default();
        Ok(LdCustomOutput::Value(json!([score, score + 1])))
    });
    let result = invoke(
        registry.get("split").unwrap(),
        &sample(),
        &params(json!({"input": "score", "output": ["low", "high"]})),
    )
    .unwrap();
    assert_eq!(result.cell("high", 1), Some(&json!(6)));

    registry.register("short", LdFunctionSignature::row(&["score"]), |_| {
        Ok(LdCustomOutput::Value(json!([1])))
    });
    let err = invoke(
        registry.get("short").unwrap(),
        &sample(),
        &params(json!({"input": "score", "output": ["low", "high"]})),
    )
    .unwrap_err();
    assert!(matches!(
        err.kind(),
        LdErrorKind::CustomFunctionContractViolation { .. }
    ));
}

#[test]
fn test_failing_row_call_falls_back_to_params() {
    let mut registry = LdFunctionRegistry::new();
    registry.register(
        "fallback",
        LdFunctionSignature::row(&["score", "default"]),
        |args| {
            if args.kwargs.contains_key("score") {
                return Err(LdError::validation("cannot use score"));
            }
            Ok(LdCustomOutput::Value(args.kwargs["default"].clone()))
        },
    );
    let result = invoke(
        registry.get("fallback").unwrap(),
        &sample(),
        &params(json!({"input": "score", "output": "out", "default": "n/a"})),
    )
    .unwrap();
    assert_eq!(result.cell("out", 0), Some(&json!("n/a")));
}

#[test]
fn test_double_failure_keeps_row_error() {
    let mut registry = LdFunctionRegistry::new();
    registry.register("broken", LdFunctionSignature::row(&["score"]), |args| {
        if args.kwargs.contains_key("score") {
            Err(LdError::validation("row failure"))
        } else {
            Err(LdError::internal("fallback failure"))
        }
    });
    let err = invoke(
        registry.get("broken").unwrap(),
        &sample(),
        &params(json!({"input": "score", "output": "out"})),
    )
    .unwrap_err();
    assert!(matches!(err.kind(), LdErrorKind::Validation { message } if message == "row failure"));
}

#[test]
fn test_dataset_mode_must_return_dataset() {
    let mut registry = LdFunctionRegistry::new();
    registry.register("count", LdFunctionSignature::dataset(), |args| {
        let rows = args.dataset.map(|dataset| dataset.len()).unwrap_or_default();
        Ok(LdCustomOutput::Value(json!(rows)))
    });
    let err = invoke(registry.get("count").unwrap(), &sample(), &Map::new()).unwrap_err();
    assert!(matches!(
        err.kind(),
        LdErrorKind::CustomFunctionContractViolation { function, .. } if function == "count"
    ));
}

#[test]
fn test_dataset_mode_strips_where_params() {
    let mut registry = LdFunctionRegistry::new();
    registry.register("head", LdFunctionSignature::dataset(), |args| {
        assert!(!args.kwargs.contains_key("where"));
        let n = args.kwargs["n"].as_u64().unwrap_or_default() as usize;
        let dataset = args.dataset.unwrap_or_default();
        let keep: Vec<usize> = (0..n.min(dataset.len())).collect();
        Ok(LdCustomOutput::Dataset(dataset.take_rows(&keep)))
    });
    let result = invoke(
        registry.get("head").unwrap(),
        &sample(),
        &params(json!({"n": 1, "where": "score > 0"})),
    )
    .unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn test_unknown_function() {
    let registry = LdFunctionRegistry::new();
    let err = registry.get("nope").unwrap_err();
    assert!(matches!(err.kind(), LdErrorKind::UnknownFunction { name } if name == "nope"));
}

#[test]
fn test_call_with_params_filters_undeclared() {
    let mut registry = LdFunctionRegistry::new();
    registry.register("values", LdFunctionSignature::row(&["limit"]), |args| {
        assert!(!args.kwargs.contains_key("other"));
        let limit = args.kwargs.get("limit").and_then(Value::as_i64).unwrap_or(2);
        Ok(LdCustomOutput::Value(json!((0..limit).collect::<Vec<_>>())))
    });
    let value = call_with_params(
        registry.get("values").unwrap(),
        &params(json!({"limit": 3, "other": true})),
    )
    .unwrap();
    assert_eq!(value, json!([0, 1, 2]));
}
