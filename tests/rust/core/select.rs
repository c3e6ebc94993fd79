//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Ladle.
//! The Ladle project belongs to the Dunimd project team.

use ladle::errors::LdErrorKind;
use ladle::select::{expand, expand_renames, selectors_from_value};
use proptest::prelude::*;
use serde_json::json;

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn selectors(raw: &[&str]) -> Vec<String> {
    columns(raw)
}

#[test]
fn test_exact_names_keep_selector_order() {
    let all = columns(&["a", "b", "c"]);
    let selected = expand(&all, &selectors(&["c", "a"])).unwrap();
    assert_eq!(selected, columns(&["c", "a"]));
}

#[test]
fn test_wildcard_matches_whole_name() {
    let all = columns(&["col_1", "col_2", "my_col_3", "other"]);
    let selected = expand(&all, &selectors(&["col_*"])).unwrap();
    assert_eq!(selected, columns(&["col_1", "col_2"]));
}

#[test]
fn test_regex_selector_is_full_match() {
    let all = columns(&["alpha", "beta", "alphabet"]);
    let selected = expand(&all, &selectors(&["regex:alpha"])).unwrap();
    assert_eq!(selected, columns(&["alpha"]));

    let selected = expand(&all, &selectors(&["regex:alpha.*"])).unwrap();
    assert_eq!(selected, columns(&["alpha", "alphabet"]));
}

#[test]
fn test_positions_and_slices() {
    let all = columns(&["a", "b", "c", "d", "e"]);
    assert_eq!(expand(&all, &selectors(&["1"])).unwrap(), columns(&["b"]));
    assert_eq!(expand(&all, &selectors(&["-1"])).unwrap(), columns(&["e"]));
    assert_eq!(expand(&all, &selectors(&["1:3"])).unwrap(), columns(&["b", "c"]));
    assert_eq!(expand(&all, &selectors(&["::2"])).unwrap(), columns(&["a", "c", "e"]));
}

#[test]
fn test_negation_only_starts_from_all_columns() {
    let all = columns(&["a", "b", "c"]);
    let selected = expand(&all, &selectors(&["-b"])).unwrap();
    assert_eq!(selected, columns(&["a", "c"]));
}

#[test]
fn test_negation_removes_earlier_matches() {
    let all = columns(&["col_1", "col_2", "col_3"]);
    let selected = expand(&all, &selectors(&["col_*", "-col_2"])).unwrap();
    assert_eq!(selected, columns(&["col_1", "col_3"]));
}

#[test]
fn test_literal_column_beats_negation_syntax() {
    let all = columns(&["-a", "a"]);
    let selected = expand(&all, &selectors(&["-a"])).unwrap();
    assert_eq!(selected, columns(&["-a"]));
}

#[test]
fn test_optional_selector_is_skipped() {
    let all = columns(&["a"]);
    let selected = expand(&all, &selectors(&["a", "missing?"])).unwrap();
    assert_eq!(selected, columns(&["a"]));
}

#[test]
fn test_missing_selector_is_unknown_column() {
    let all = columns(&["a"]);
    let err = expand(&all, &selectors(&["missing"])).unwrap_err();
    assert!(matches!(
        err.kind(),
        LdErrorKind::UnknownColumn { column } if column == "missing"
    ));
}

#[test]
fn test_invalid_regex_selector_reports_the_pattern_error() {
    let all = columns(&["a"]);
    let err = expand(&all, &selectors(&["regex:[bad"])).unwrap_err();
    assert!(matches!(err.kind(), LdErrorKind::Validation { .. }));
    assert!(err.to_string().contains("regex:[bad"));
}

#[test]
fn test_duplicate_matches_appear_once() {
    let all = columns(&["a", "b"]);
    let selected = expand(&all, &selectors(&["a", "*", "b"])).unwrap();
    assert_eq!(selected, columns(&["a", "b"]));
}

#[test]
fn test_wildcard_rename_carries_captures() {
    let all = columns(&["col_1", "col_2", "other"]);
    let renames = expand_renames(
        &all,
        &[("col_*".to_string(), "column *".to_string())],
    )
    .unwrap();
    assert_eq!(
        renames,
        vec![
            ("col_1".to_string(), "column 1".to_string()),
            ("col_2".to_string(), "column 2".to_string()),
        ]
    );
}

#[test]
fn test_regex_rename_accepts_backslash_groups() {
    let all = columns(&["first_name", "last_name"]);
    let renames = expand_renames(
        &all,
        &[(r"regex:(.*)_name".to_string(), r"\1".to_string())],
    )
    .unwrap();
    assert_eq!(renames[0], ("first_name".to_string(), "first".to_string()));
    assert_eq!(renames[1], ("last_name".to_string(), "last".to_string()));
}

#[test]
fn test_selectors_from_value_forms() {
    assert_eq!(selectors_from_value(&json!("a")).unwrap(), vec!["a"]);
    assert_eq!(selectors_from_value(&json!(["a", 2])).unwrap(), vec!["a", "2"]);
    assert!(selectors_from_value(&json!(null)).unwrap().is_empty());
    assert!(selectors_from_value(&json!({"a": 1})).is_err());
}

proptest! {
    #[test]
    fn test_exact_selection_preserves_order(order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()) {
        let all: Vec<String> = (0..6).map(|i| format!("c{i}")).collect();
        let wanted: Vec<String> = order.iter().map(|i| format!("c{i}")).collect();
        let selected = expand(&all, &wanted).unwrap();
        prop_assert_eq!(selected, wanted);
    }
}
