//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Ladle.
//! The Ladle project belongs to the Dunimd project team.

use ladle::dataset::{LdDataset, LdJoinHow, LdRow};
use serde_json::{json, Value};

fn dataset(columns: &[(&str, Vec<Value>)]) -> LdDataset {
    LdDataset::from_columns(
        columns
            .iter()
            .map(|(name, values)| (name.to_string(), values.clone()))
            .collect(),
    )
    .unwrap()
}

fn names(dataset: &LdDataset) -> Vec<&str> {
    dataset.columns().iter().map(String::as_str).collect()
}

#[test]
fn test_from_rows_fills_missing_cells() {
    let rows: Vec<LdRow> = vec![
        json!({"a": 1}).as_object().cloned().unwrap(),
        json!({"b": 2}).as_object().cloned().unwrap(),
    ];
    let dataset = LdDataset::from_rows(&rows);
    assert_eq!(names(&dataset), vec!["a", "b"]);
    assert_eq!(dataset.cell("a", 1), Some(&Value::Null));
    assert_eq!(dataset.cell("b", 1), Some(&json!(2)));
}

#[test]
fn test_filter_keeps_index_labels() {
    let data = dataset(&[("v", vec![json!(1), json!(2), json!(3)])]);
    let subset = data.filter_mask(&[false, true, true]);
    assert_eq!(subset.index(), &[1, 2]);
    assert_eq!(subset.position_of_index(2), Some(1));
}

#[test]
fn test_rename_onto_existing_column_fails() {
    let mut data = dataset(&[("a", vec![json!(1)]), ("b", vec![json!(2)])]);
    assert!(data.rename_column("a", "b").is_err());
    data.rename_column("a", "c").unwrap();
    assert_eq!(names(&data), vec!["c", "b"]);
}

#[test]
fn test_union_pads_and_resets_index() {
    let left = dataset(&[("a", vec![json!(1)])]).filter_mask(&[true]);
    let right = dataset(&[("b", vec![json!(2), json!(3)])]);
    let combined = left.union(&right);
    assert_eq!(combined.len(), 3);
    assert_eq!(combined.index(), &[0, 1, 2]);
    assert_eq!(names(&combined), vec!["a", "b"]);
    assert_eq!(combined.cell("a", 2), Some(&Value::Null));
}

#[test]
fn test_concatenate_rejects_duplicate_columns() {
    let left = dataset(&[("a", vec![json!(1)])]);
    let right = dataset(&[("a", vec![json!(2)])]);
    assert!(left.concatenate(&right).is_err());
}

#[test]
fn test_concatenate_pads_shorter_side() {
    let left = dataset(&[("a", vec![json!(1), json!(2)])]);
    let right = dataset(&[("b", vec![json!("x")])]);
    let combined = left.concatenate(&right).unwrap();
    assert_eq!(combined.len(), 2);
    assert_eq!(combined.cell("b", 1), Some(&Value::Null));
}

#[test]
fn test_inner_join_emits_shared_key_once() {
    let left = dataset(&[
        ("id", vec![json!(1), json!(2), json!(3)]),
        ("name", vec![json!("a"), json!("b"), json!("c")]),
    ]);
    let right = dataset(&[
        ("id", vec![json!(2), json!(3), json!(4)]),
        ("name", vec![json!("B"), json!("C"), json!("D")]),
    ]);
    let key = vec!["id".to_string()];
    let joined = left.join(&right, &key, &key, LdJoinHow::Inner).unwrap();
    assert_eq!(names(&joined), vec!["id", "name_x", "name_y"]);
    assert_eq!(joined.len(), 2);
    assert_eq!(joined.cell("name_y", 0), Some(&json!("B")));
}

#[test]
fn test_outer_join_keeps_unmatched_rows() {
    let left = dataset(&[("id", vec![json!(1), json!(2)])]);
    let right = dataset(&[
        ("id", vec![json!(2), json!(3)]),
        ("score", vec![json!(20), json!(30)]),
    ]);
    let key = vec!["id".to_string()];
    let joined = left.join(&right, &key, &key, LdJoinHow::Outer).unwrap();
    assert_eq!(joined.len(), 3);
    assert_eq!(joined.cell("score", 0), Some(&Value::Null));
    assert_eq!(joined.cell("id", 2), Some(&json!(3)));
    assert_eq!(joined.cell("score", 2), Some(&json!(30)));
}

#[test]
fn test_unique_values_first_occurrence_order() {
    let data = dataset(&[("v", vec![json!("b"), json!("a"), json!("b")])]);
    assert_eq!(data.unique_values("v").unwrap(), vec![json!("b"), json!("a")]);
}

#[test]
fn test_join_how_parse() {
    assert_eq!(LdJoinHow::parse("LEFT").unwrap(), LdJoinHow::Left);
    assert_eq!(LdJoinHow::parse("full").unwrap(), LdJoinHow::Outer);
    assert!(LdJoinHow::parse("cross").is_err());
}
