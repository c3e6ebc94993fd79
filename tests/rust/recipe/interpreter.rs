//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Ladle.
//! The Ladle project belongs to the Dunimd project team.

use std::sync::{Arc, Mutex};

use ladle::connectors::LdConnector;
use ladle::errors::{LdError, LdErrorKind, Result};
use ladle::{
    run, LdBindings, LdContext, LdContextConfig, LdCustomOutput, LdDataset, LdFunctionRegistry,
    LdFunctionSignature, LdModelSource, LdRecipeRunner,
};
use serde_json::{json, Map, Value};

/// Keeps every write and run action it receives.
#[derive(Default)]
struct Recorder {
    writes: Mutex<Vec<(Map<String, Value>, LdDataset)>>,
    runs: Mutex<Vec<Map<String, Value>>>,
}

impl LdConnector for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn write(&self, dataset: &LdDataset, params: &Map<String, Value>, _context: &LdContext) -> Result<()> {
        self.writes.lock().unwrap().push((params.clone(), dataset.clone()));
        Ok(())
    }

    fn run(&self, params: &Map<String, Value>, _context: &LdContext) -> Result<()> {
        if params.get("fail") == Some(&json!(true)) {
            return Err(LdError::validation("hook failed"));
        }
        self.runs.lock().unwrap().push(params.clone());
        Ok(())
    }
}

fn context_with(recorder: &Arc<Recorder>) -> LdContext {
    LdContext::new_with_config(LdContextConfig::new().include_environment(false))
        .with_connector("recorder", recorder.clone())
}

fn quiet_context() -> LdContext {
    LdContext::new_with_config(LdContextConfig::new().include_environment(false))
}

fn people() -> LdDataset {
    LdDataset::from_columns(vec![
        ("name".to_string(), vec![json!("a"), json!("b"), json!("c")]),
        ("score".to_string(), vec![json!(1), json!(5), json!(9)]),
        ("team".to_string(), vec![json!("red"), json!("blue"), json!("red")]),
    ])
    .unwrap()
}

fn vars(value: Value) -> LdBindings {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn test_generated_rows_are_upper_cased() {
    let recipe = r#"
read:
  - test:
      rows: 5
      values:
        header1: value1
wrangles:
  - convert.case:
      input: header1
      case: upper
"#;
    let dataset = run(recipe, &LdBindings::new(), None, &quiet_context()).unwrap();
    assert_eq!(dataset.len(), 5);
    assert_eq!(dataset.cell("header1", 0), Some(&json!("VALUE1")));
}

#[test]
fn test_mismatched_copy_carries_suggestion() {
    let recipe = r#"
read:
  - test:
      rows: 2
      values:
        col: a
        col2: b
wrangles:
  - copy:
      input: [col, col2]
      output: [col-copy]
"#;
    let err = run(recipe, &LdBindings::new(), None, &quiet_context()).unwrap_err();
    let message = err.to_string();
    assert!(matches!(err.kind(), LdErrorKind::AmbiguousOutput { .. }));
    assert_eq!(err.location(), Some("wrangle #1 (copy)"));
    assert!(message.contains("Suggestion:"));
    assert!(message.contains("Check the format of the parameters for 'copy'"));
}

#[test]
fn test_where_changes_only_selected_rows() {
    let recipe = r#"
wrangles:
  - convert.case:
      input: name
      case: upper
      where: score > 2
"#;
    let dataset = run(recipe, &LdBindings::new(), Some(people()), &quiet_context()).unwrap();
    assert_eq!(dataset.column("name").unwrap(), &[json!("a"), json!("B"), json!("C")]);
    assert_eq!(dataset.index(), &[0, 1, 2]);

    let again = run(recipe, &LdBindings::new(), Some(dataset.clone()), &quiet_context()).unwrap();
    assert_eq!(again, dataset);
}

#[test]
fn test_where_new_column_is_blank_elsewhere() {
    let recipe = r#"
wrangles:
  - copy:
      input: name
      output: picked
      where: team = :team
      where_params:
        team: red
"#;
    let dataset = run(recipe, &LdBindings::new(), Some(people()), &quiet_context()).unwrap();
    assert_eq!(dataset.column("picked").unwrap(), &[json!("a"), json!(""), json!("c")]);
    assert_eq!(dataset.len(), 3);
}

#[test]
fn test_where_on_reshaping_step_is_refused() {
    let recipe = r#"
wrangles:
  - drop:
      columns: team
      where: score > 2
"#;
    let err = run(recipe, &LdBindings::new(), Some(people()), &quiet_context()).unwrap_err();
    assert!(matches!(err.kind(), LdErrorKind::UnsupportedOperation { .. }));
    assert_eq!(err.location(), Some("wrangle #1 (drop)"));
}

#[test]
fn test_filter_consumes_its_own_where() {
    let recipe = r#"
wrangles:
  - filter:
      where: score >= 5
"#;
    let dataset = run(recipe, &LdBindings::new(), Some(people()), &quiet_context()).unwrap();
    assert_eq!(dataset.index(), &[1, 2]);
}

#[test]
fn test_variables_fill_the_recipe() {
    let recipe = r#"
wrangles:
  - convert.case:
      input: ${column}
      case: ${case}
"#;
    let dataset = run(
        recipe,
        &vars(json!({"column": "team", "case": "upper"})),
        Some(people()),
        &quiet_context(),
    )
    .unwrap();
    assert_eq!(dataset.cell("team", 1), Some(&json!("BLUE")));

    let err = run(recipe, &vars(json!({"column": "team"})), Some(people()), &quiet_context())
        .unwrap_err();
    assert!(matches!(err.kind(), LdErrorKind::UnknownVariable { name } if name == "case"));
    assert_eq!(err.location(), Some("recipe"));
}

#[test]
fn test_hooks_run_around_the_recipe() {
    let recorder = Arc::new(Recorder::default());
    let recipe = r#"
run:
  on_start:
    - recorder:
        phase: start
  on_success:
    - recorder:
        phase: success ${label}
read:
  - test:
      rows: 1
      values:
        a: x
"#;
    run(recipe, &vars(json!({"label": "ok"})), None, &context_with(&recorder)).unwrap();
    let runs = recorder.runs.lock().unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0]["phase"], json!("start"));
    assert_eq!(runs[1]["phase"], json!("success ok"));
}

#[test]
fn test_failure_hooks_continue_past_a_failing_action() {
    let recorder = Arc::new(Recorder::default());
    let recipe = r#"
run:
  on_success:
    - recorder:
        phase: success
  on_failure:
    - recorder:
        fail: true
    - recorder:
        phase: failure
        message: ${error}
wrangles:
  - does.not.exist: {}
"#;
    let err = run(recipe, &LdBindings::new(), Some(people()), &context_with(&recorder)).unwrap_err();
    assert!(matches!(err.kind(), LdErrorKind::UnknownWrangle { .. }));

    let runs = recorder.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["phase"], json!("failure"));
    assert!(runs[0]["message"].as_str().unwrap().contains("does.not.exist"));
}

#[test]
fn test_step_parameter_named_run_is_resolved_strictly() {
    let recipe = r#"
wrangles:
  - convert.case:
      input: name
      case: upper
      run: ${missing}
"#;
    let err = run(recipe, &LdBindings::new(), Some(people()), &quiet_context()).unwrap_err();
    assert!(matches!(
        err.kind(),
        LdErrorKind::UnknownVariable { name } if name == "missing"
    ));
}

#[test]
fn test_nested_recipe_merges_output_columns() {
    let recipe = r#"
wrangles:
  - recipe:
      name:
        wrangles:
          - copy:
              input: name
              output: shadow
          - convert.case:
              input: shadow
              case: upper
          - drop:
              columns: name
      output_columns: [shadow]
"#;
    let dataset = run(recipe, &LdBindings::new(), Some(people()), &quiet_context()).unwrap();
    assert_eq!(dataset.column("shadow").unwrap(), &[json!("A"), json!("B"), json!("C")]);
    assert_eq!(dataset.column("name").unwrap(), &[json!("a"), json!("b"), json!("c")]);
}

#[test]
fn test_nested_recipe_gets_only_its_own_variables() {
    let recipe = r#"
wrangles:
  - recipe:
      name:
        wrangles:
          - convert.case:
              input: ${inner}
              case: upper
      variables:
        inner: team
"#;
    let dataset = run(
        recipe,
        &vars(json!({"outer": "unused"})),
        Some(people()),
        &quiet_context(),
    )
    .unwrap();
    assert_eq!(dataset.cell("team", 0), Some(&json!("RED")));
}

#[test]
fn test_write_projection_and_dataframe_result() {
    let recorder = Arc::new(Recorder::default());
    let recipe = r#"
write:
  - dataframe:
      columns: [name]
  - recorder:
      not_columns: [score]
      where: score > 2
      target: t
"#;
    let dataset = run(recipe, &LdBindings::new(), Some(people()), &context_with(&recorder)).unwrap();
    assert_eq!(dataset.columns(), &["name".to_string()]);

    let writes = recorder.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    let (params, written) = &writes[0];
    assert_eq!(params, &vars(json!({"target": "t"})));
    assert_eq!(written.len(), 2);
    assert_eq!(written.columns(), &["name".to_string(), "team".to_string()]);
}

#[test]
fn test_write_matrix_runs_every_binding() {
    let recorder = Arc::new(Recorder::default());
    let recipe = r#"
write:
  - matrix:
      variables:
        region: [north, south]
      write:
        - recorder:
            target: ${region}
"#;
    run(recipe, &LdBindings::new(), Some(people()), &context_with(&recorder)).unwrap();
    let mut targets: Vec<Value> = recorder
        .writes
        .lock()
        .unwrap()
        .iter()
        .map(|(params, _)| params["target"].clone())
        .collect();
    targets.sort_by_key(|target| target.to_string());
    assert_eq!(targets, vec![json!("north"), json!("south")]);
}

#[test]
fn test_read_matrix_unions_results() {
    let recipe = r#"
read:
  - matrix:
      variables:
        label: [x, y]
      read:
        - test:
            rows: 2
            values:
              label: ${label}
"#;
    let dataset = run(recipe, &LdBindings::new(), None, &quiet_context()).unwrap();
    assert_eq!(
        dataset.column("label").unwrap(),
        &[json!("x"), json!("x"), json!("y"), json!("y")]
    );
    assert_eq!(dataset.index(), &[0, 1, 2, 3]);
}

#[test]
fn test_read_join_of_custom_sources() {
    let mut functions = LdFunctionRegistry::new();
    functions.register("left", LdFunctionSignature::row(&[]), |_| {
        Ok(LdCustomOutput::Value(json!([
            {"id": 1, "name": "a"},
            {"id": 2, "name": "b"}
        ])))
    });
    functions.register("right", LdFunctionSignature::row(&[]), |_| {
        let dataset = LdDataset::from_columns(vec![
            ("id".to_string(), vec![json!(2)]),
            ("score".to_string(), vec![json!(20)]),
        ])?;
        Ok(LdCustomOutput::Dataset(dataset))
    });
    let recipe = r#"
read:
  - join:
      how: left
      on: id
      sources:
        - custom.left: {}
        - custom.right: {}
"#;
    let dataset = run(
        recipe,
        &LdBindings::new(),
        None,
        &quiet_context().with_functions(functions),
    )
    .unwrap();
    assert_eq!(
        dataset.columns(),
        &["id".to_string(), "name".to_string(), "score".to_string()]
    );
    assert_eq!(dataset.cell("score", 0), Some(&Value::Null));
    assert_eq!(dataset.cell("score", 1), Some(&json!(20)));
}

#[test]
fn test_several_read_entries_are_rejected() {
    let recipe = r#"
read:
  - test:
      rows: 1
  - test:
      rows: 1
"#;
    let err = run(recipe, &LdBindings::new(), None, &quiet_context()).unwrap_err();
    assert!(matches!(err.kind(), LdErrorKind::Validation { .. }));
}

#[test]
fn test_wrangle_matrix_over_column_values() {
    let recipe = r#"
wrangles:
  - matrix:
      variables:
        team: set(team)
      wrangles:
        - merge.concatenate:
            input: [name, team]
            output: label_${team}
            where: team = '${team}'
"#;
    let dataset = run(recipe, &LdBindings::new(), Some(people()), &quiet_context()).unwrap();
    assert_eq!(
        dataset.column("label_red").unwrap(),
        &[json!("a red"), json!(""), json!("c red")]
    );
    assert_eq!(
        dataset.column("label_blue").unwrap(),
        &[json!(""), json!("b blue"), json!("")]
    );
}

#[test]
fn test_custom_wrangle_in_recipe() {
    let mut functions = LdFunctionRegistry::new();
    functions.register("shout", LdFunctionSignature::row(&["name", "suffix"]), |args| {
        let name = args.kwargs["name"].as_str().unwrap_or_default().to_uppercase();
        let suffix = args.kwargs["suffix"].as_str().unwrap_or_default().to_string();
        Ok(LdCustomOutput::Value(json!(format!("{name}{suffix}"))))
    });
    let recipe = r#"
wrangles:
  - custom.shout:
      input: name
      output: loud
      suffix: "!"
"#;
    let dataset = run(
        recipe,
        &LdBindings::new(),
        Some(people()),
        &quiet_context().with_functions(functions),
    )
    .unwrap();
    assert_eq!(dataset.cell("loud", 2), Some(&json!("C!")));
}

struct StaticModels;

impl LdModelSource for StaticModels {
    fn fetch(&self, model_id: &str) -> Result<String> {
        assert_eq!(model_id, "ab12CD34-ef56-GH78");
        Ok("wrangles:\n  - convert.case:\n      input: name\n      case: upper\n".to_string())
    }
}

#[test]
fn test_model_ids_load_through_the_source() {
    let context = quiet_context().with_model_source(Arc::new(StaticModels));
    let dataset = run("ab12CD34-ef56-GH78", &LdBindings::new(), Some(people()), &context).unwrap();
    assert_eq!(dataset.cell("name", 0), Some(&json!("A")));

    let err = run("ab12CD34-ef56-GH78", &LdBindings::new(), None, &quiet_context()).unwrap_err();
    assert!(matches!(err.kind(), LdErrorKind::RecipeLoad { .. }));
}

#[test]
fn test_report_counts_and_wrangle_alias() {
    let recipe = r#"
read:
  - test:
      rows: 4
      values:
        a: x
wrangle:
  - convert.case:
      input: a
      case: upper
  - select.head:
      n: 2
"#;
    let runner = LdRecipeRunner::new(quiet_context());
    let (dataset, report) = runner
        .run_with_report(recipe, &LdBindings::new(), None)
        .unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(report.rows_read, 4);
    assert_eq!(report.rows_returned, 2);
    assert_eq!(report.steps, vec!["convert.case", "select.head"]);
}

#[test]
fn test_file_round_trip_through_connectors() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("people.csv");
    let target = dir.path().join("out.json");
    std::fs::write(&source, "name,score\nada,3\nalan,7\n").unwrap();

    let recipe = format!(
        "read:\n  - file:\n      name: {}\n      where: score > 5\nwrite:\n  - file:\n      name: {}\n",
        source.display(),
        target.display()
    );
    let dataset = run(recipe, &LdBindings::new(), None, &quiet_context()).unwrap();
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.cell("name", 0), Some(&json!("alan")));

    let written = std::fs::read_to_string(&target).unwrap();
    assert!(written.contains("alan"));
    assert!(!written.contains("ada"));
}

#[test]
fn test_read_errors_name_their_source() {
    let recipe = r#"
read:
  - test:
      rows: many
"#;
    let err = run(recipe, &LdBindings::new(), None, &quiet_context()).unwrap_err();
    assert_eq!(err.location(), Some("read (test)"));
}
