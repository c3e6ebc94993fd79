//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Ladle.
//! The Ladle project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Recipe Interpreter
//!
//! Runs one recipe: `on_start` hooks, read, wrangles, write, `on_success`
//! hooks. If any of these fails the `on_failure` hooks run with an `error`
//! variable and the original error is returned unchanged.
//!
//! ## Where Clauses
//!
//! A step carrying `where` runs on the matching rows only. Its result is
//! merged back into the full dataset by row index, column by column,
//! preferring the new value where one exists:
//!
//! - with an `output`, only the output columns are merged
//! - with an `input` and no `output`, the input columns (changed in place)
//!   and any new columns are merged
//! - otherwise only the columns the step added are merged
//!
//! Steps that reshape rows cannot be combined with `where` in this way; they
//! receive the clause themselves and fail if they cannot use it.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::LdContext;
use crate::custom::{self, LdCustomArgs, LdCustomOutput};
use crate::dataset::{LdDataset, LdJoinHow};
use crate::errors::{suggestion_for, LdError, Result};
use crate::matrix::{self, LdMatrixExecutor, LdMatrixStrategy};
use crate::operator::{execute_wrangle, params_object, selector_param};
use crate::recipe::loader::{load, LdRecipeInput};
use crate::select::{expand, selectors_from_value};
use crate::variables::{environment_bindings, resolve_recipe, resolve_steps, LdBindings};
use crate::where_clause::filter_where;

/// Steps that change the shape of rows. A `where` on these is handed to the
/// step instead of being applied by the interpreter.
pub const LD_NO_WHERE_STEPS: &[&str] = &[
    "transpose",
    "filter",
    "rename",
    "sql",
    "drop",
    "split.list",
    "reindex",
    "select.group_by",
    "matrix",
    "recipe",
    "select.head",
];

/// Parameters applied by the interpreter around a read or write.
const PROJECTION_PARAMS: &[&str] = &["columns", "not_columns", "where", "where_params"];

/// Summary of one recipe run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdRunReport {
    pub rows_read: usize,
    pub rows_returned: usize,
    pub steps: Vec<String>,
    pub writes: usize,
    pub duration_ms: u64,
}

impl LdRunReport {
    pub fn steps_applied(&self) -> usize {
        self.steps.len()
    }
}

/// Runs recipes against one execution context.
#[derive(Clone, Debug, Default)]
pub struct LdRecipeRunner {
    context: LdContext,
}

impl LdRecipeRunner {
    #[allow(non_snake_case)]
    pub fn new(context: LdContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LdContext {
        &self.context
    }

    /// Runs a recipe and returns the resulting dataset. `dataframe` is used
    /// when the recipe has no `read` section.
    pub fn run(
        &self,
        recipe: impl Into<LdRecipeInput>,
        variables: &LdBindings,
        dataframe: Option<LdDataset>,
    ) -> Result<LdDataset> {
        self.run_with_report(recipe, variables, dataframe)
            .map(|(dataset, _)| dataset)
    }

    pub fn run_with_report(
        &self,
        recipe: impl Into<LdRecipeInput>,
        variables: &LdBindings,
        dataframe: Option<LdDataset>,
    ) -> Result<(LdDataset, LdRunReport)> {
        let document = load(&recipe.into(), &self.context)?;
        let bindings = self.bindings(variables);
        self.execute(&document, &bindings, dataframe)
    }

    fn bindings(&self, variables: &LdBindings) -> LdBindings {
        let mut bindings = if self.context.config().include_environment {
            environment_bindings()
        } else {
            LdBindings::new()
        };
        bindings.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        bindings
    }

    fn execute(
        &self,
        document: &Value,
        bindings: &LdBindings,
        dataframe: Option<LdDataset>,
    ) -> Result<(LdDataset, LdRunReport)> {
        let started = Instant::now();
        let recipe = resolve_recipe(document, bindings).map_err(|e| {
            let suggestion = suggestion_for(e.kind(), "recipe");
            e.enrich("recipe", suggestion)
        })?;
        let recipe = recipe
            .as_object()
            .ok_or_else(|| LdError::recipe_load("a recipe must be a mapping"))?;
        let hooks = recipe.get("run");

        let mut report = LdRunReport::default();
        match self.stages(recipe, hooks, bindings, dataframe, &mut report) {
            Ok(dataset) => {
                report.rows_returned = dataset.len();
                report.duration_ms = started.elapsed().as_millis() as u64;
                log::info!(
                    "Recipe finished: {} step(s), {} row(s) in {} ms",
                    report.steps_applied(),
                    report.rows_returned,
                    report.duration_ms
                );
                Ok((dataset, report))
            }
            Err(error) => {
                log::error!("Recipe failed: {error}");
                let mut failure_bindings = bindings.clone();
                failure_bindings.insert("error".to_string(), Value::String(error.to_string()));
                self.run_failure_hooks(hooks, &failure_bindings);
                Err(error)
            }
        }
    }

    fn stages(
        &self,
        recipe: &Map<String, Value>,
        hooks: Option<&Value>,
        bindings: &LdBindings,
        dataframe: Option<LdDataset>,
        report: &mut LdRunReport,
    ) -> Result<LdDataset> {
        self.run_hooks(hooks, "on_start", bindings)?;

        log::debug!("Recipe stage: read");
        let dataset = self.read_section(recipe.get("read"), dataframe, bindings)?;
        report.rows_read = dataset.len();

        log::debug!("Recipe stage: wrangles");
        let dataset = self.wrangle_list(recipe.get("wrangles"), dataset, bindings, report)?;

        log::debug!("Recipe stage: write");
        let (dataset, writes) = self.write_section(recipe.get("write"), dataset, bindings)?;
        report.writes = writes;

        self.run_hooks(hooks, "on_success", bindings)?;
        Ok(dataset)
    }

    // hooks

    fn run_hooks(&self, hooks: Option<&Value>, phase: &str, bindings: &LdBindings) -> Result<()> {
        let Some(actions) = hooks.and_then(|hooks| hooks.get(phase)) else {
            return Ok(());
        };
        log::debug!("Running {phase} hooks");
        let actions = resolve_steps(actions, bindings)?;
        for action in entries(&actions, phase)? {
            self.run_hook(action, phase, bindings)?;
        }
        Ok(())
    }

    /// Runs every `on_failure` action. A failing action is logged and the
    /// remaining ones still run.
    fn run_failure_hooks(&self, hooks: Option<&Value>, bindings: &LdBindings) {
        let Some(actions) = hooks.and_then(|hooks| hooks.get("on_failure")) else {
            return;
        };
        log::debug!("Running on_failure hooks");
        let actions = match resolve_steps(actions, bindings) {
            Ok(actions) => actions,
            Err(e) => {
                log::warn!("on_failure hooks were skipped: {e}");
                return;
            }
        };
        let list = match entries(&actions, "on_failure") {
            Ok(list) => list,
            Err(e) => {
                log::warn!("on_failure hooks were skipped: {e}");
                return;
            }
        };
        for action in list {
            if let Err(e) = self.run_hook(action, "on_failure", bindings) {
                log::warn!("on_failure hook failed and was ignored: {e}");
            }
        }
    }

    fn run_hook(&self, action: &Value, phase: &str, bindings: &LdBindings) -> Result<()> {
        let (key, params) = single_key(action, phase)?;
        self.run_action(key, params, bindings).map_err(|e| {
            let suggestion = suggestion_for(e.kind(), key);
            e.enrich(format!("{phase} ({key})"), suggestion)
        })
    }

    fn run_action(&self, key: &str, params: &Value, bindings: &LdBindings) -> Result<()> {
        let params = params_object(params, key)?;
        match key {
            "matrix" => {
                let body = params
                    .get("run")
                    .ok_or_else(|| LdError::validation("a run matrix requires 'run'"))?;
                let executor = LdMatrixExecutor::new(self.context.config().matrix_workers);
                executor.run(self.matrix_bindings(params, None)?, |binding| {
                    let merged = merge_bindings(bindings, &binding);
                    let body = resolve_steps(body, &merged)?;
                    for action in entries(&body, "run")? {
                        let (key, params) = single_key(action, "run")?;
                        self.run_action(key, params, &merged)?;
                    }
                    Ok(())
                })?;
                Ok(())
            }
            "recipe" => self.nested_recipe(params, None).map(|_| ()),
            _ => {
                if let Some(name) = key.strip_prefix("custom.") {
                    let function = self.context.functions().get(name)?;
                    custom::call_with_params(function, params)?;
                    return Ok(());
                }
                self.context.connectors().get(key)?.run(params, &self.context)
            }
        }
    }

    // read

    fn read_section(
        &self,
        section: Option<&Value>,
        dataframe: Option<LdDataset>,
        bindings: &LdBindings,
    ) -> Result<LdDataset> {
        let section = match section {
            None | Some(Value::Null) => return Ok(dataframe.unwrap_or_default()),
            Some(section) => section,
        };
        let list = entries(section, "read")?;
        match list.as_slice() {
            [] => Ok(dataframe.unwrap_or_default()),
            [entry] => self.read_entry(entry, dataframe.as_ref(), bindings),
            _ => Err(LdError::validation(
                "read takes a single source; combine several with join, union or concatenate",
            )),
        }
    }

    fn read_entry(
        &self,
        entry: &Value,
        dataframe: Option<&LdDataset>,
        bindings: &LdBindings,
    ) -> Result<LdDataset> {
        let (key, params) = single_key(entry, "read")?;
        let params = params_object(params, key)?;
        log::info!("Reading from {key}");

        let dataset = match key {
            "join" | "union" | "concatenate" => self.read_combined(key, params, dataframe, bindings),
            "matrix" => self.read_matrix(params, dataframe, bindings),
            "recipe" => self.nested_recipe(params, None),
            _ => match key.strip_prefix("custom.") {
                Some(name) => self.read_custom(name, &without(params, PROJECTION_PARAMS)),
                None => self
                    .context
                    .connectors()
                    .get(key)?
                    .read(&without(params, PROJECTION_PARAMS), &self.context),
            },
        }
        .map_err(|e| {
            let suggestion = suggestion_for(e.kind(), key);
            e.enrich(format!("read ({key})"), suggestion)
        })?;

        project(dataset, params)
    }

    fn read_combined(
        &self,
        key: &str,
        params: &Map<String, Value>,
        dataframe: Option<&LdDataset>,
        bindings: &LdBindings,
    ) -> Result<LdDataset> {
        let sources = params
            .get("sources")
            .and_then(Value::as_array)
            .ok_or_else(|| LdError::validation(format!("{key} requires a 'sources' list")))?;
        if sources.len() < 2 {
            return Err(LdError::validation(format!("{key} needs at least two sources")));
        }
        let datasets = sources
            .iter()
            .map(|source| self.read_entry(source, dataframe, bindings))
            .collect::<Result<Vec<_>>>()?;

        let mut datasets = datasets.into_iter();
        let mut combined = datasets.next().unwrap_or_default();
        match key {
            "union" => {
                for next in datasets {
                    combined = combined.union(&next);
                }
            }
            "concatenate" => {
                for next in datasets {
                    combined = combined.concatenate(&next)?;
                }
            }
            _ => {
                let how = match params.get("how") {
                    Some(Value::String(how)) => LdJoinHow::parse(how)?,
                    Some(other) => {
                        return Err(LdError::validation(format!("join 'how' must be a string, got {other}")))
                    }
                    None => LdJoinHow::Inner,
                };
                let on = selector_param(params, "on")?;
                let left_on = match selector_param(params, "left_on")? {
                    left if left.is_empty() => on.clone(),
                    left => left,
                };
                let right_on = match selector_param(params, "right_on")? {
                    right if right.is_empty() => on,
                    right => right,
                };
                for next in datasets {
                    combined = combined.join(&next, &left_on, &right_on, how)?;
                }
            }
        }
        Ok(combined)
    }

    fn read_matrix(
        &self,
        params: &Map<String, Value>,
        dataframe: Option<&LdDataset>,
        bindings: &LdBindings,
    ) -> Result<LdDataset> {
        let body = params
            .get("read")
            .ok_or_else(|| LdError::validation("a read matrix requires 'read'"))?;
        let executor = LdMatrixExecutor::new(self.context.config().matrix_workers);
        let datasets = executor.run(self.matrix_bindings(params, dataframe)?, |binding| {
            let merged = merge_bindings(bindings, &binding);
            let body = resolve_steps(body, &merged)?;
            self.read_section(Some(&body), dataframe.cloned(), &merged)
        })?;
        Ok(datasets
            .into_iter()
            .reduce(|combined, next| combined.union(&next))
            .unwrap_or_default())
    }

    fn read_custom(&self, name: &str, params: &Map<String, Value>) -> Result<LdDataset> {
        let function = self.context.functions().get(name)?;
        match function.call(LdCustomArgs {
            dataset: None,
            kwargs: params.clone(),
        })? {
            LdCustomOutput::Dataset(dataset) => Ok(dataset),
            LdCustomOutput::Value(Value::Array(rows)) => {
                let rows = rows
                    .into_iter()
                    .map(|row| match row {
                        Value::Object(row) => Ok(row),
                        other => Err(LdError::contract_violation(
                            name,
                            format!("rows must be objects, got {other}"),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(LdDataset::from_rows(&rows))
            }
            LdCustomOutput::Value(other) => Err(LdError::contract_violation(
                name,
                format!("a read function must return a dataset or a list of rows, got {other}"),
            )),
        }
    }

    // wrangles

    fn wrangle_list(
        &self,
        steps: Option<&Value>,
        mut dataset: LdDataset,
        bindings: &LdBindings,
        report: &mut LdRunReport,
    ) -> Result<LdDataset> {
        let steps = match steps {
            None | Some(Value::Null) => return Ok(dataset),
            Some(steps) => entries(steps, "wrangles")?,
        };
        for (position, step) in steps.iter().enumerate() {
            let (key, params) = single_key(step, "wrangles")?;
            let location = format!("wrangle #{} ({key})", position + 1);
            log::info!("Applying {location}");
            dataset = self
                .apply_step(key, params, dataset, bindings)
                .map_err(|e| {
                    let suggestion = suggestion_for(e.kind(), key);
                    e.enrich(location, suggestion)
                })?;
            dataset.normalize_missing();
            report.steps.push(key.to_string());
        }
        Ok(dataset)
    }

    fn apply_step(
        &self,
        key: &str,
        params: &Value,
        dataset: LdDataset,
        bindings: &LdBindings,
    ) -> Result<LdDataset> {
        let params = params_object(params, key)?;
        let Some(clause) = params.get("where") else {
            return self.dispatch(key, params, dataset, bindings, false);
        };
        if LD_NO_WHERE_STEPS.contains(&key) {
            return self.dispatch(key, params, dataset, bindings, true);
        }

        let clause = match clause {
            Value::String(clause) => clause.as_str(),
            other => return Err(LdError::validation(format!("'where' must be a string, got {other}"))),
        };
        let where_params = params.get("where_params").cloned().unwrap_or(Value::Null);
        let subset = filter_where(&dataset, clause, &where_params)?;
        log::debug!("where '{clause}' selected {} of {} rows", subset.len(), dataset.len());

        let inner = without(params, &["where", "where_params"]);
        let transformed = self.dispatch(key, &inner, subset, bindings, false)?;
        merge_where(&dataset, &transformed, &inner)
    }

    fn dispatch(
        &self,
        key: &str,
        params: &Map<String, Value>,
        dataset: LdDataset,
        bindings: &LdBindings,
        forwarded_where: bool,
    ) -> Result<LdDataset> {
        let refuse_where = || {
            LdError::unsupported(format!("'{key}' cannot be combined with a where clause"))
        };
        match key {
            "recipe" => {
                if forwarded_where {
                    return Err(refuse_where());
                }
                self.recipe_step(params, dataset)
            }
            "matrix" => {
                if forwarded_where {
                    return Err(refuse_where());
                }
                self.matrix_step(params, dataset, bindings)
            }
            _ => {
                if let Some(name) = key.strip_prefix("custom.") {
                    let function = self.context.functions().get(name)?;
                    return custom::invoke(function, &dataset, params);
                }
                let wrangle = self
                    .context
                    .wrangles()
                    .build(key, &Value::Object(params.clone()))?;
                if forwarded_where && !wrangle.consumes_where() {
                    return Err(refuse_where());
                }
                execute_wrangle(wrangle.as_ref(), dataset, &self.context)
            }
        }
    }

    fn recipe_step(&self, params: &Map<String, Value>, dataset: LdDataset) -> Result<LdDataset> {
        let output_columns = selector_param(params, "output_columns")?;
        let result = self.nested_recipe(params, Some(dataset.clone()))?;
        if output_columns.is_empty() {
            return Ok(result);
        }

        let columns = expand(result.columns(), &output_columns)?;
        let positions = dataset.index_positions();
        let mut merged = dataset;
        for column in columns {
            let mut values = merged
                .column(&column)
                .map(<[Value]>::to_vec)
                .unwrap_or_else(|| vec![Value::Null; merged.len()]);
            let incoming = result.require_column(&column)?;
            for (offset, label) in result.index().iter().enumerate() {
                if let Some(&position) = positions.get(label) {
                    values[position] = incoming[offset].clone();
                }
            }
            merged.set_column(&column, values)?;
        }
        Ok(merged)
    }

    fn matrix_step(
        &self,
        params: &Map<String, Value>,
        mut dataset: LdDataset,
        bindings: &LdBindings,
    ) -> Result<LdDataset> {
        let body = params
            .get("wrangles")
            .ok_or_else(|| LdError::validation("a wrangle matrix requires 'wrangles'"))?;
        let combinations = self.matrix_bindings(params, Some(&dataset))?;
        log::debug!("Applying matrix wrangles for {} binding(s)", combinations.len());
        for binding in combinations {
            let merged = merge_bindings(bindings, &binding);
            let steps = resolve_steps(body, &merged)?;
            let mut inner_report = LdRunReport::default();
            dataset = self.wrangle_list(Some(&steps), dataset, &merged, &mut inner_report)?;
        }
        Ok(dataset)
    }

    // write

    fn write_section(
        &self,
        section: Option<&Value>,
        dataset: LdDataset,
        bindings: &LdBindings,
    ) -> Result<(LdDataset, usize)> {
        let section = match section {
            None | Some(Value::Null) => return Ok((dataset, 0)),
            Some(section) => section,
        };
        let mut returned: Option<LdDataset> = None;
        let mut writes = 0;
        for entry in entries(section, "write")? {
            let (key, params) = single_key(entry, "write")?;
            let params = params_object(params, key)?;
            log::info!("Writing to {key}");
            self.write_entry(key, params, &dataset, bindings, &mut returned)
                .map_err(|e| {
                    let suggestion = suggestion_for(e.kind(), key);
                    e.enrich(format!("write ({key})"), suggestion)
                })?;
            writes += 1;
        }
        Ok((returned.unwrap_or(dataset), writes))
    }

    fn write_entry(
        &self,
        key: &str,
        params: &Map<String, Value>,
        dataset: &LdDataset,
        bindings: &LdBindings,
        returned: &mut Option<LdDataset>,
    ) -> Result<()> {
        let projected = project(dataset.clone(), params)?;
        let params = without(params, PROJECTION_PARAMS);
        match key {
            "dataframe" => {
                if returned.is_none() {
                    *returned = Some(projected);
                }
                Ok(())
            }
            "matrix" => {
                let body = params
                    .get("write")
                    .ok_or_else(|| LdError::validation("a write matrix requires 'write'"))?;
                let executor = LdMatrixExecutor::new(self.context.config().matrix_workers);
                executor.run(self.matrix_bindings(&params, Some(&projected))?, |binding| {
                    let merged = merge_bindings(bindings, &binding);
                    let body = resolve_steps(body, &merged)?;
                    self.write_section(Some(&body), projected.clone(), &merged)
                        .map(|_| ())
                })?;
                Ok(())
            }
            "recipe" => self.nested_recipe(&params, Some(projected)).map(|_| ()),
            _ => {
                if let Some(name) = key.strip_prefix("custom.") {
                    let function = self.context.functions().get(name)?;
                    function.call(LdCustomArgs {
                        dataset: Some(projected),
                        kwargs: params,
                    })?;
                    return Ok(());
                }
                self.context
                    .connectors()
                    .get(key)?
                    .write(&projected, &params, &self.context)
            }
        }
    }

    // shared

    fn matrix_bindings(
        &self,
        params: &Map<String, Value>,
        dataset: Option<&LdDataset>,
    ) -> Result<Vec<LdBindings>> {
        let variables = match params.get("variables") {
            Some(Value::Object(variables)) => variables,
            _ => return Err(LdError::validation("a matrix requires a 'variables' mapping")),
        };
        let strategy = LdMatrixStrategy::parse(params.get("strategy"))?;
        matrix::expand(variables, strategy, dataset, self.context.functions())
    }

    /// Runs another recipe with fresh variables and the same functions.
    fn nested_recipe(
        &self,
        params: &Map<String, Value>,
        dataframe: Option<LdDataset>,
    ) -> Result<LdDataset> {
        let source = params
            .get("name")
            .or_else(|| params.get("recipe"))
            .ok_or_else(|| LdError::validation("recipe requires 'name'"))?;
        let input = match source {
            Value::String(text) => LdRecipeInput::Text(text.clone()),
            Value::Object(_) => LdRecipeInput::Document(source.clone()),
            other => {
                return Err(LdError::validation(format!(
                    "recipe 'name' must be a string or a mapping, got {other}"
                )))
            }
        };
        let variables = match params.get("variables") {
            None | Some(Value::Null) => LdBindings::new(),
            Some(Value::Object(variables)) => variables.clone(),
            Some(other) => {
                return Err(LdError::validation(format!(
                    "recipe 'variables' must be a mapping, got {other}"
                )))
            }
        };
        log::debug!("Running nested recipe");
        self.run(input, &variables, dataframe)
    }
}

/// Merges the result of a filtered step back into the unfiltered dataset.
fn merge_where(
    original: &LdDataset,
    transformed: &LdDataset,
    params: &Map<String, Value>,
) -> Result<LdDataset> {
    let positions = original.index_positions();
    let rows = transformed
        .index()
        .iter()
        .map(|label| {
            positions.get(label).copied().ok_or_else(|| {
                LdError::unsupported(format!(
                    "row {label} produced under the where clause does not exist in the dataset"
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let added = || {
        transformed
            .columns()
            .iter()
            .filter(|column| !original.has_column(column))
            .cloned()
            .collect::<Vec<_>>()
    };
    let columns: Vec<String> = if let Some(output) = params.get("output") {
        log::debug!("where merge: declared output columns");
        selectors_from_value(output)?
    } else if let Some(input) = params.get("input") {
        log::debug!("where merge: input columns changed in place");
        let mut columns: Vec<String> = expand(original.columns(), &selectors_from_value(input)?)?
            .into_iter()
            .filter(|column| transformed.has_column(column))
            .collect();
        columns.extend(added());
        columns
    } else {
        log::debug!("where merge: new columns");
        added()
    };

    let mut merged = original.clone();
    for column in columns {
        let incoming = transformed.require_column(&column)?;
        let mut values = merged
            .column(&column)
            .map(<[Value]>::to_vec)
            .unwrap_or_else(|| vec![Value::Null; merged.len()]);
        for (offset, &position) in rows.iter().enumerate() {
            if !incoming[offset].is_null() {
                values[position] = incoming[offset].clone();
            }
        }
        merged.set_column(&column, values)?;
        if transformed.is_date_column(&column) {
            merged.mark_date_column(&column);
        }
    }
    Ok(merged)
}

/// Applies `where`, `columns` and `not_columns` around a read or write.
fn project(dataset: LdDataset, params: &Map<String, Value>) -> Result<LdDataset> {
    let mut dataset = match params.get("where") {
        Some(Value::String(clause)) => {
            let where_params = params.get("where_params").cloned().unwrap_or(Value::Null);
            filter_where(&dataset, clause, &where_params)?
        }
        Some(other) => return Err(LdError::validation(format!("'where' must be a string, got {other}"))),
        None => dataset,
    };
    if let Some(columns) = params.get("columns") {
        let columns = expand(dataset.columns(), &selectors_from_value(columns)?)?;
        dataset = dataset.select(&columns)?;
    }
    if let Some(columns) = params.get("not_columns") {
        let columns = expand(dataset.columns(), &selectors_from_value(columns)?)?;
        dataset.drop_columns(&columns)?;
    }
    Ok(dataset)
}

fn without(params: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    params
        .iter()
        .filter(|(key, _)| !keys.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn merge_bindings(bindings: &LdBindings, extra: &LdBindings) -> LdBindings {
    let mut merged = bindings.clone();
    merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// A section holding one entry or a list of entries.
fn entries<'a>(section: &'a Value, name: &str) -> Result<Vec<&'a Value>> {
    match section {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(_) => Ok(vec![section]),
        Value::Null => Ok(Vec::new()),
        other => Err(LdError::validation(format!(
            "'{name}' must be a list or a mapping, got {other}"
        ))),
    }
}

static NO_PARAMS: Value = Value::Null;

/// Splits `{key: params}` into its key and parameters.
fn single_key<'a>(entry: &'a Value, section: &str) -> Result<(&'a str, &'a Value)> {
    match entry {
        Value::Object(map) if map.len() == 1 => map
            .iter()
            .next()
            .map(|(key, params)| (key.as_str(), params))
            .ok_or_else(|| LdError::internal("empty mapping")),
        Value::String(key) => Ok((key.as_str(), &NO_PARAMS)),
        other => Err(LdError::validation(format!(
            "each '{section}' entry must be a mapping with exactly one key, got {other}"
        ))),
    }
}
