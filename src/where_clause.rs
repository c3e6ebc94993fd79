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

//! # Ladle Where Clause Module
//!
//! A restricted SQL `WHERE` predicate evaluated row by row against a
//! dataset. Comparisons involving NULL are unknown, and unknown rows are not
//! selected.
//!
//! ```rust
//! use ladle::where_clause::LdWhereClause;
//!
//! let clause = LdWhereClause::parse("score >= 3 AND name LIKE 'a%'").unwrap();
//! ```

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::dataset::{value_to_string, LdDataset};
use crate::errors::{LdError, Result};

#[derive(Clone, Debug, PartialEq)]
enum LdToken {
    Ident(String),
    Keyword(String),
    Str(String),
    Num(f64),
    Positional,
    Named(String),
    Op(String),
    Minus,
    LParen,
    RParen,
    Comma,
}

const KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "IN", "LIKE", "BETWEEN", "IS", "NULL", "TRUE", "FALSE",
];

fn tokenize(text: &str) -> Result<Vec<LdToken>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut position = 0;

    let read_until = |start: usize, close: char| -> Result<(String, usize)> {
        let mut value = String::new();
        let mut cursor = start;
        while cursor < chars.len() {
            if chars[cursor] == close {
                // doubled closing character is an escaped literal
                if chars.get(cursor + 1) == Some(&close) && close != ']' {
                    value.push(close);
                    cursor += 2;
                    continue;
                }
                return Ok((value, cursor + 1));
            }
            value.push(chars[cursor]);
            cursor += 1;
        }
        Err(LdError::where_syntax(format!("unterminated '{close}' in '{text}'")))
    };

    while position < chars.len() {
        let current = chars[position];
        match current {
            c if c.is_whitespace() => position += 1,
            '(' => {
                tokens.push(LdToken::LParen);
                position += 1;
            }
            ')' => {
                tokens.push(LdToken::RParen);
                position += 1;
            }
            ',' => {
                tokens.push(LdToken::Comma);
                position += 1;
            }
            '?' => {
                tokens.push(LdToken::Positional);
                position += 1;
            }
            '-' => {
                tokens.push(LdToken::Minus);
                position += 1;
            }
            '\'' => {
                let (value, next) = read_until(position + 1, '\'')?;
                tokens.push(LdToken::Str(value));
                position = next;
            }
            '"' => {
                let (value, next) = read_until(position + 1, '"')?;
                tokens.push(LdToken::Ident(value));
                position = next;
            }
            '`' => {
                let (value, next) = read_until(position + 1, '`')?;
                tokens.push(LdToken::Ident(value));
                position = next;
            }
            '[' => {
                let (value, next) = read_until(position + 1, ']')?;
                tokens.push(LdToken::Ident(value));
                position = next;
            }
            ':' => {
                let start = position + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                if end == start {
                    return Err(LdError::where_syntax("expected a parameter name after ':'"));
                }
                tokens.push(LdToken::Named(chars[start..end].iter().collect()));
                position = end;
            }
            '=' | '!' | '<' | '>' => {
                let two: String = chars[position..(position + 2).min(chars.len())].iter().collect();
                let op = match two.as_str() {
                    "==" | "!=" | "<>" | "<=" | ">=" => two,
                    _ if current == '!' => {
                        return Err(LdError::where_syntax("'!' must be followed by '='"))
                    }
                    _ => current.to_string(),
                };
                position += op.chars().count();
                tokens.push(LdToken::Op(op));
            }
            c if c.is_ascii_digit() || (c == '.' && chars.get(position + 1).is_some_and(char::is_ascii_digit)) => {
                let start = position;
                while position < chars.len()
                    && (chars[position].is_ascii_digit()
                        || chars[position] == '.'
                        || chars[position] == 'e'
                        || chars[position] == 'E')
                {
                    position += 1;
                }
                let literal: String = chars[start..position].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| LdError::where_syntax(format!("invalid number '{literal}'")))?;
                tokens.push(LdToken::Num(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = position;
                while position < chars.len()
                    && (chars[position].is_alphanumeric() || chars[position] == '_' || chars[position] == '.')
                {
                    position += 1;
                }
                let word: String = chars[start..position].iter().collect();
                let upper = word.to_ascii_uppercase();
                if KEYWORDS.contains(&upper.as_str()) {
                    tokens.push(LdToken::Keyword(upper));
                } else {
                    tokens.push(LdToken::Ident(word));
                }
            }
            other => {
                return Err(LdError::where_syntax(format!(
                    "unexpected character '{other}' in '{text}'"
                )))
            }
        }
    }
    Ok(tokens)
}

#[derive(Clone, Debug)]
enum LdOperand {
    Column(String),
    Literal(Value),
    Positional(usize),
    Named(String),
}

#[derive(Clone, Debug)]
enum LdPredicate {
    Or(Box<LdPredicate>, Box<LdPredicate>),
    And(Box<LdPredicate>, Box<LdPredicate>),
    Not(Box<LdPredicate>),
    Compare(LdOperand, String, LdOperand),
    In(LdOperand, Vec<LdOperand>, bool),
    Like(LdOperand, LdOperand, bool),
    Between(LdOperand, LdOperand, LdOperand, bool),
    IsNull(LdOperand, bool),
    Truth(LdOperand),
}

struct LdParser {
    tokens: Vec<LdToken>,
    position: usize,
    positional: usize,
}

impl LdParser {
    fn peek(&self) -> Option<&LdToken> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<LdToken> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(LdToken::Keyword(word)) if word == keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(LdError::where_syntax(format!("expected {keyword}")))
        }
    }

    fn expect(&mut self, expected: LdToken) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(LdError::where_syntax(format!(
                "expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<LdPredicate> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = LdPredicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<LdPredicate> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            left = LdPredicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<LdPredicate> {
        if self.eat_keyword("NOT") {
            return Ok(LdPredicate::Not(Box::new(self.parse_not()?)));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<LdPredicate> {
        if self.peek() == Some(&LdToken::LParen) {
            self.position += 1;
            let inner = self.parse_or()?;
            self.expect(LdToken::RParen)?;
            return Ok(inner);
        }

        let operand = self.parse_operand()?;
        if let Some(LdToken::Op(op)) = self.peek().cloned() {
            self.position += 1;
            let right = self.parse_operand()?;
            return Ok(LdPredicate::Compare(operand, op, right));
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(LdPredicate::IsNull(operand, negated));
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("IN") {
            self.expect(LdToken::LParen)?;
            let mut items = vec![self.parse_operand()?];
            while self.peek() == Some(&LdToken::Comma) {
                self.position += 1;
                items.push(self.parse_operand()?);
            }
            self.expect(LdToken::RParen)?;
            return Ok(LdPredicate::In(operand, items, negated));
        }
        if self.eat_keyword("LIKE") {
            let pattern = self.parse_operand()?;
            return Ok(LdPredicate::Like(operand, pattern, negated));
        }
        if self.eat_keyword("BETWEEN") {
            let low = self.parse_operand()?;
            self.expect_keyword("AND")?;
            let high = self.parse_operand()?;
            return Ok(LdPredicate::Between(operand, low, high, negated));
        }
        if negated {
            return Err(LdError::where_syntax("expected IN, LIKE or BETWEEN after NOT"));
        }
        Ok(LdPredicate::Truth(operand))
    }

    fn parse_operand(&mut self) -> Result<LdOperand> {
        match self.next() {
            Some(LdToken::Ident(name)) => Ok(LdOperand::Column(name)),
            Some(LdToken::Str(text)) => Ok(LdOperand::Literal(Value::String(text))),
            Some(LdToken::Num(number)) => Ok(LdOperand::Literal(number_value(number))),
            Some(LdToken::Minus) => match self.next() {
                Some(LdToken::Num(number)) => Ok(LdOperand::Literal(number_value(-number))),
                other => Err(LdError::where_syntax(format!(
                    "expected a number after '-', found {other:?}"
                ))),
            },
            Some(LdToken::Keyword(word)) if word == "NULL" => Ok(LdOperand::Literal(Value::Null)),
            Some(LdToken::Keyword(word)) if word == "TRUE" => Ok(LdOperand::Literal(Value::Bool(true))),
            Some(LdToken::Keyword(word)) if word == "FALSE" => {
                Ok(LdOperand::Literal(Value::Bool(false)))
            }
            Some(LdToken::Positional) => {
                let slot = self.positional;
                self.positional += 1;
                Ok(LdOperand::Positional(slot))
            }
            Some(LdToken::Named(name)) => Ok(LdOperand::Named(name)),
            other => Err(LdError::where_syntax(format!(
                "expected a column, literal or parameter, found {other:?}"
            ))),
        }
    }
}

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// A parsed `WHERE` predicate.
#[derive(Clone, Debug)]
pub struct LdWhereClause {
    text: String,
    predicate: LdPredicate,
}

impl LdWhereClause {
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(LdError::where_syntax("empty where clause"));
        }
        let mut parser = LdParser {
            tokens,
            position: 0,
            positional: 0,
        };
        let predicate = parser.parse_or()?;
        if parser.position < parser.tokens.len() {
            return Err(LdError::where_syntax(format!(
                "unexpected trailing input in '{text}'"
            )));
        }
        Ok(Self {
            text: text.to_string(),
            predicate,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Row selection mask. `params` binds `?` (a list) or `:name` (a mapping).
    pub fn evaluate(&self, dataset: &LdDataset, params: &Value) -> Result<Vec<bool>> {
        let predicate = bind(&self.predicate, dataset, params)?;
        Ok((0..dataset.len())
            .map(|row| eval(&predicate, dataset, row) == Some(true))
            .collect())
    }

    /// Rows satisfying the predicate, keeping their index labels.
    pub fn filter(&self, dataset: &LdDataset, params: &Value) -> Result<LdDataset> {
        let mask = self.evaluate(dataset, params)?;
        Ok(dataset.filter_mask(&mask))
    }
}

/// Parses `text` and filters `dataset` with it.
pub fn filter_where(dataset: &LdDataset, text: &str, params: &Value) -> Result<LdDataset> {
    LdWhereClause::parse(text)?.filter(dataset, params)
}

fn bind(predicate: &LdPredicate, dataset: &LdDataset, params: &Value) -> Result<LdPredicate> {
    let operand = |operand: &LdOperand| -> Result<LdOperand> {
        match operand {
            LdOperand::Column(name) => {
                dataset.require_column(name)?;
                Ok(operand.clone())
            }
            LdOperand::Positional(slot) => params
                .as_array()
                .and_then(|values| values.get(*slot))
                .cloned()
                .map(LdOperand::Literal)
                .ok_or_else(|| {
                    LdError::validation(format!("where_params has no value for parameter #{}", slot + 1))
                }),
            LdOperand::Named(name) => params
                .as_object()
                .and_then(|values| values.get(name))
                .cloned()
                .map(LdOperand::Literal)
                .ok_or_else(|| {
                    LdError::validation(format!("where_params has no value for ':{name}'"))
                }),
            LdOperand::Literal(_) => Ok(operand.clone()),
        }
    };
    let nested = |inner: &LdPredicate| bind(inner, dataset, params).map(Box::new);

    Ok(match predicate {
        LdPredicate::Or(left, right) => LdPredicate::Or(nested(left)?, nested(right)?),
        LdPredicate::And(left, right) => LdPredicate::And(nested(left)?, nested(right)?),
        LdPredicate::Not(inner) => LdPredicate::Not(nested(inner)?),
        LdPredicate::Compare(left, op, right) => {
            LdPredicate::Compare(operand(left)?, op.clone(), operand(right)?)
        }
        LdPredicate::In(value, items, negated) => LdPredicate::In(
            operand(value)?,
            items.iter().map(&operand).collect::<Result<Vec<_>>>()?,
            *negated,
        ),
        LdPredicate::Like(value, pattern, negated) => {
            LdPredicate::Like(operand(value)?, operand(pattern)?, *negated)
        }
        LdPredicate::Between(value, low, high, negated) => {
            LdPredicate::Between(operand(value)?, operand(low)?, operand(high)?, *negated)
        }
        LdPredicate::IsNull(value, negated) => LdPredicate::IsNull(operand(value)?, *negated),
        LdPredicate::Truth(value) => LdPredicate::Truth(operand(value)?),
    })
}

fn value_of<'a>(operand: &'a LdOperand, dataset: &'a LdDataset, row: usize) -> &'a Value {
    match operand {
        LdOperand::Column(name) => dataset.cell(name, row).unwrap_or(&Value::Null),
        LdOperand::Literal(value) => value,
        LdOperand::Positional(_) | LdOperand::Named(_) => &Value::Null,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) if !text.trim().is_empty() => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(value_to_string(left).cmp(&value_to_string(right))),
    }
}

fn like(value: &Value, pattern: &Value) -> Option<bool> {
    if value.is_null() || pattern.is_null() {
        return None;
    }
    let mut expression = String::from("(?is)^");
    for character in value_to_string(pattern).chars() {
        match character {
            '%' => expression.push_str(".*"),
            '_' => expression.push('.'),
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');
    Regex::new(&expression)
        .ok()
        .map(|regex| regex.is_match(&value_to_string(value)))
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => Some(number.as_f64().is_some_and(|n| n != 0.0)),
        Value::String(text) => Some(matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "yes")),
        _ => Some(true),
    }
}

fn negate(result: Option<bool>, negated: bool) -> Option<bool> {
    result.map(|value| value != negated)
}

fn eval(predicate: &LdPredicate, dataset: &LdDataset, row: usize) -> Option<bool> {
    match predicate {
        LdPredicate::Or(left, right) => match (eval(left, dataset, row), eval(right, dataset, row)) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        LdPredicate::And(left, right) => match (eval(left, dataset, row), eval(right, dataset, row)) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        LdPredicate::Not(inner) => eval(inner, dataset, row).map(|value| !value),
        LdPredicate::Compare(left, op, right) => {
            let ordering = compare(value_of(left, dataset, row), value_of(right, dataset, row))?;
            Some(match op.as_str() {
                "=" | "==" => ordering == Ordering::Equal,
                "!=" | "<>" => ordering != Ordering::Equal,
                "<" => ordering == Ordering::Less,
                "<=" => ordering != Ordering::Greater,
                ">" => ordering == Ordering::Greater,
                ">=" => ordering != Ordering::Less,
                _ => return None,
            })
        }
        LdPredicate::In(value, items, negated) => {
            let value = value_of(value, dataset, row);
            if value.is_null() {
                return None;
            }
            let mut unknown = false;
            for item in items {
                match compare(value, value_of(item, dataset, row)) {
                    Some(Ordering::Equal) => return Some(!negated),
                    None => unknown = true,
                    _ => {}
                }
            }
            if unknown {
                None
            } else {
                Some(*negated)
            }
        }
        LdPredicate::Like(value, pattern, negated) => negate(
            like(value_of(value, dataset, row), value_of(pattern, dataset, row)),
            *negated,
        ),
        LdPredicate::Between(value, low, high, negated) => {
            let value = value_of(value, dataset, row);
            let above = compare(value, value_of(low, dataset, row))?;
            let below = compare(value, value_of(high, dataset, row))?;
            negate(
                Some(above != Ordering::Less && below != Ordering::Greater),
                *negated,
            )
        }
        LdPredicate::IsNull(value, negated) => {
            Some(value_of(value, dataset, row).is_null() != *negated)
        }
        LdPredicate::Truth(value) => truthy(value_of(value, dataset, row)),
    }
}
