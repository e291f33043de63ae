//! Executable statements and up/down plans.
//!
//! A [`Statement`] is one SQL text plus its positional parameters. A [`Plan`]
//! is the ordered list of steps a change operation produces: every step has
//! one forward statement and the statements that undo it. The complete down
//! sequence is every step's down statements, concatenated in step order and
//! then executed in reverse, so later steps are always undone first.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A positional parameter or a value read back from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer (64-bit).
    Int(i64),
    /// Floating point (double precision).
    Float(f64),
    /// Text.
    Text(String),
}

impl Scalar {
    /// Returns the text value, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, parsing text if needed.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the boolean value. Catalog flags come back as `bool`, `0/1`,
    /// `YES/NO` or `t/f` depending on the server.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Text(s) => match s.to_ascii_uppercase().as_str() {
                "YES" | "TRUE" | "T" | "1" => Some(true),
                "NO" | "FALSE" | "F" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns whether this is SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One executable SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Positional parameters.
    pub params: Vec<Scalar>,
}

impl Statement {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a statement with positional parameters.
    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Vec<Scalar>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

/// A forward statement and its inverse.
pub type StatementPair = (Statement, Statement);

/// One row returned by [`crate::executor::QueryExecutor::execute`], keyed by
/// column label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    values: BTreeMap<String, Scalar>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Scalar>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Sets a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: Scalar) {
        self.values.insert(column.into(), value);
    }

    /// Returns the raw value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.values.get(column)
    }

    /// Returns a non-null text column.
    #[must_use]
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Scalar::as_str)
    }

    /// Returns a non-null text column, or an empty string.
    #[must_use]
    pub fn text_or_empty(&self, column: &str) -> &str {
        self.text(column).unwrap_or_default()
    }

    /// Returns an integer column.
    #[must_use]
    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Scalar::as_i64)
    }

    /// Returns a boolean column; NULL and missing read as false.
    #[must_use]
    pub fn flag(&self, column: &str) -> bool {
        self.get(column).and_then(Scalar::as_bool).unwrap_or(false)
    }
}

/// One forward statement with the statements that undo it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Forward statement.
    pub up: Statement,
    /// Undo statements, listed in forward order (executed reversed).
    pub down: Vec<Statement>,
}

/// Ordered up/down statement sequences produced by one change operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step with a single inverse.
    pub fn push(&mut self, up: impl Into<Statement>, down: impl Into<Statement>) {
        self.steps.push(Step {
            up: up.into(),
            down: vec![down.into()],
        });
    }

    /// Appends a forward/inverse pair.
    pub fn push_pair(&mut self, (up, down): StatementPair) {
        self.push(up, down);
    }

    /// Appends a step whose effect is undone by several statements.
    pub fn push_with_downs(&mut self, up: impl Into<Statement>, down: Vec<Statement>) {
        self.steps.push(Step {
            up: up.into(),
            down,
        });
    }

    /// Appends a step that has nothing to undo on its own; an earlier or
    /// later step's inverse restores its effect.
    pub fn push_up(&mut self, up: impl Into<Statement>) {
        self.steps.push(Step {
            up: up.into(),
            down: Vec::new(),
        });
    }

    /// Appends every step of `other`.
    pub fn extend(&mut self, other: Self) {
        self.steps.extend(other.steps);
    }

    /// Returns the steps.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns whether the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the number of forward statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Forward statements in execution order.
    #[must_use]
    pub fn up_statements(&self) -> Vec<&Statement> {
        self.steps.iter().map(|step| &step.up).collect()
    }

    /// Statements that revert the whole plan, in execution order.
    #[must_use]
    pub fn down_statements(&self) -> Vec<&Statement> {
        self.compensation_for(self.steps.len())
    }

    /// Statements that revert the first `applied` steps, in execution order.
    #[must_use]
    pub fn compensation_for(&self, applied: usize) -> Vec<&Statement> {
        self.steps[..applied.min(self.steps.len())]
            .iter()
            .flat_map(|step| step.down.iter())
            .rev()
            .collect()
    }
}
