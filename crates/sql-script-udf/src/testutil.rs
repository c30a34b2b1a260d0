//! A deliberately tiny in-memory stand-in for a host SQL engine's catalog
//! and row representation, used to exercise [`crate::squery`] and the
//! resulting [`crate::Scriptable`] calls end to end without depending on a
//! real SQL parser, planner or execution engine — all of which are outside
//! this crate's scope.

use sql_script_udf_helpers::IndexMap;

use crate::engine::{Catalog, Context, Expression, FunctionN, Row};
use crate::errors::ScriptSqlError;
use crate::value::Value;

/// Registers [`FunctionN`]s by name, as a host engine's function catalog
/// would at the point a rewritten `SELECT` is handed off to its own parser.
#[derive(Default)]
pub struct MemoryCatalog {
    functions: IndexMap<String, FunctionN>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        MemoryCatalog::default()
    }

    pub fn get(&self, name: &str) -> Option<&FunctionN> {
        self.functions.get(name)
    }

    /// Looks up a registered function by name and binds it against `args`,
    /// mirroring what a host planner does once it has resolved a call
    /// site's argument expressions.
    pub fn call(&self, name: &str, args: Vec<Box<dyn Expression>>) -> Option<crate::Scriptable> {
        self.functions.get(name).map(|f| (f.factory)(args))
    }
}

impl Catalog for MemoryCatalog {
    fn register(&mut self, function: FunctionN) {
        self.functions.insert(function.name.clone(), function);
    }
}

/// A reference to one named column of a row, resolved positionally. Mirrors
/// how a host engine's own column-reference expression would behave: its
/// `source_name` is the dotted `table.column` text [`crate::Scriptable`]
/// groups arguments by.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub name: String,
    pub index: usize,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        ColumnRef { name: name.into(), index }
    }
}

impl Expression for ColumnRef {
    fn children(&self) -> &[Box<dyn Expression>] {
        &[]
    }

    fn resolved(&self) -> bool {
        true
    }

    fn is_nullable(&self) -> bool {
        true
    }

    fn source_name(&self) -> String {
        self.name.clone()
    }

    fn eval(&self, _ctx: &Context, row: &Row) -> Result<Value, ScriptSqlError> {
        Ok(row.get(self.index).cloned().unwrap_or(Value::Null))
    }

    fn with_children(&self, _children: Vec<Box<dyn Expression>>) -> Result<Box<dyn Expression>, ScriptSqlError> {
        unreachable!("column references have no children to replace")
    }
}

/// A constant-valued expression, standing in for whatever literal or
/// already-evaluated sub-expression a host engine would hand a UDF call.
#[derive(Debug, Clone)]
pub struct Literal(pub Value);

impl Expression for Literal {
    fn children(&self) -> &[Box<dyn Expression>] {
        &[]
    }

    fn resolved(&self) -> bool {
        true
    }

    fn is_nullable(&self) -> bool {
        matches!(self.0, Value::Null)
    }

    fn source_name(&self) -> String {
        String::new()
    }

    fn eval(&self, _ctx: &Context, _row: &Row) -> Result<Value, ScriptSqlError> {
        Ok(self.0.clone())
    }

    fn with_children(&self, _children: Vec<Box<dyn Expression>>) -> Result<Box<dyn Expression>, ScriptSqlError> {
        unreachable!("literals have no children to replace")
    }
}

/// The four-row `mytable` dataset used throughout the concrete evaluation
/// scenarios: two `John Doe` rows, one `Jane Doe`, one `Evil Bob`, with
/// `phone_numbers` array lengths 1, 0, 0 and 2 respectively.
pub fn mytable_rows() -> Vec<Row> {
    vec![
        Row::new(vec![
            Value::from("John Doe"),
            Value::from("john@example.com"),
            Value::Array(vec![Value::from("555-0100")]),
            Value::from("2020-01-01"),
        ]),
        Row::new(vec![
            Value::from("John Doe"),
            Value::from("john.doe@example.com"),
            Value::Array(vec![]),
            Value::from("2020-01-02"),
        ]),
        Row::new(vec![
            Value::from("Jane Doe"),
            Value::from("jane@example.com"),
            Value::Array(vec![]),
            Value::from("2020-01-03"),
        ]),
        Row::new(vec![
            Value::from("Evil Bob"),
            Value::from("bob@example.com"),
            Value::Array(vec![Value::from("555-0200"), Value::from("555-0201")]),
            Value::from("2020-01-04"),
        ]),
    ]
}

pub const MYTABLE_COLUMNS: [&str; 4] = ["name", "email", "phone_numbers", "created_at"];

/// Stands in for the row-expansion a host planner performs when it reads
/// [`crate::Scriptable::transpose`] as `true`: one output row per element of
/// a sequence, or one per entry of a mapping (emitted as a `[key, value]`
/// pair so the entry's key survives the expansion). Any other shape is
/// already a single row.
///
/// This crate only classifies Transpose and exposes it as a flag — actually
/// turning one grouped result into many rows is the surrounding query
/// engine's job, which is why this lives in `testutil` rather than
/// `aggregation` or `udf`: it exists only so this crate's own tests can
/// assert a concrete row count the way a host engine's planner would
/// produce one.
pub fn expand_transpose(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Map(map) => map.into_iter().map(|(k, v)| Value::Array(vec![Value::from(k), v])).collect(),
        other => vec![other],
    }
}

/// Builds the `ColumnRef` arguments a call site would resolve for a UDF
/// that was given `params` (dotted `mytable.column` identifiers) as its
/// positional SQL arguments.
pub fn column_refs(params: &[String]) -> Vec<Box<dyn Expression>> {
    params
        .iter()
        .map(|p| {
            let column = p.split_once('.').map(|(_, c)| c).unwrap_or(p.as_str());
            let index = MYTABLE_COLUMNS.iter().position(|c| *c == column).unwrap_or(0);
            Box::new(ColumnRef::new(p.clone(), index)) as Box<dyn Expression>
        })
        .collect()
}
