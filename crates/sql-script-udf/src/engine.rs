use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::aggregation::AggregatorBuffer;
use crate::errors::ScriptSqlError;
use crate::value::Value;

/// One row of a host query result: an ordered sequence of opaque column
/// values. What a "row" means beyond that — its schema, its source table —
/// is entirely the host engine's business; this crate only ever asks a row
/// for its values by position.
#[derive(Debug, Clone, Default)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Row(values)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// How `$ROW` is bound in a script's environment.
    pub fn to_value(&self) -> Value {
        Value::Array(self.0.clone())
    }
}

/// Carries whatever per-query state the host engine threads through
/// expression evaluation — deadline, cancellation, session settings. This
/// crate never inspects it beyond cooperative cancellation; everything else
/// about a query's context is the host's concern.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// How `$CONTEXT` is bound in a script's environment. The host contract
    /// only promises an opaque carrier, so the only thing worth exposing to
    /// script code is the one thing every dialect can use: cancellation.
    pub fn to_value(&self) -> Value {
        Value::Bool(self.is_cancelled())
    }
}

/// A node in the host engine's expression tree. `Scriptable` both consumes
/// these (as its resolved arguments) and implements this trait itself, so a
/// synthesized UDF call nests into a larger expression exactly like any
/// other host expression.
pub trait Expression: Debug {
    /// The children a planner would substitute via `with_children`.
    fn children(&self) -> &[Box<dyn Expression>];

    /// Whether this expression's type and shape are fully known. Host
    /// engines use this during planning; `Scriptable` is always resolved
    /// once its descriptor and arguments are bound.
    fn resolved(&self) -> bool;

    /// Whether this expression may evaluate to `Value::Null`.
    fn is_nullable(&self) -> bool;

    /// The expression's own textual form — for a column reference this is
    /// the dotted `table.column` name [`crate::udf::Scriptable`] flattens
    /// into a script-environment variable name.
    fn source_name(&self) -> String;

    fn eval(&self, ctx: &Context, row: &Row) -> Result<Value, ScriptSqlError>;

    fn with_children(&self, children: Vec<Box<dyn Expression>>) -> Result<Box<dyn Expression>, ScriptSqlError>;
}

/// Extends [`Expression`] with the buffer lifecycle an aggregating host
/// planner drives across a group: one buffer per group, `update` once per
/// row in the group, `merge` to combine partially-aggregated buffers from
/// parallel execution, `finalize` to read out the projected value.
pub trait AggregationExpression: Expression {
    fn new_buffer(&self) -> Result<AggregatorBuffer, ScriptSqlError>;

    fn update(&self, ctx: &Context, buffer: &mut AggregatorBuffer, row: &Row) -> Result<(), ScriptSqlError>;

    fn merge(
        &self,
        ctx: &Context,
        buffer: &mut AggregatorBuffer,
        partial: &AggregatorBuffer,
    ) -> Result<(), ScriptSqlError>;

    fn finalize(&self, ctx: &Context, buffer: &mut AggregatorBuffer) -> Result<Value, ScriptSqlError>;
}

/// A registrable host-engine function: a name the planner looks up at call
/// sites, and a factory building the bound expression once the planner has
/// resolved the call's argument expressions.
#[derive(Clone)]
pub struct FunctionN {
    pub name: String,
    pub factory: Arc<dyn Fn(Vec<Box<dyn Expression>>) -> crate::udf::Scriptable + Send + Sync>,
}

impl Debug for FunctionN {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionN").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Where a UDF's synthesized name gets registered before the host engine's
/// own parser/planner ever see the rewritten SQL text.
pub trait Catalog {
    fn register(&mut self, function: FunctionN);
}
