use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use sql_script_udf_helpers::IndexMap;

use crate::aggregation::AggregatorBuffer;
use crate::engine::{AggregationExpression, Context, Expression, Row};
use crate::errors::ScriptSqlError;
use crate::script::{self, ScriptRuntime};
use crate::udf::{AggregatorKind, UdfDescriptor};
use crate::value::Value;

/// The host-facing expression a synthesized UDF call compiles to: a shared
/// [`UdfDescriptor`] plus the resolved argument expressions this particular
/// call site was given.
///
/// Each `Scriptable` owns its own [`ScriptRuntime`] rather than sharing one
/// with its descriptor — two call sites for the same UDF (or two group
/// buffers evaluated concurrently by the host) never contend over a single
/// interpreter. The runtime sits behind a `RefCell` because evaluation needs
/// `&mut self` on the runtime but `Expression::eval` only gets `&self`; this
/// also makes `Scriptable` `!Sync`, which matches every concrete runtime's
/// own single-threaded interpreter state.
pub struct Scriptable {
    meta: Arc<UdfDescriptor>,
    args: Vec<Box<dyn Expression>>,
    runtime: RefCell<Box<dyn ScriptRuntime>>,
}

impl fmt::Debug for Scriptable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scriptable")
            .field("id", &self.meta.id)
            .field("dialect", &self.meta.dialect)
            .field("args", &self.args.len())
            .finish()
    }
}

impl Scriptable {
    pub fn bind(meta: Arc<UdfDescriptor>, args: Vec<Box<dyn Expression>>) -> Scriptable {
        let runtime = script::make_runtime(meta.dialect, meta.body.clone());
        Scriptable { meta, args, runtime: RefCell::new(runtime) }
    }

    /// Which shape of aggregator (if any) this UDF was classified as.
    pub fn aggregator_kind(&self) -> AggregatorKind {
        self.meta.udf_type.aggregator_kind
    }

    /// Whether this UDF's final aggregated value should be expanded into one
    /// output row per element (sequence) or per entry (mapping) instead of a
    /// single grouped row. This crate only classifies and carries the flag —
    /// expanding rows is the surrounding query engine's planner's job, which
    /// reads this accessor the same way it reads any other expression
    /// metadata before wiring up its own row iterator.
    pub fn transpose(&self) -> bool {
        self.meta.udf_type.transpose
    }

    /// Resolves every argument against `row`, binds each one in the script
    /// environment under the same flattened name the macro parser rewrote
    /// its `@{...}` placeholder to (`mytable.name` -> `mytable_name`), and
    /// runs the script body alongside the standard `$ROW` / `$CONTEXT` /
    /// `$ARGS` / `$_` bindings.
    fn eval_script(&self, ctx: &Context, row: &Row, partial: Option<Value>) -> Result<Value, ScriptSqlError> {
        let mut env: IndexMap<String, Value> = IndexMap::default();
        let mut arg_values = Vec::with_capacity(self.args.len());

        for arg in &self.args {
            let value = arg.eval(ctx, row)?;
            let name = arg.source_name();
            if !name.is_empty() {
                env.insert(crate::macros::flatten_identifier(&name), value.clone());
            }
            arg_values.push(value);
        }

        env.insert("$ROW".to_string(), row.to_value());
        env.insert("$CONTEXT".to_string(), ctx.to_value());
        env.insert("$ARGS".to_string(), Value::Array(arg_values));
        if let Some(partial) = partial {
            env.insert("$_".to_string(), partial);
        }

        self.runtime.borrow_mut().script_eval(&env)
    }
}

impl Expression for Scriptable {
    fn children(&self) -> &[Box<dyn Expression>] {
        &self.args
    }

    fn resolved(&self) -> bool {
        true
    }

    fn is_nullable(&self) -> bool {
        true
    }

    fn source_name(&self) -> String {
        self.meta.id.clone()
    }

    fn eval(&self, ctx: &Context, row: &Row) -> Result<Value, ScriptSqlError> {
        self.eval_script(ctx, row, None)
    }

    fn with_children(&self, children: Vec<Box<dyn Expression>>) -> Result<Box<dyn Expression>, ScriptSqlError> {
        Ok(Box::new(Scriptable::bind(Arc::clone(&self.meta), children)))
    }
}

impl AggregationExpression for Scriptable {
    fn new_buffer(&self) -> Result<AggregatorBuffer, ScriptSqlError> {
        Ok(match self.meta.udf_type.aggregator_kind {
            AggregatorKind::None => AggregatorBuffer::scalar(),
            AggregatorKind::List => AggregatorBuffer::list(),
            AggregatorKind::Set => AggregatorBuffer::set(),
            AggregatorKind::Generic => AggregatorBuffer::generic(self.meta.seed_value().clone()),
        })
    }

    fn update(&self, ctx: &Context, buffer: &mut AggregatorBuffer, row: &Row) -> Result<(), ScriptSqlError> {
        let kind = self.meta.udf_type.aggregator_kind;
        if kind == AggregatorKind::None {
            return Ok(());
        }
        let current = buffer.current();
        let result = self.eval_script(ctx, row, Some(current))?;
        buffer.fold(kind, self.meta.udf_type.flatten, result)
    }

    fn merge(
        &self,
        _ctx: &Context,
        buffer: &mut AggregatorBuffer,
        partial: &AggregatorBuffer,
    ) -> Result<(), ScriptSqlError> {
        let kind = self.meta.udf_type.aggregator_kind;
        if kind == AggregatorKind::None {
            return Ok(());
        }
        // No row exists to bind script arguments against when combining two
        // partial buffers, so merge reuses update's fold table directly
        // with the partial buffer's own (already finalised) value.
        let mut partial = partial.clone();
        let result = partial.finalize()?;
        buffer.fold(kind, self.meta.udf_type.flatten, result)
    }

    fn finalize(&self, _ctx: &Context, buffer: &mut AggregatorBuffer) -> Result<Value, ScriptSqlError> {
        buffer.finalize()
    }
}
