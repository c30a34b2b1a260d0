use evalexpr::{build_operator_tree, Context as _, ContextWithMutableVariables, HashMapContext, Node};
use sql_script_udf_helpers::IndexMap;

use crate::errors::ScriptSqlError;
use crate::value::Value;

use super::ScriptRuntime;

/// `evalexpr`-backed evaluator for the restricted `expr` dialect: no object
/// literals, no user-defined functions, just arithmetic, comparisons and
/// tuples over a flat variable namespace. The compiled tree is cached after
/// its first use.
pub(crate) struct ExprRuntime {
    body: String,
    compiled: Option<Node>,
}

impl ExprRuntime {
    pub(crate) fn new(body: String) -> Self {
        ExprRuntime { body, compiled: None }
    }

    fn compiled(&mut self) -> Result<&Node, ScriptSqlError> {
        if self.compiled.is_none() {
            let tree = build_operator_tree(&self.body)
                .map_err(|e| ScriptSqlError::script_compile("expr", e.to_string()))?;
            self.compiled = Some(tree);
        }
        Ok(self.compiled.as_ref().expect("just set"))
    }
}

impl ScriptRuntime for ExprRuntime {
    fn dialect(&self) -> &'static str {
        "expr"
    }

    fn eval_from_string(&mut self, source: &str) -> Result<Value, ScriptSqlError> {
        let result = evalexpr::eval(source).map_err(|e| ScriptSqlError::script_runtime("expr", e.to_string()))?;
        from_evalexpr(result)
    }

    fn script_eval(&mut self, env: &IndexMap<String, Value>) -> Result<Value, ScriptSqlError> {
        let mut ctx = HashMapContext::new();
        for (name, value) in env {
            ctx.set_value(name.clone(), to_evalexpr(value))
                .map_err(|e| ScriptSqlError::script_runtime("expr", e.to_string()))?;
        }
        let tree = self.compiled()?;
        let result = tree.eval_with_context(&ctx).map_err(|e| ScriptSqlError::script_runtime("expr", e.to_string()))?;
        from_evalexpr(result)
    }
}

fn to_evalexpr(value: &Value) -> evalexpr::Value {
    match value {
        Value::Null => evalexpr::Value::Empty,
        Value::Bool(b) => evalexpr::Value::Boolean(*b),
        Value::Int(i) => evalexpr::Value::Int(*i),
        Value::Float(f) => evalexpr::Value::Float(*f),
        Value::Str(s) => evalexpr::Value::String(s.to_string()),
        Value::Array(items) => evalexpr::Value::Tuple(items.iter().map(to_evalexpr).collect()),
        // evalexpr has no map type; a plain map argument collapses to its
        // values in insertion order rather than failing the whole call.
        Value::Map(map) => evalexpr::Value::Tuple(map.values().map(to_evalexpr).collect()),
    }
}

fn from_evalexpr(value: evalexpr::Value) -> Result<Value, ScriptSqlError> {
    Ok(match value {
        evalexpr::Value::Empty => Value::Null,
        evalexpr::Value::Boolean(b) => Value::Bool(b),
        evalexpr::Value::Int(i) => Value::Int(i),
        evalexpr::Value::Float(f) => Value::from_f64(f),
        evalexpr::Value::String(s) => Value::Str(s.into_boxed_str()),
        evalexpr::Value::Tuple(items) => {
            Value::Array(items.into_iter().map(from_evalexpr).collect::<Result<_, _>>()?)
        }
    })
}
