use deno_core::JsRuntime as DenoJsRuntime;
use deno_core::RuntimeOptions;
use sql_script_udf_helpers::IndexMap;

use crate::errors::ScriptSqlError;
use crate::value::Value;

use super::ScriptRuntime;

/// V8-backed evaluator via `deno_core`, for dialects that need real
/// ECMAScript 6+ features `js`'s QuickJS backend doesn't offer.
///
/// `deno_core` does not expose a way to hand a `serde`-friendly Rust value
/// into the isolate directly, so every call is marshalled through JSON: the
/// bound environment is JSON-encoded into a small wrapper function's
/// `let name = <json>;` prelude, the body runs as that function's last
/// statement, and the whole thing is wrapped in `JSON.stringify(...)` so
/// the one value that crosses back out of the isolate is always a string.
pub(crate) struct V8Runtime {
    runtime: DenoJsRuntime,
    body: String,
}

impl V8Runtime {
    pub(crate) fn new(body: String) -> Self {
        let runtime = DenoJsRuntime::new(RuntimeOptions::default());
        V8Runtime { runtime, body }
    }

    fn run_json(&mut self, wrapped_source: String) -> Result<Value, ScriptSqlError> {
        let global = self
            .runtime
            .execute_script("sql-script-udf:v8", wrapped_source)
            .map_err(|e| ScriptSqlError::script_runtime("v8", e.to_string()))?;

        let scope = &mut self.runtime.handle_scope();
        let local = deno_core::v8::Local::new(scope, global);
        let json_text = local.to_rust_string_lossy(scope);

        let json_value: serde_json::Value = serde_json::from_str(&json_text)
            .map_err(|e| ScriptSqlError::script_runtime("v8", e.to_string()))?;
        Ok(Value::from(json_value))
    }
}

/// Turns `source` into a function body whose return value is the value of
/// `source`'s *last* statement — the shape every aggregator body in this
/// crate relies on (`$_[0]+=1; $_[1]*=$_[0]; $_`). Wrapping the whole source
/// directly in `return (...)` only works for a single expression: a
/// semicolon-separated statement sequence is not valid inside a
/// parenthesized expression. Every statement but the last is emitted
/// unchanged; the last is reattached behind `return`.
fn wrap_as_return(source: &str) -> String {
    let trimmed = source.trim().trim_end_matches(';').trim();
    match trimmed.rfind(';') {
        Some(idx) => {
            let (preamble, tail) = trimmed.split_at(idx + 1);
            format!("{preamble}\n  return ({});", tail.trim())
        }
        None => format!("return ({trimmed});"),
    }
}

impl ScriptRuntime for V8Runtime {
    fn dialect(&self) -> &'static str {
        "V8EcmaScript6"
    }

    fn eval_from_string(&mut self, source: &str) -> Result<Value, ScriptSqlError> {
        let body = wrap_as_return(source);
        self.run_json(format!("JSON.stringify((function() {{\n  {body}\n}})())"))
    }

    fn script_eval(&mut self, env: &IndexMap<String, Value>) -> Result<Value, ScriptSqlError> {
        let mut wrapper = String::from("(function __anon__() {\n");
        for (name, value) in env {
            let json = serde_json::to_string(value)
                .map_err(|e| ScriptSqlError::script_runtime("v8", e.to_string()))?;
            wrapper.push_str(&format!("  let {name} = {json};\n"));
        }
        wrapper.push_str(&format!("  {}\n}})()", wrap_as_return(&self.body)));
        self.run_json(format!("JSON.stringify({wrapper})"))
    }
}

impl Drop for V8Runtime {
    fn drop(&mut self) {
        // Terminate any still-running script before the isolate's own Drop
        // tears it down; a body that never returns would otherwise hang the
        // engine thread that owns this runtime.
        self.runtime.v8_isolate().terminate_execution();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_plain_expression() {
        let mut runtime = V8Runtime::new(String::new());
        assert_eq!(runtime.eval_from_string("1 + 2").unwrap(), Value::Int(3));
    }

    #[test]
    fn binds_environment_variables() {
        let mut runtime = V8Runtime::new("x + y".to_string());
        let mut env = IndexMap::default();
        env.insert("x".to_string(), Value::Int(1));
        env.insert("y".to_string(), Value::Int(2));
        assert_eq!(runtime.script_eval(&env).unwrap(), Value::Int(3));
    }

    #[test]
    fn multi_statement_body_returns_its_last_statement() {
        // The shape every Generic-aggregator fold body uses: mutate the
        // bound values, then yield them. A `return (body);` wrapper around
        // the whole thing is invalid JS for this — it must split the last
        // statement off instead.
        let mut runtime = V8Runtime::new("x += 1; y += 1; x + y".to_string());
        let mut env = IndexMap::default();
        env.insert("x".to_string(), Value::Int(1));
        env.insert("y".to_string(), Value::Int(2));
        assert_eq!(runtime.script_eval(&env).unwrap(), Value::Int(5));
    }
}
