use rquickjs::{Context as QuickContext, Ctx, IntoJs, Object, Runtime};
use sql_script_udf_helpers::IndexMap;

use crate::errors::ScriptSqlError;
use crate::value::Value;

use super::ScriptRuntime;

/// QuickJS-backed evaluator. One context is created per bound `Scriptable`
/// and reused across calls — globals are overwritten each `script_eval`,
/// never accumulated.
pub(crate) struct JsRuntime {
    _runtime: Runtime,
    context: QuickContext,
    body: String,
}

impl JsRuntime {
    pub(crate) fn new(body: String) -> Self {
        let runtime = Runtime::new().expect("quickjs runtime init");
        let context = QuickContext::full(&runtime).expect("quickjs context init");
        JsRuntime { _runtime: runtime, context, body }
    }
}

impl ScriptRuntime for JsRuntime {
    fn dialect(&self) -> &'static str {
        "ECMAScript5.1"
    }

    fn eval_from_string(&mut self, source: &str) -> Result<Value, ScriptSqlError> {
        let source = source.to_owned();
        self.context.with(|ctx| {
            let result: rquickjs::Value = ctx
                .eval(source)
                .map_err(|e| ScriptSqlError::script_runtime("js", e.to_string()))?;
            from_js(&result)
        })
    }

    fn script_eval(&mut self, env: &IndexMap<String, Value>) -> Result<Value, ScriptSqlError> {
        let body = self.body.clone();
        self.context.with(|ctx| {
            let globals = ctx.globals();
            for (name, value) in env {
                let js_value = to_js(ctx, value)
                    .map_err(|e| ScriptSqlError::script_runtime("js", e.to_string()))?;
                globals
                    .set(name.as_str(), js_value)
                    .map_err(|e| ScriptSqlError::script_runtime("js", e.to_string()))?;
            }
            let result: rquickjs::Value = ctx
                .eval(body)
                .map_err(|e| ScriptSqlError::script_runtime("js", e.to_string()))?;
            from_js(&result)
        })
    }
}

fn to_js<'js>(ctx: Ctx<'js>, value: &Value) -> rquickjs::Result<rquickjs::Value<'js>> {
    match value {
        Value::Null => Ok(rquickjs::Value::new_null(ctx)),
        Value::Bool(b) => b.into_js(&ctx),
        Value::Int(i) => (*i as f64).into_js(&ctx),
        Value::Float(f) => f.into_js(&ctx),
        Value::Str(s) => s.as_ref().into_js(&ctx),
        Value::Array(items) => {
            let array = rquickjs::Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                array.set(i, to_js(ctx.clone(), item)?)?;
            }
            array.into_js(&ctx)
        }
        Value::Map(map) => {
            let object = Object::new(ctx.clone())?;
            for (k, v) in map {
                object.set(k.as_str(), to_js(ctx.clone(), v)?)?;
            }
            object.into_js(&ctx)
        }
    }
}

fn from_js(value: &rquickjs::Value<'_>) -> Result<Value, ScriptSqlError> {
    if value.is_null() || value.is_undefined() {
        return Ok(Value::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(Value::Int(i as i64));
    }
    if let Some(f) = value.as_float() {
        return Ok(Value::from_f64(f));
    }
    if let Some(s) = value.as_string() {
        let s = s
            .to_string()
            .map_err(|e| ScriptSqlError::script_runtime("js", e.to_string()))?;
        return Ok(Value::Str(s.into_boxed_str()));
    }
    if let Some(array) = value.as_array() {
        let mut items = Vec::with_capacity(array.len());
        for item in array.iter::<rquickjs::Value>() {
            let item = item.map_err(|e| ScriptSqlError::script_runtime("js", e.to_string()))?;
            items.push(from_js(&item)?);
        }
        return Ok(Value::Array(items));
    }
    if let Some(object) = value.as_object() {
        let mut map = IndexMap::default();
        for key in object.keys::<String>() {
            let key = key.map_err(|e| ScriptSqlError::script_runtime("js", e.to_string()))?;
            let item: rquickjs::Value = object
                .get(key.as_str())
                .map_err(|e| ScriptSqlError::script_runtime("js", e.to_string()))?;
            map.insert(key, from_js(&item)?);
        }
        return Ok(Value::Map(map));
    }
    Err(ScriptSqlError::script_runtime("js", "unsupported QuickJS value in result"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_plain_expression() {
        let mut runtime = JsRuntime::new(String::new());
        assert_eq!(runtime.eval_from_string("[1, 2]").unwrap(), Value::Array(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn binds_environment_into_globals() {
        let mut runtime = JsRuntime::new("mytable.name + '!'".to_string());
        let mut mytable = IndexMap::default();
        mytable.insert("name".to_string(), Value::Str("Bob".into()));
        let mut env = IndexMap::default();
        env.insert("mytable".to_string(), Value::Map(mytable));
        assert_eq!(runtime.script_eval(&env).unwrap(), Value::Str("Bob!".into()));
    }
}
