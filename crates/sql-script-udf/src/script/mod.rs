#[cfg(feature = "expr")]
mod expr;
#[cfg(feature = "js")]
mod js;
#[cfg(feature = "v8")]
mod v8;

use sql_script_udf_helpers::IndexMap;
use strum_macros::{Display, EnumString};

use crate::errors::ScriptSqlError;
use crate::value::Value;

/// The script dialects a UDF body can be written in. Unrecognised or absent
/// tags fall back to `Js`, matching the host contract's documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum ScriptDialect {
    #[default]
    #[strum(serialize = "js")]
    Js,
    #[strum(serialize = "expr")]
    Expr,
    #[strum(serialize = "v8")]
    V8,
}

/// The uniform contract every concrete script backend implements: compile
/// (lazily, on first use) and evaluate, either from a bare source string or
/// against a bound environment of named values.
///
/// Implementations own mutable, non-thread-shareable interpreter state
/// (a QuickJS context, an `evalexpr` compiled tree, a V8 isolate); the
/// trait's methods all take `&mut self` so callers cannot evaluate the same
/// runtime from two places at once, and no implementation here is `Sync`.
pub(crate) trait ScriptRuntime {
    /// The dialect identifier the host contract reports for this runtime,
    /// e.g. `"ECMAScript5.1"` for the `js` backend.
    fn dialect(&self) -> &'static str;

    /// Evaluates a standalone expression with no bound environment — used
    /// once, to compute a Generic aggregator's seed value.
    fn eval_from_string(&mut self, source: &str) -> Result<Value, ScriptSqlError>;

    /// Evaluates this runtime's bound script body against a named
    /// environment (`$ROW`, `$CONTEXT`, `$ARGS`, `$_`, and the per-table
    /// parameter groups extracted from `@{...}` placeholders).
    fn script_eval(&mut self, env: &IndexMap<String, Value>) -> Result<Value, ScriptSqlError>;
}

/// Builds the concrete runtime for `dialect`, bound to `body`. `body` is the
/// already-rewritten script source (class prefix and `@{...}` wrappers
/// already stripped by the macro parser).
pub(crate) fn make_runtime(dialect: ScriptDialect, body: String) -> Box<dyn ScriptRuntime> {
    match dialect {
        #[cfg(feature = "js")]
        ScriptDialect::Js => Box::new(js::JsRuntime::new(body)),
        #[cfg(not(feature = "js"))]
        ScriptDialect::Js => Box::new(UnsupportedRuntime::new("js", body)),

        #[cfg(feature = "expr")]
        ScriptDialect::Expr => Box::new(expr::ExprRuntime::new(body)),
        #[cfg(not(feature = "expr"))]
        ScriptDialect::Expr => Box::new(UnsupportedRuntime::new("expr", body)),

        #[cfg(feature = "v8")]
        ScriptDialect::V8 => Box::new(v8::V8Runtime::new(body)),
        #[cfg(not(feature = "v8"))]
        ScriptDialect::V8 => Box::new(UnsupportedRuntime::new("v8", body)),
    }
}

/// Stands in for a dialect whose backing crate was compiled out via Cargo
/// features, so registering a UDF in that dialect fails with a clear error
/// instead of a missing-symbol link failure.
#[allow(dead_code)]
struct UnsupportedRuntime {
    dialect: &'static str,
}

#[allow(dead_code)]
impl UnsupportedRuntime {
    fn new(dialect: &'static str, _body: String) -> Self {
        UnsupportedRuntime { dialect }
    }
}

impl ScriptRuntime for UnsupportedRuntime {
    fn dialect(&self) -> &'static str {
        self.dialect
    }

    fn eval_from_string(&mut self, _source: &str) -> Result<Value, ScriptSqlError> {
        Err(ScriptSqlError::script_compile(self.dialect, "this build was compiled without this dialect's feature"))
    }

    fn script_eval(&mut self, _env: &IndexMap<String, Value>) -> Result<Value, ScriptSqlError> {
        Err(ScriptSqlError::script_compile(self.dialect, "this build was compiled without this dialect's feature"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn dialect_parses_case_insensitively() {
        assert_eq!(ScriptDialect::from_str("JS").unwrap(), ScriptDialect::Js);
        assert_eq!(ScriptDialect::from_str("V8").unwrap(), ScriptDialect::V8);
    }

    #[test]
    fn dialect_defaults_to_js() {
        assert_eq!(ScriptDialect::default(), ScriptDialect::Js);
    }
}
