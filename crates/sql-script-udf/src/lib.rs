//! Inline `<? ... ?>` script macros, rewritten into synthesized scalar and
//! aggregate UDFs that a host SQL engine's own planner can register and
//! call like any built-in function.
//!
//! [`squery`] is the crate's single entry point: it rewrites a SQL string,
//! registers the UDFs the rewrite produced into a host [`engine::Catalog`],
//! and hands back the rewritten SQL for the host's own parser to take over
//! from there.

mod aggregation;
mod engine;
mod errors;
mod macros;
mod script;
mod udf;
mod value;

pub mod testutil;

pub use aggregation::AggregatorBuffer;
pub use engine::{AggregationExpression, Catalog, Context, Expression, FunctionN, Row};
pub use errors::ScriptSqlError;
pub use macros::MacroParserConfig;
pub use script::ScriptDialect;
pub use udf::{AggregatorKind, Scriptable, UdfDescriptor, UdfType};
pub use value::Value;

use std::sync::Arc;

/// Rewrites every `<? ... ?>` macro in `sql_text` into a call to a
/// synthesized UDF, registers each synthesized function into `catalog`, and
/// returns the rewritten SQL. The host engine's own parser, planner and row
/// iterator take it from there — this crate stops at the SQL string.
pub fn squery(
    sql_text: &str,
    config: MacroParserConfig,
    catalog: &mut dyn Catalog,
) -> Result<String, ScriptSqlError> {
    let mut parser = macros::MacroParser::new(config);
    let (rewritten, descriptors) = parser.rewrite(sql_text)?;
    for descriptor in &descriptors {
        catalog.register(descriptor.as_function());
    }
    Ok(rewritten)
}

/// Returns the descriptors `squery` would register, without needing a
/// catalog — useful for tests and tooling that want to inspect the rewrite
/// directly.
pub fn parse_macros(
    sql_text: &str,
    config: MacroParserConfig,
) -> Result<(String, Vec<Arc<UdfDescriptor>>), ScriptSqlError> {
    macros::MacroParser::new(config).rewrite(sql_text)
}
