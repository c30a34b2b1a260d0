use fancy_regex::Regex;
use sql_script_udf_helpers::IndexSet;
use std::sync::OnceLock;

use crate::errors::ScriptSqlError;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@\{([^{}]*)\}").expect("valid placeholder regex"))
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("valid identifier regex")
    })
}

/// Scans a script body for `@{table.column}` placeholders, validates each
/// one as a fully anchored dotted identifier, and replaces the `@{...}`
/// wrapper with a flat variable reference (`mytable.name` becomes
/// `mytable_name`) the runtime binds directly in the script environment.
///
/// A flat binding, rather than a nested `mytable.name` property access, is
/// what lets the same rewritten body run unmodified under every dialect —
/// `expr`'s restricted grammar has no member-access operator, so the one
/// binding shape that works everywhere is a plain variable per argument.
///
/// Returns the rewritten body and the distinct identifiers in first-seen
/// order — that order becomes the UDF's positional SQL argument list, so the
/// same column referenced twice only needs to be evaluated, and passed to
/// the host function call, once.
pub(crate) fn extract_params(body: &str) -> Result<(String, Vec<String>), ScriptSqlError> {
    let mut order: IndexSet<String> = IndexSet::default();
    let mut out = String::with_capacity(body.len());
    let mut last = 0;

    for captures in placeholder_re().captures_iter(body) {
        let captures = captures.map_err(|e| ScriptSqlError::macro_syntax(e.to_string()))?;
        let whole = captures.get(0).expect("group 0 always present");
        let ident = captures.get(1).map(|m| m.as_str()).unwrap_or("");

        if !identifier_re().is_match(ident).unwrap_or(false) {
            return Err(ScriptSqlError::arg_resolution(format!(
                "`@{{{ident}}}` is not a valid dotted identifier"
            )));
        }

        out.push_str(&body[last..whole.start()]);
        out.push_str(&flatten_identifier(ident));
        order.insert(ident.to_string());
        last = whole.end();
    }
    out.push_str(&body[last..]);

    Ok((out, order.into_iter().collect()))
}

/// The flat variable name a dotted argument identifier is bound under in
/// the script environment, e.g. `mytable.name` -> `mytable_name`.
pub(crate) fn flatten_identifier(name: &str) -> String {
    name.replace('.', "_")
}
