use thiserror::Error;

/// Everything that can go wrong while rewriting inline script macros or
/// evaluating the scriptable UDFs they expand into.
#[derive(Debug, Error)]
pub enum ScriptSqlError {
    /// The `<? ... ?>` or `@{...}` grammar was violated: unterminated macro,
    /// unknown class tag, missing `#` in a generic-aggregator seed, or a
    /// malformed parameter identifier.
    #[error("macro syntax error: {0}")]
    MacroSyntax(String),

    #[error("failed to compile {dialect} script: {message}")]
    ScriptCompile { dialect: &'static str, message: String },

    #[error("{dialect} script raised an error: {message}")]
    ScriptRuntime { dialect: &'static str, message: String },

    /// A child expression supplying an argument failed to resolve against
    /// the current row, or an `@{...}` placeholder did not name a valid
    /// dotted identifier.
    #[error("could not resolve argument: {0}")]
    ArgResolution(String),
}

impl ScriptSqlError {
    pub fn macro_syntax(message: impl Into<String>) -> Self {
        Self::MacroSyntax(message.into())
    }

    pub fn script_compile(dialect: &'static str, message: impl Into<String>) -> Self {
        Self::ScriptCompile { dialect, message: message.into() }
    }

    pub fn script_runtime(dialect: &'static str, message: impl Into<String>) -> Self {
        Self::ScriptRuntime { dialect, message: message.into() }
    }

    pub fn arg_resolution(message: impl Into<String>) -> Self {
        Self::ArgResolution(message.into())
    }
}
