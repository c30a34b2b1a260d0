mod scriptable;

pub use scriptable::Scriptable;

use std::sync::{Arc, OnceLock};

use crate::engine::{Expression, FunctionN};
use crate::script::{ScriptDialect, ScriptRuntime};
use crate::value::Value;

/// Which shape of running state an aggregator UDF folds its rows into.
/// `None` marks a plain scalar UDF — it still carries a (trivial, unused)
/// buffer so `Scriptable` can implement the aggregation contract uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorKind {
    None,
    List,
    Set,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdfType {
    pub aggregator_kind: AggregatorKind,
    pub flatten: bool,
    pub transpose: bool,
}

impl UdfType {
    pub fn scalar() -> Self {
        UdfType { aggregator_kind: AggregatorKind::None, flatten: false, transpose: false }
    }

    pub fn is_aggregator(&self) -> bool {
        self.aggregator_kind != AggregatorKind::None
    }
}

/// A synthesized UDF: the rewritten body of one `<? ... ?>` macro plus
/// everything the host engine needs to register and invoke it.
///
/// One descriptor is shared (via `Arc`) by every `Scriptable` bound against
/// it — each bound call site still owns its own `ScriptRuntime`, so two
/// concurrent evaluations of the same UDF never contend over compiled
/// script state, but they agree on dialect, body and aggregator shape.
#[derive(Debug)]
pub struct UdfDescriptor {
    pub id: String,
    pub dialect: ScriptDialect,
    pub body: String,
    pub udf_type: UdfType,
    /// Raw seed source for a Generic aggregator, still wearing its `@` ...
    /// `#` delimiters exactly as the macro parser sliced them out. `None`
    /// for every other kind.
    seed_source: Option<String>,
    /// The seed is evaluated once, the first time any bound `Scriptable`
    /// asks for a fresh buffer, then reused for every subsequent buffer —
    /// re-running a side-effecting seed expression per row would be
    /// observably different from running it once per query.
    seed_memo: OnceLock<Value>,
}

impl UdfDescriptor {
    pub fn new(id: String, dialect: ScriptDialect, body: String, udf_type: UdfType) -> Self {
        UdfDescriptor { id, dialect, body, udf_type, seed_source: None, seed_memo: OnceLock::new() }
    }

    pub fn with_generic_seed(mut self, seed_source: String) -> Self {
        self.seed_source = Some(seed_source);
        self
    }

    /// Evaluates (once) and returns the Generic aggregator's seed value.
    /// The stored seed source is `@<expr>#`; the one-character leading and
    /// trailing delimiters are stripped before the expression reaches the
    /// runtime.
    ///
    /// A seed that fails to evaluate is a diagnostic, not a row-level error:
    /// it is logged at `warn!` and the buffer starts from the raw seed text
    /// instead, which degrades into a later script-runtime type error rather
    /// than aborting the query before a single row has been read.
    pub(crate) fn seed_value(&self) -> &Value {
        self.seed_memo.get_or_init(|| {
            let Some(source) = self.seed_source.as_deref() else {
                log::error!("udf `{}` is marked Generic but carries no seed source", self.id);
                return Value::Null;
            };
            let Some(expr) = source.strip_prefix('@').and_then(|s| s.strip_suffix('#')) else {
                log::warn!("udf `{}` seed source `{source}` missing @ / # delimiters, using raw text", self.id);
                return Value::from(source.to_string());
            };
            let mut runtime = crate::script::make_runtime(self.dialect, String::new());
            match runtime.eval_from_string(expr) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("udf `{}` seed evaluation failed ({e}), retaining raw seed text", self.id);
                    Value::from(expr.to_string())
                }
            }
        })
    }

    /// Builds the host-engine function registration for this descriptor:
    /// a name and a factory closure the catalog calls with the resolved
    /// child argument expressions at query-planning time.
    pub fn as_function(self: &Arc<Self>) -> FunctionN {
        let meta = Arc::clone(self);
        FunctionN {
            name: meta.id.clone(),
            factory: Arc::new(move |args: Vec<Box<dyn Expression>>| Scriptable::bind(Arc::clone(&meta), args)),
        }
    }
}
