use ahash::AHashSet;

use crate::errors::ScriptSqlError;
use crate::udf::AggregatorKind;
use crate::value::Value;

/// Where a buffer sits in its lifecycle. A host planner is expected to call
/// `new_buffer` once, `update`/`merge` any number of times, then `finalize`
/// exactly once; this lets us catch a planner that finalizes twice or keeps
/// folding into an already-finalised buffer instead of silently producing a
/// wrong answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferState {
    Fresh,
    Accumulating,
    Finalised,
}

/// The running state of one aggregator UDF over one group. The storage
/// shape is fixed by the UDF's [`AggregatorKind`] at `new_buffer` time and
/// never changes afterwards.
#[derive(Debug, Clone)]
pub struct AggregatorBuffer {
    state: BufferState,
    storage: Storage,
}

#[derive(Debug, Clone)]
enum Storage {
    /// Scalar UDFs still need a buffer to satisfy the aggregation contract
    /// uniformly; it is created and dropped without ever being folded into.
    Scalar,
    List(Vec<Value>),
    Set(AHashSet<Value>),
    Generic(Value),
}

impl AggregatorBuffer {
    pub fn scalar() -> Self {
        AggregatorBuffer { state: BufferState::Fresh, storage: Storage::Scalar }
    }

    pub fn list() -> Self {
        AggregatorBuffer { state: BufferState::Fresh, storage: Storage::List(Vec::new()) }
    }

    pub fn set() -> Self {
        AggregatorBuffer { state: BufferState::Fresh, storage: Storage::Set(AHashSet::default()) }
    }

    pub fn generic(seed: Value) -> Self {
        AggregatorBuffer { state: BufferState::Fresh, storage: Storage::Generic(seed) }
    }

    /// The value `$_` is bound to before folding the next row or partial
    /// buffer in: for List/Set this is the accumulated value-so-far
    /// rendered as an array; for Generic it is the buffer's single cell.
    pub fn current(&self) -> Value {
        match &self.storage {
            Storage::Scalar => Value::Null,
            Storage::List(items) => Value::Array(items.clone()),
            Storage::Set(items) => Value::Array(items.iter().cloned().collect()),
            Storage::Generic(value) => value.clone(),
        }
    }

    fn guard_not_finalised(&self) -> Result<(), ScriptSqlError> {
        if self.state == BufferState::Finalised {
            return Err(ScriptSqlError::arg_resolution(
                "aggregator buffer folded into after it was already finalised",
            ));
        }
        Ok(())
    }

    /// Folds one script result into the buffer per the UDF's kind: List
    /// appends (splicing element-by-element under Flatten), Set inserts the
    /// same way but deduplicates, Generic simply replaces the single cell.
    pub fn fold(&mut self, kind: AggregatorKind, flatten: bool, result: Value) -> Result<(), ScriptSqlError> {
        self.guard_not_finalised()?;
        self.state = BufferState::Accumulating;

        match (&mut self.storage, kind) {
            (Storage::Scalar, AggregatorKind::None) => {}
            (Storage::List(items), AggregatorKind::List) => {
                if flatten {
                    if let Some(elements) = result.into_array() {
                        items.extend(elements);
                    } else {
                        items.push(result);
                    }
                } else {
                    items.push(result);
                }
            }
            (Storage::Set(items), AggregatorKind::Set) => {
                if flatten {
                    if let Some(elements) = result.into_array() {
                        items.extend(elements);
                    } else {
                        items.insert(result);
                    }
                } else {
                    items.insert(result);
                }
            }
            (Storage::Generic(cell), AggregatorKind::Generic) => {
                *cell = result;
            }
            _ => {
                return Err(ScriptSqlError::arg_resolution(
                    "aggregator buffer kind does not match the UDF's declared aggregator kind",
                ));
            }
        }
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<Value, ScriptSqlError> {
        self.guard_not_finalised()?;
        let value = self.current();
        self.state = BufferState::Finalised;
        Ok(value)
    }
}
