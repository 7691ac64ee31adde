//! Custom-function registry: the typed contract the interpreter invokes for
//! `custom_func` declarations. The concrete function library is supplied by
//! the embedding application.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::cursor::TreeCursor;

/// Context handed to every function invocation: the record node the owning
/// declaration is being evaluated against.
pub struct FunctionCtx<'a> {
    pub context: TreeCursor<'a>,
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct FunctionError(pub String);

pub type TransformFn =
    Arc<dyn for<'a> Fn(&FunctionCtx<'a>, &[Value]) -> Result<Value, FunctionError> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    func: TransformFn,
    variadic: bool,
}

/// Named function registry. Variadic-ness is declared at registration time,
/// not discovered at call time.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    fns: HashMap<String, Registration>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: for<'a> Fn(&FunctionCtx<'a>, &[Value]) -> Result<Value, FunctionError>
            + Send
            + Sync
            + 'static,
    {
        self.fns.insert(name.into(), Registration { func: Arc::new(f), variadic: false });
    }

    /// Register a function accepting a variable number of arguments. A
    /// variadic function whose only declared argument is a field receives one
    /// argument per path match (aggregate semantics).
    pub fn register_variadic<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: for<'a> Fn(&FunctionCtx<'a>, &[Value]) -> Result<Value, FunctionError>
            + Send
            + Sync
            + 'static,
    {
        self.fns.insert(name.into(), Registration { func: Arc::new(f), variadic: true });
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<(&TransformFn, bool)> {
        self.fns.get(name).map(|r| (&r.func, r.variadic))
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry").field("names", &self.fns.keys().collect::<Vec<_>>()).finish()
    }
}
