//! Query layer: compiled, shareable path expressions and the bounded
//! process-wide compilation cache.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::error::XPathError;
use crate::evaluator::evaluate;
use crate::model::DocumentCursor;
use crate::parser::ast::Expr;
use crate::parser::parse_xpath;
use crate::runtime::StaticContext;
use crate::xdm::XdmItem;

/// A parsed path expression bound to the static context it was compiled
/// under. Cheap to clone and safe to share across sessions.
#[derive(Debug, Clone)]
pub struct CompiledPath {
    text: Arc<str>,
    expr: Arc<Expr>,
    static_ctx: Arc<StaticContext>,
}

impl CompiledPath {
    pub fn compile(text: &str, static_ctx: Arc<StaticContext>) -> Result<Self, XPathError> {
        let expr = parse_xpath(text)?;
        Ok(Self { text: Arc::from(text), expr: Arc::new(expr), static_ctx })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Same expression with the final step's predicates removed; used for
    /// stream-candidate detection before a node's content exists.
    #[must_use]
    pub fn without_trailing_predicates(&self) -> Self {
        Self {
            text: Arc::clone(&self.text),
            expr: Arc::new(self.expr.without_trailing_predicates()),
            static_ctx: Arc::clone(&self.static_ctx),
        }
    }

    /// All nodes selected by this expression, in document order.
    pub fn match_all<C: DocumentCursor>(&self, context: &C) -> Result<Vec<C>, XPathError> {
        let seq = evaluate(&self.expr, context, &self.static_ctx)?;
        seq.into_iter()
            .map(|item| match item {
                XdmItem::Node(n) => Ok(n),
                XdmItem::Atomic(_) => {
                    Err(XPathError::Eval(format!("expression {:?} does not select nodes", self.text)))
                }
            })
            .collect()
    }

    /// At most one selected node; more than one is an error.
    pub fn match_single<C: DocumentCursor>(&self, context: &C) -> Result<Option<C>, XPathError> {
        let mut nodes = self.match_all(context)?;
        match nodes.len() {
            0 => Ok(None),
            1 => Ok(Some(nodes.remove(0))),
            _ => Err(XPathError::AmbiguousMatch),
        }
    }

    pub fn match_any<C: DocumentCursor>(&self, context: &C) -> Result<bool, XPathError> {
        Ok(!self.match_all(context)?.is_empty())
    }

    /// Membership test: does this expression, evaluated from `context`,
    /// select `node`?
    pub fn selects<C: DocumentCursor>(&self, context: &C, node: &C) -> Result<bool, XPathError> {
        Ok(self.match_all(context)?.contains(node))
    }
}

/// Capacity-bounded cache of compiled expressions, keyed by expression text.
///
/// Constructed once and shared by reference between sessions; dynamically
/// generated expressions known to be non-repeating should bypass it through
/// [`PathCache::compile_uncached`].
pub struct PathCache {
    inner: Mutex<LruCache<String, CompiledPath>>,
    static_ctx: Arc<StaticContext>,
}

impl PathCache {
    pub const DEFAULT_CAPACITY: usize = 512;

    pub fn new(capacity: NonZeroUsize, static_ctx: StaticContext) -> Self {
        Self { inner: Mutex::new(LruCache::new(capacity)), static_ctx: Arc::new(static_ctx) }
    }

    pub fn with_default_capacity(static_ctx: StaticContext) -> Self {
        // DEFAULT_CAPACITY is non-zero.
        let cap = NonZeroUsize::new(Self::DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self::new(cap, static_ctx)
    }

    /// Fetch a compiled expression, compiling and inserting on miss.
    pub fn get(&self, text: &str) -> Result<CompiledPath, XPathError> {
        let mut cache = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(hit) = cache.get(text) {
            return Ok(hit.clone());
        }
        tracing::trace!(expr = text, "compiling path expression");
        let compiled = CompiledPath::compile(text, Arc::clone(&self.static_ctx))?;
        cache.put(text.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Compile without touching the cache.
    pub fn compile_uncached(&self, text: &str) -> Result<CompiledPath, XPathError> {
        CompiledPath::compile(text, Arc::clone(&self.static_ctx))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
