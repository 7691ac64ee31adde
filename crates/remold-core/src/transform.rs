//! Declaration interpreter: walks the instruction tree against one record
//! subtree and produces the output JSON value.

use std::collections::HashMap;
use std::sync::Arc;

use remold_xpath::{CompiledPath, PathCache, XPathError};
use serde_json::Value;

use crate::cursor::TreeCursor;
use crate::decl::{Decl, DeclKind, DeclSet, ResultType};
use crate::error::TransformError;
use crate::functions::{FunctionCtx, FunctionRegistry};
use crate::tree::{NodeArena, NodeId};
use remold_xpath::NodeKind;

const MAX_TEMPLATE_DEPTH: usize = 64;

/// Record-to-JSON interpreter. Holds everything that outlives a single
/// record: the declaration tree, the function registry, external properties
/// and the shared path cache.
pub struct Transformer {
    decls: Arc<DeclSet>,
    functions: Arc<FunctionRegistry>,
    externals: HashMap<String, String>,
    cache: Arc<PathCache>,
}

impl Transformer {
    pub fn new(
        decls: Arc<DeclSet>,
        functions: Arc<FunctionRegistry>,
        externals: HashMap<String, String>,
        cache: Arc<PathCache>,
    ) -> Self {
        Self { decls, functions, externals, cache }
    }

    /// Evaluate the root declaration against one record. A record that
    /// evaluates to absent yields JSON `null`.
    pub fn transform(&self, arena: &NodeArena, record: NodeId) -> Result<Value, TransformError> {
        let mut eval = Evaluation { transformer: self, arena, memo: HashMap::new(), depth: 0 };
        let context = TreeCursor::new(arena, record);
        let value = eval.eval(self.decls.root(), context)?;
        Ok(value.unwrap_or(Value::Null))
    }
}

/// Per-record evaluation state. The memo maps (context node, declaration
/// content hash) to the produced value; declarations without a content hash
/// are never memoized.
struct Evaluation<'a> {
    transformer: &'a Transformer,
    arena: &'a NodeArena,
    memo: HashMap<(NodeId, u64), Option<Value>>,
    depth: usize,
}

impl<'a> Evaluation<'a> {
    fn eval(&mut self, decl: &Decl, context: TreeCursor<'a>) -> Result<Option<Value>, TransformError> {
        let memo_key = decl.content_hash.map(|h| (context.node_id(), h));
        if let Some(key) = memo_key {
            if let Some(hit) = self.memo.get(&key) {
                return Ok(hit.clone());
            }
        }
        let value = self.eval_uncached(decl, context)?;
        if let Some(key) = memo_key {
            self.memo.insert(key, value.clone());
        }
        Ok(value)
    }

    fn eval_uncached(
        &mut self,
        decl: &Decl,
        context: TreeCursor<'a>,
    ) -> Result<Option<Value>, TransformError> {
        match &decl.kind {
            DeclKind::Const(text) => self.normalize(decl, Value::String(text.clone())),
            DeclKind::External(name) => {
                let text = self.transformer.externals.get(name).ok_or_else(|| {
                    TransformError::MissingExternal { fqdn: decl.fqdn.clone(), name: name.clone() }
                })?;
                self.normalize(decl, Value::String(text.clone()))
            }
            DeclKind::Field => {
                let Some(node) = self.resolve_context(decl, context)? else {
                    return Ok(None);
                };
                let value = self.field_value(decl, node.node_id());
                self.normalize(decl, value)
            }
            DeclKind::Object(members) => {
                let Some(scope) = self.resolve_context(decl, context)? else {
                    return Ok(None);
                };
                let mut out = serde_json::Map::new();
                for (name, member) in members {
                    if let Some(value) = self.eval(member, scope)? {
                        out.insert(name.clone(), value);
                    }
                }
                self.normalize(decl, Value::Object(out))
            }
            DeclKind::Array(items) => {
                // A path matching several nodes fans the item declarations
                // out over every matched context, in document order.
                let scopes = self.resolve_all(decl, context)?;
                let mut out = Vec::new();
                for scope in scopes {
                    for item in items {
                        if let Some(value) = self.eval(item, scope)? {
                            out.push(value);
                        }
                    }
                }
                self.normalize(decl, Value::Array(out))
            }
            DeclKind::CustomFunc { name, args, suppress_error } => {
                let Some(scope) = self.resolve_context(decl, context)? else {
                    return Ok(None);
                };
                self.eval_function(decl, name, args, *suppress_error, scope)
            }
            DeclKind::Template(name) => {
                let target = self.transformer.decls.get(name).ok_or_else(|| {
                    TransformError::UnknownTemplate { fqdn: decl.fqdn.clone(), name: name.clone() }
                })?;
                if self.depth >= MAX_TEMPLATE_DEPTH {
                    return Err(TransformError::TemplateDepth { fqdn: decl.fqdn.clone() });
                }
                let Some(scope) = self.resolve_context(decl, context)? else {
                    return Ok(None);
                };
                self.depth += 1;
                let target = Arc::clone(target);
                let result = self.eval(&target, scope);
                self.depth -= 1;
                result
            }
        }
    }

    fn eval_function(
        &mut self,
        decl: &Decl,
        name: &str,
        args: &[Decl],
        suppress_error: bool,
        scope: TreeCursor<'a>,
    ) -> Result<Option<Value>, TransformError> {
        let Some((func, variadic)) = self.transformer.functions.resolve(name) else {
            return Err(TransformError::UnknownFunction {
                fqdn: decl.fqdn.clone(),
                name: name.to_string(),
            });
        };
        let func = Arc::clone(func);

        let mut values = Vec::new();
        if variadic && args.len() == 1 && matches!(args[0].kind, DeclKind::Field) {
            // A variadic function with a single field argument receives one
            // argument per node the field's path matches.
            let arg = &args[0];
            for node in self.resolve_all(arg, scope)? {
                let value = self.field_value(arg, node.node_id());
                if let Some(value) = self.normalize(arg, value)? {
                    values.push(value);
                }
            }
        } else {
            for arg in args {
                // Arity stays positional: an absent argument becomes the
                // empty string rather than shifting its successors. A field
                // argument takes the first match; several matches are not
                // ambiguous here.
                let value = if matches!(arg.kind, DeclKind::Field) {
                    match self.resolve_all(arg, scope)?.first().copied() {
                        None => None,
                        Some(node) => self.normalize(arg, self.field_value(arg, node.node_id()))?,
                    }
                } else {
                    self.eval(arg, scope)?
                };
                values.push(value.unwrap_or_else(|| Value::String(String::new())));
            }
        }

        let ctx = FunctionCtx { context: scope };
        match func(&ctx, &values) {
            Ok(value) => self.normalize(decl, value),
            Err(_) if suppress_error => self.normalize(decl, Value::String(String::new())),
            Err(e) => Err(TransformError::Function {
                fqdn: decl.fqdn.clone(),
                name: name.to_string(),
                message: e.0,
            }),
        }
    }

    /// Move the evaluation context along the declaration's path, if any.
    /// `None` means the path matched nothing and the declaration is absent.
    fn resolve_context(
        &mut self,
        decl: &Decl,
        context: TreeCursor<'a>,
    ) -> Result<Option<TreeCursor<'a>>, TransformError> {
        let Some(compiled) = self.effective_path(decl, context)? else {
            return Ok(Some(context));
        };
        compiled
            .match_single(&context)
            .map_err(|e| self.path_error(decl, compiled.text(), e))
    }

    fn resolve_all(
        &mut self,
        decl: &Decl,
        context: TreeCursor<'a>,
    ) -> Result<Vec<TreeCursor<'a>>, TransformError> {
        let Some(compiled) = self.effective_path(decl, context)? else {
            return Ok(vec![context]);
        };
        compiled.match_all(&context).map_err(|e| self.path_error(decl, compiled.text(), e))
    }

    /// The declaration's compiled path: the static one through the shared
    /// cache, a dynamic one compiled on the spot (its text is data-dependent
    /// and would churn the cache).
    fn effective_path(
        &mut self,
        decl: &Decl,
        context: TreeCursor<'a>,
    ) -> Result<Option<CompiledPath>, TransformError> {
        if let Some(text) = &decl.path {
            let compiled = self
                .transformer
                .cache
                .get(text)
                .map_err(|e| self.path_error(decl, text, e))?;
            return Ok(Some(compiled));
        }
        let Some(dynamic) = &decl.path_dynamic else {
            return Ok(None);
        };
        let text = match self.eval(dynamic, context)? {
            None => ".".to_string(),
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
        };
        let compiled = self
            .transformer
            .cache
            .compile_uncached(&text)
            .map_err(|e| self.path_error(decl, &text, e))?;
        Ok(Some(compiled))
    }

    fn path_error(&self, decl: &Decl, path: &str, source: XPathError) -> TransformError {
        match source {
            XPathError::AmbiguousMatch => {
                TransformError::AmbiguousField { fqdn: decl.fqdn.clone(), path: path.to_string() }
            }
            other => TransformError::Path { fqdn: decl.fqdn.clone(), source: other },
        }
    }

    /// A field's value: inner text by default, structural conversion when
    /// the declaration asks for a composite result.
    fn field_value(&self, decl: &Decl, node: NodeId) -> Value {
        match decl.result_type {
            ResultType::Object | ResultType::Array => self.structural_value(node, decl.keep_space),
            _ => Value::String(self.arena.inner_text(node)),
        }
    }

    /// Convert a record node to a JSON value by structure: a node without
    /// element children is its inner text; children sharing one name form an
    /// array (a lone empty-named child counts, so JSON arrays of one survive);
    /// anything else becomes an ordered map, later duplicates overwriting
    /// earlier ones.
    fn structural_value(&self, node: NodeId, keep_space: bool) -> Value {
        let children = self.element_children(node);
        if children.is_empty() {
            let text = self.arena.inner_text(node);
            let text = if keep_space { text } else { text.trim().to_string() };
            return Value::String(text);
        }
        let names: Vec<String> = children
            .iter()
            .map(|&c| self.arena.get(c).map(|d| d.data().to_string()).unwrap_or_default())
            .collect();
        let uniform = names.windows(2).all(|w| w[0] == w[1]);
        if uniform && (children.len() > 1 || names[0].is_empty()) {
            Value::Array(children.iter().map(|&c| self.structural_value(c, keep_space)).collect())
        } else {
            let mut map = serde_json::Map::new();
            for (name, &child) in names.iter().zip(&children) {
                map.insert(name.clone(), self.structural_value(child, keep_space));
            }
            Value::Object(map)
        }
    }

    fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut next = self.arena.get(node).and_then(crate::tree::NodeData::first_child);
        while let Some(id) = next {
            if let Some(data) = self.arena.get(id) {
                if data.kind() == NodeKind::Element {
                    out.push(id);
                }
                next = data.next_sibling();
            } else {
                break;
            }
        }
        out
    }

    /// Whitespace and type normalization plus the absence rules: empty
    /// string, null, empty array and empty object all collapse to absent
    /// unless the declaration opts out.
    fn normalize(&self, decl: &Decl, value: Value) -> Result<Option<Value>, TransformError> {
        match value {
            Value::String(s) => {
                let s = if decl.keep_space { s } else { s.trim().to_string() };
                if s.is_empty() {
                    if !decl.keep_empty {
                        return Ok(None);
                    }
                    return Ok(Some(match decl.result_type {
                        ResultType::Unspecified | ResultType::String => Value::String(s),
                        _ => Value::Null,
                    }));
                }
                Ok(Some(self.convert(decl, s)?))
            }
            Value::Null => Ok(if decl.keep_empty { Some(Value::Null) } else { None }),
            Value::Array(items) if items.is_empty() => {
                Ok(if decl.keep_empty { Some(Value::Array(items)) } else { None })
            }
            Value::Object(map) if map.is_empty() => {
                Ok(if decl.keep_empty { Some(Value::Object(map)) } else { None })
            }
            other => Ok(Some(other)),
        }
    }

    fn convert(&self, decl: &Decl, s: String) -> Result<Value, TransformError> {
        let conversion = |target: &'static str| TransformError::Conversion {
            fqdn: decl.fqdn.clone(),
            value: s.clone(),
            target,
        };
        Ok(match decl.result_type {
            ResultType::Unspecified | ResultType::String => Value::String(s),
            ResultType::Int => {
                Value::Number(s.trim().parse::<i64>().map_err(|_| conversion("int"))?.into())
            }
            ResultType::Float => {
                let f = s.trim().parse::<f64>().map_err(|_| conversion("float"))?;
                serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(|| conversion("float"))?
            }
            ResultType::Boolean => Value::Bool(match s.trim() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(conversion("boolean")),
            }),
            // Structural conversion may legitimately yield a scalar.
            ResultType::Object | ResultType::Array => Value::String(s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remold_xpath::StaticContext;
    use rstest::rstest;

    fn transformer(schema: serde_json::Value) -> Transformer {
        let decls = Arc::new(DeclSet::from_json(&schema).unwrap());
        let cache = Arc::new(PathCache::with_default_capacity(StaticContext::default()));
        Transformer::new(decls, Arc::new(FunctionRegistry::new()), HashMap::new(), cache)
    }

    fn single_element_record(name: &str, text: &str) -> (NodeArena, NodeId) {
        let mut arena = NodeArena::new();
        let root = arena.root();
        let e = arena.new_node(NodeKind::Element, name.into(), crate::tree::FormatDetail::None);
        arena.add_child(root, e);
        let t = arena.new_node(NodeKind::Text, text.into(), crate::tree::FormatDetail::None);
        arena.add_child(e, t);
        (arena, e)
    }

    #[rstest]
    #[case("123", "int", serde_json::json!(123))]
    #[case("1.5", "float", serde_json::json!(1.5))]
    #[case("true", "boolean", serde_json::json!(true))]
    #[case("1", "boolean", serde_json::json!(true))]
    fn const_values_convert_by_result_type(
        #[case] text: &str,
        #[case] result_type: &str,
        #[case] expected: serde_json::Value,
    ) {
        let t = transformer(serde_json::json!({
            "$root": "out",
            "out": { "const": text, "result_type": result_type }
        }));
        let (arena, record) = single_element_record("r", "");
        assert_eq!(t.transform(&arena, record).unwrap(), expected);
    }

    #[test]
    fn leading_and_trailing_space_is_trimmed_by_default() {
        let t = transformer(serde_json::json!({
            "$root": "out",
            "out": { "const": " test " }
        }));
        let (arena, record) = single_element_record("r", "");
        assert_eq!(t.transform(&arena, record).unwrap(), serde_json::json!("test"));
    }

    #[test]
    fn keep_space_preserves_padding() {
        let t = transformer(serde_json::json!({
            "$root": "out",
            "out": { "const": " test ", "keep_leading_trailing_space": true }
        }));
        let (arena, record) = single_element_record("r", "");
        assert_eq!(t.transform(&arena, record).unwrap(), serde_json::json!(" test "));
    }

    #[test]
    fn empty_const_is_absent_and_record_becomes_null() {
        let t = transformer(serde_json::json!({
            "$root": "out",
            "out": { "const": "" }
        }));
        let (arena, record) = single_element_record("r", "");
        assert_eq!(t.transform(&arena, record).unwrap(), Value::Null);
    }

    #[test]
    fn unconvertible_const_is_an_error() {
        let t = transformer(serde_json::json!({
            "$root": "out",
            "out": { "const": "abc", "result_type": "int" }
        }));
        let (arena, record) = single_element_record("r", "");
        assert!(matches!(
            t.transform(&arena, record),
            Err(TransformError::Conversion { .. })
        ));
    }

    #[test]
    fn missing_external_is_an_error() {
        let t = transformer(serde_json::json!({
            "$root": "out",
            "out": { "external": "job_id" }
        }));
        let (arena, record) = single_element_record("r", "");
        assert!(matches!(
            t.transform(&arena, record),
            Err(TransformError::MissingExternal { .. })
        ));
    }

    #[test]
    fn field_reads_inner_text_of_context() {
        let t = transformer(serde_json::json!({
            "$root": "out",
            "out": {}
        }));
        let (arena, record) = single_element_record("r", "  hello  ");
        assert_eq!(t.transform(&arena, record).unwrap(), serde_json::json!("hello"));
    }

    #[test]
    fn object_with_unmatched_path_is_absent() {
        let t = transformer(serde_json::json!({
            "$root": "out",
            "out": {
                "xpath": "missing",
                "object": { "a": { "const": "1" } }
            }
        }));
        let (arena, record) = single_element_record("r", "x");
        assert_eq!(t.transform(&arena, record).unwrap(), Value::Null);
    }

    #[test]
    fn unknown_template_is_an_error() {
        let t = transformer(serde_json::json!({
            "$root": "out",
            "out": { "template": "nope" }
        }));
        let (arena, record) = single_element_record("r", "x");
        assert!(matches!(
            t.transform(&arena, record),
            Err(TransformError::UnknownTemplate { .. })
        ));
    }

    #[test]
    fn recursive_template_hits_depth_limit() {
        let t = transformer(serde_json::json!({
            "$root": "a",
            "a": { "template": "b" },
            "b": { "template": "a" }
        }));
        let (arena, record) = single_element_record("r", "x");
        assert!(matches!(
            t.transform(&arena, record),
            Err(TransformError::TemplateDepth { .. })
        ));
    }
}
