//! Declaration model: the schema's transform section parsed into an immutable
//! instruction tree.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::SchemaError;

/// Reserved key in the transform object naming the entry declaration.
pub const ROOT_KEY: &str = "$root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultType {
    #[default]
    Unspecified,
    Int,
    Float,
    Boolean,
    String,
    Object,
    Array,
}

impl ResultType {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "int" => ResultType::Int,
            "float" => ResultType::Float,
            "boolean" => ResultType::Boolean,
            "string" => ResultType::String,
            "object" => ResultType::Object,
            "array" => ResultType::Array,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Const(String),
    External(String),
    Field,
    Object(Vec<(String, Decl)>),
    Array(Vec<Decl>),
    CustomFunc { name: String, args: Vec<Decl>, suppress_error: bool },
    Template(String),
}

/// One node of the schema's instruction tree. Built once, read-only
/// afterwards, safe to share across concurrent interpretations.
#[derive(Debug, Clone)]
pub struct Decl {
    /// Fully qualified dotted name, used in diagnostics and as part of the
    /// memoization key.
    pub fqdn: String,
    pub kind: DeclKind,
    /// Static path expression; mutually exclusive with `path_dynamic`.
    pub path: Option<String>,
    /// Nested declaration whose evaluated string becomes the path at run
    /// time.
    pub path_dynamic: Option<Box<Decl>>,
    pub result_type: ResultType,
    pub keep_space: bool,
    pub keep_empty: bool,
    /// Deterministic content hash used for memoization; `None` when the
    /// subtree contains External or CustomFunc declarations, whose results
    /// depend on state outside the record.
    pub content_hash: Option<u64>,
}

/// Raw serde shape of one declaration object.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DeclSpec {
    #[serde(rename = "const")]
    const_: Option<String>,
    external: Option<String>,
    xpath: Option<String>,
    xpath_dynamic: Option<Value>,
    custom_func: Option<CustomFuncSpec>,
    template: Option<String>,
    object: Option<serde_json::Map<String, Value>>,
    array: Option<Vec<Value>>,
    result_type: Option<String>,
    #[serde(default)]
    keep_leading_trailing_space: bool,
    #[serde(default)]
    keep_empty_or_null: bool,
}

#[derive(Debug, Deserialize)]
struct CustomFuncSpec {
    name: String,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    suppress_error: bool,
}

impl Decl {
    fn from_value(fqdn: String, value: &Value) -> Result<Self, SchemaError> {
        let spec: DeclSpec = serde_json::from_value(value.clone())
            .map_err(|source| SchemaError::Invalid { fqdn: fqdn.clone(), source })?;
        Self::from_spec(fqdn, spec)
    }

    fn from_spec(fqdn: String, spec: DeclSpec) -> Result<Self, SchemaError> {
        if spec.xpath.is_some() && spec.xpath_dynamic.is_some() {
            return Err(SchemaError::ConflictingPaths { fqdn });
        }
        let kind_markers = usize::from(spec.const_.is_some())
            + usize::from(spec.external.is_some())
            + usize::from(spec.custom_func.is_some())
            + usize::from(spec.template.is_some())
            + usize::from(spec.object.is_some())
            + usize::from(spec.array.is_some());
        if kind_markers > 1 {
            return Err(SchemaError::MultipleKinds { fqdn });
        }

        let kind = if let Some(c) = spec.const_ {
            DeclKind::Const(c)
        } else if let Some(e) = spec.external {
            DeclKind::External(e)
        } else if let Some(t) = spec.template {
            DeclKind::Template(t)
        } else if let Some(f) = spec.custom_func {
            let mut args = Vec::with_capacity(f.args.len());
            for (i, arg) in f.args.iter().enumerate() {
                let child_fqdn = format!("{fqdn}.args[{i}]");
                args.push(Decl::from_value(child_fqdn, arg)?);
            }
            DeclKind::CustomFunc { name: f.name, args, suppress_error: f.suppress_error }
        } else if let Some(members) = spec.object {
            let mut children = Vec::with_capacity(members.len());
            for (child_name, child_value) in &members {
                let child_fqdn = format!("{fqdn}.{child_name}");
                children.push((child_name.clone(), Decl::from_value(child_fqdn, child_value)?));
            }
            DeclKind::Object(children)
        } else if let Some(items) = spec.array {
            let mut children = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let child_fqdn = format!("{fqdn}[{i}]");
                children.push(Decl::from_value(child_fqdn, item)?);
            }
            DeclKind::Array(children)
        } else {
            DeclKind::Field
        };

        let path_dynamic = match &spec.xpath_dynamic {
            Some(v) => {
                let child_fqdn = format!("{fqdn}.xpath_dynamic");
                Some(Box::new(Decl::from_value(child_fqdn, v)?))
            }
            None => None,
        };

        let result_type = match &spec.result_type {
            None => ResultType::Unspecified,
            Some(s) => ResultType::parse(s)
                .ok_or_else(|| SchemaError::UnknownResultType { fqdn: fqdn.clone(), value: s.clone() })?,
        };

        let mut decl = Decl {
            fqdn,
            kind,
            path: spec.xpath,
            path_dynamic,
            result_type,
            keep_space: spec.keep_leading_trailing_space,
            keep_empty: spec.keep_empty_or_null,
            content_hash: None,
        };
        decl.content_hash = decl.compute_hash();
        Ok(decl)
    }

    /// Deterministic content hash over the declaration subtree; `None` when
    /// any part of it depends on state outside the record.
    fn compute_hash(&self) -> Option<u64> {
        let mut hasher = std::hash::DefaultHasher::new();
        if !self.feed_hash(&mut hasher) {
            return None;
        }
        Some(hasher.finish())
    }

    fn feed_hash<H: Hasher>(&self, h: &mut H) -> bool {
        self.path.hash(h);
        (self.result_type as u8).hash(h);
        self.keep_space.hash(h);
        self.keep_empty.hash(h);
        if let Some(dynamic) = &self.path_dynamic {
            if !dynamic.feed_hash(h) {
                return false;
            }
        }
        match &self.kind {
            DeclKind::External(_) | DeclKind::CustomFunc { .. } => return false,
            DeclKind::Const(c) => {
                0u8.hash(h);
                c.hash(h);
            }
            DeclKind::Field => 1u8.hash(h),
            DeclKind::Object(children) => {
                2u8.hash(h);
                for (name, child) in children {
                    name.hash(h);
                    if !child.feed_hash(h) {
                        return false;
                    }
                }
            }
            DeclKind::Array(children) => {
                3u8.hash(h);
                for child in children {
                    if !child.feed_hash(h) {
                        return false;
                    }
                }
            }
            DeclKind::Template(t) => {
                4u8.hash(h);
                t.hash(h);
            }
        }
        true
    }
}

/// The parsed transform section: named declarations plus the entry point.
#[derive(Debug)]
pub struct DeclSet {
    decls: HashMap<String, Arc<Decl>>,
    root: String,
}

impl DeclSet {
    /// Parse the transform object. The reserved [`ROOT_KEY`] entry names the
    /// declaration evaluation starts from; every other key defines one named
    /// declaration.
    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        let map = value.as_object().ok_or(SchemaError::NotAnObject)?;
        let root = map
            .get(ROOT_KEY)
            .and_then(Value::as_str)
            .ok_or(SchemaError::MissingRoot { key: ROOT_KEY })?
            .to_string();
        let mut decls = HashMap::new();
        for (name, decl_value) in map {
            if name == ROOT_KEY {
                continue;
            }
            let decl = Decl::from_value(name.clone(), decl_value)?;
            decls.insert(name.clone(), Arc::new(decl));
        }
        if !decls.contains_key(&root) {
            return Err(SchemaError::UnknownRoot { name: root });
        }
        Ok(Self { decls, root })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Decl>> {
        self.decls.get(name)
    }

    pub fn root(&self) -> &Arc<Decl> {
        // Presence is validated in from_json.
        &self.decls[&self.root]
    }
}
