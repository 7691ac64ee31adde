//! Session layer: one input document, one schema, an iterator-like pull of
//! transformed record values.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;

use remold_xpath::PathCache;
use serde::Deserialize;
use serde_json::Value;

use crate::decl::DeclSet;
use crate::error::{EngineError, SchemaError};
use crate::functions::FunctionRegistry;
use crate::reader::{JsonReader, RecordReader, XmlReader};
use crate::transform::Transformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Xml,
    Json,
}

/// Schema metadata preceding the transform section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaHeader {
    pub format: InputFormat,
    #[serde(default)]
    pub version: Option<String>,
    pub record_path: String,
}

/// A fully loaded schema: header plus the parsed declaration tree.
#[derive(Debug)]
pub struct DocumentSchema {
    pub header: SchemaHeader,
    pub decls: Arc<DeclSet>,
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    #[serde(flatten)]
    header: SchemaHeader,
    transform: Value,
}

impl DocumentSchema {
    pub fn from_json(value: Value) -> Result<Self, SchemaError> {
        let raw: RawSchema =
            serde_json::from_value(value).map_err(|source| SchemaError::Header { source })?;
        let decls = DeclSet::from_json(&raw.transform)?;
        Ok(Self { header: raw.header, decls: Arc::new(decls) })
    }

    pub fn from_str(text: &str) -> Result<Self, SchemaError> {
        let value: Value =
            serde_json::from_str(text).map_err(|source| SchemaError::Header { source })?;
        Self::from_json(value)
    }
}

enum AnyReader<R: BufRead> {
    Xml(XmlReader<R>),
    Json(JsonReader<R>),
}

/// One input document being transformed under one schema.
///
/// Reader faults are terminal and repeat on every subsequent call; record
/// transform faults are continuable and the caller may keep pulling.
pub struct DocumentSession<R: BufRead> {
    reader: AnyReader<R>,
    transformer: Transformer,
}

impl<R: BufRead> DocumentSession<R> {
    pub fn new(
        source: R,
        input_name: &str,
        schema: &DocumentSchema,
        functions: Arc<FunctionRegistry>,
        externals: HashMap<String, String>,
        cache: Arc<PathCache>,
    ) -> Result<Self, EngineError> {
        let record_path = &schema.header.record_path;
        let reader = match schema.header.format {
            InputFormat::Xml => {
                AnyReader::Xml(XmlReader::new(source, input_name, record_path, &cache)?)
            }
            InputFormat::Json => {
                AnyReader::Json(JsonReader::new(source, input_name, record_path, &cache)?)
            }
        };
        let transformer = Transformer::new(Arc::clone(&schema.decls), functions, externals, cache);
        Ok(Self { reader, transformer })
    }

    /// Pull the next record and transform it. `Ok(None)` at end of input.
    pub fn next_value(&mut self) -> Result<Option<Value>, EngineError> {
        let record = match &mut self.reader {
            AnyReader::Xml(r) => r.read()?,
            AnyReader::Json(r) => r.read()?,
        };
        let Some(record) = record else {
            return Ok(None);
        };
        let arena = match &self.reader {
            AnyReader::Xml(r) => r.arena(),
            AnyReader::Json(r) => r.arena(),
        };
        let value = self.transformer.transform(arena, record)?;
        tracing::debug!(line = self.line(), "record transformed");
        Ok(Some(value))
    }

    /// Approximate 1-based line of the reader's position, for diagnostics.
    pub fn line(&self) -> u64 {
        match &self.reader {
            AnyReader::Xml(r) => r.line(),
            AnyReader::Json(r) => r.line(),
        }
    }
}
