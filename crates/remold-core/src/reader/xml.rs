use std::io::BufRead;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use remold_xpath::{NodeKind, PathCache};

use crate::error::ReaderError;
use crate::reader::RecordReader;
use crate::reader::stream::StreamState;
use crate::tree::{FormatDetail, NodeArena, NodeId};

/// Streaming XML reader built on `quick_xml`'s pull API.
///
/// Start/Empty/End/Text events mutate the tree at the insertion point;
/// attributes become Attribute nodes appended before any other child.
/// Comments, processing instructions and the prolog are skipped.
pub struct XmlReader<R: BufRead> {
    reader: NsReader<R>,
    state: StreamState,
    failed: Option<ReaderError>,
    done: bool,
}

impl<R: BufRead> XmlReader<R> {
    pub fn new(
        source: R,
        input_name: &str,
        record_path: &str,
        cache: &PathCache,
    ) -> Result<Self, ReaderError> {
        let state = StreamState::new(input_name, record_path, cache)?;
        Ok(Self { reader: NsReader::from_reader(source), state, failed: None, done: false })
    }

    fn fail(&mut self, err: ReaderError) -> ReaderError {
        self.failed = Some(err.clone());
        err
    }

    fn bump_lines(&mut self, bytes: &[u8]) {
        self.state.line += bytes.iter().filter(|b| **b == b'\n').count() as u64;
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, ReaderError> {
        self.reader
            .decoder()
            .decode(bytes)
            .map(|s| s.into_owned())
            .map_err(|e| self.state.malformed(e.to_string()))
    }

    fn handle_start(&mut self, event: &BytesStart<'_>) -> Result<(), ReaderError> {
        let (resolve, local) = self.reader.resolve_element(event.name());
        let ns_uri = match resolve {
            ResolveResult::Bound(ns) => Some(self.decode(ns.as_ref())?),
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                let prefix = self.decode(&prefix)?;
                return Err(ReaderError::UndeclaredNamespace {
                    input: self.state.input().to_string(),
                    line: self.state.line,
                    prefix,
                });
            }
        };
        let local = self.decode(local.as_ref())?;
        let prefix = match event.name().prefix() {
            Some(p) => Some(self.decode(p.as_ref())?),
            None => None,
        };
        let element = self.state.arena_mut().new_node(
            NodeKind::Element,
            local,
            FormatDetail::Xml { prefix, ns_uri },
        );
        self.state.open(element)?;
        for attr in event.attributes() {
            let attr = attr.map_err(|e| self.state.malformed(e.to_string()))?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let (resolve, local) = self.reader.resolve_attribute(attr.key);
            let ns_uri = match resolve {
                ResolveResult::Bound(ns) => Some(self.decode(ns.as_ref())?),
                ResolveResult::Unbound => None,
                ResolveResult::Unknown(prefix) => {
                    let prefix = self.decode(&prefix)?;
                    return Err(ReaderError::UndeclaredNamespace {
                        input: self.state.input().to_string(),
                        line: self.state.line,
                        prefix,
                    });
                }
            };
            let local = self.decode(local.as_ref())?;
            let prefix = match attr.key.prefix() {
                Some(p) => Some(self.decode(p.as_ref())?),
                None => None,
            };
            let value = attr
                .unescape_value()
                .map_err(|e| self.state.malformed(e.to_string()))?
                .into_owned();
            let node = self.state.arena_mut().new_node(
                NodeKind::Attribute,
                local,
                FormatDetail::Xml { prefix, ns_uri },
            );
            self.state.append(node);
            let text = self.state.arena_mut().new_node(NodeKind::Text, value, FormatDetail::None);
            self.state.arena_mut().add_child(node, text);
        }
        Ok(())
    }

    fn append_text(&mut self, text: String) {
        // Whitespace outside any record subtree (pretty-printing between
        // records, indentation before the first one) carries no record
        // content and must not accumulate across reads.
        if text.trim().is_empty() && !self.state.has_candidate() {
            return;
        }
        let node = self.state.arena_mut().new_node(NodeKind::Text, text, FormatDetail::None);
        self.state.append(node);
    }
}

impl<R: BufRead> RecordReader for XmlReader<R> {
    fn read(&mut self) -> Result<Option<NodeId>, ReaderError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        self.state.release_pending();
        if self.done {
            return Ok(None);
        }
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let event = match self.reader.read_event_into(&mut buf) {
                Ok(ev) => ev,
                Err(e) => {
                    let err = self.state.malformed(e.to_string());
                    return Err(self.fail(err));
                }
            };
            match event {
                Event::Start(e) => {
                    self.bump_lines(&e);
                    if let Err(err) = self.handle_start(&e) {
                        return Err(self.fail(err));
                    }
                }
                Event::Empty(e) => {
                    self.bump_lines(&e);
                    if let Err(err) = self.handle_start(&e) {
                        return Err(self.fail(err));
                    }
                    match self.state.close() {
                        Ok(Some(target)) => return Ok(Some(target)),
                        Ok(None) => {}
                        Err(err) => return Err(self.fail(err)),
                    }
                }
                Event::End(e) => {
                    self.bump_lines(&e);
                    match self.state.close() {
                        Ok(Some(target)) => return Ok(Some(target)),
                        Ok(None) => {}
                        Err(err) => return Err(self.fail(err)),
                    }
                }
                Event::Text(t) => {
                    self.bump_lines(&t);
                    let text = match t.xml_content() {
                        Ok(s) => s.into_owned(),
                        Err(e) => {
                            let err = self.state.malformed(e.to_string());
                            return Err(self.fail(err));
                        }
                    };
                    self.append_text(text);
                }
                Event::CData(e) => {
                    self.bump_lines(&e);
                    let text = match self.decode(&e) {
                        Ok(s) => s,
                        Err(err) => return Err(self.fail(err)),
                    };
                    self.append_text(text);
                }
                Event::Eof => {
                    if self.state.current() != self.state.root() {
                        let err = self.state.malformed("unexpected end of input");
                        return Err(self.fail(err));
                    }
                    self.done = true;
                    return Ok(None);
                }
                Event::Comment(e) | Event::DocType(e) => self.bump_lines(&e),
                // Declarations and processing instructions rarely span lines;
                // the counter is approximate anyway.
                _ => {}
            }
        }
    }

    fn release(&mut self) {
        self.state.release_pending();
    }

    fn arena(&self) -> &NodeArena {
        self.state.arena()
    }

    fn line(&self) -> u64 {
        self.state.line
    }
}
