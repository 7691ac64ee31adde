use std::io::BufRead;

use remold_xpath::{NodeKind, PathCache};

use crate::error::ReaderError;
use crate::reader::RecordReader;
use crate::reader::stream::StreamState;
use crate::tree::{FormatDetail, JsonFlags, NodeArena, NodeData, NodeId};

/// Streaming JSON reader.
///
/// The top-level container maps onto the Document root itself; object members
/// become elements named by their key, array items become elements with an
/// empty name. Scalar values set a `VALUE_*` flag on the holding element and
/// store their text as a Text child (null stores none, so its inner text is
/// the empty string).
pub struct JsonReader<R: BufRead> {
    lexer: Lexer<R>,
    state: StreamState,
    expect: Expect,
    /// `true` per open object, `false` per open array, innermost last.
    containers: Vec<bool>,
    failed: Option<ReaderError>,
    done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    TopValue,
    Key,
    KeyOrClose,
    Colon,
    Value,
    Item,
    ItemOrClose,
    CommaOrClose,
    End,
}

impl<R: BufRead> JsonReader<R> {
    pub fn new(
        source: R,
        input_name: &str,
        record_path: &str,
        cache: &PathCache,
    ) -> Result<Self, ReaderError> {
        let state = StreamState::new(input_name, record_path, cache)?;
        Ok(Self {
            lexer: Lexer::new(source),
            state,
            expect: Expect::TopValue,
            containers: Vec::new(),
            failed: None,
            done: false,
        })
    }

    fn fail(&mut self, err: ReaderError) -> ReaderError {
        self.failed = Some(err.clone());
        err
    }

    fn open_element(&mut self, name: &str, flags: JsonFlags) -> Result<(), ReaderError> {
        let node = self.state.arena_mut().new_node(
            NodeKind::Element,
            name.to_string(),
            FormatDetail::Json(flags),
        );
        self.state.open(node)
    }

    fn add_flags(&mut self, node: NodeId, extra: JsonFlags) {
        let flags = self.state.arena().get(node).map(NodeData::json_flags).unwrap_or_default();
        self.state.arena_mut().set_detail(node, FormatDetail::Json(flags | extra));
    }

    fn put_text(&mut self, text: String) {
        let node = self.state.arena_mut().new_node(NodeKind::Text, text, FormatDetail::None);
        self.state.append(node);
    }

    /// Flag the current node with the scalar's kind, store its text, then
    /// close it. Returns a delivered record target, if any.
    fn finish_scalar(
        &mut self,
        flags: JsonFlags,
        text: Option<String>,
    ) -> Result<Option<NodeId>, ReaderError> {
        let node = self.state.current();
        self.add_flags(node, flags);
        if let Some(text) = text {
            self.put_text(text);
        }
        self.expect = Expect::CommaOrClose;
        self.state.close()
    }

    /// Handle a value token for an already-open holder node (property or
    /// array item). Containers stay open; scalars close immediately.
    fn begin_value(&mut self, token: Token) -> Result<Option<NodeId>, ReaderError> {
        match token {
            Token::ObjBegin => {
                let node = self.state.current();
                self.add_flags(node, JsonFlags::OBJECT);
                self.containers.push(true);
                self.expect = Expect::KeyOrClose;
                Ok(None)
            }
            Token::ArrBegin => {
                let node = self.state.current();
                self.add_flags(node, JsonFlags::ARRAY);
                self.containers.push(false);
                self.expect = Expect::ItemOrClose;
                Ok(None)
            }
            Token::Str(s) => self.finish_scalar(JsonFlags::VALUE_STRING, Some(s)),
            Token::Num(n) => self.finish_scalar(JsonFlags::VALUE_NUMBER, Some(n)),
            Token::Bool(b) => self.finish_scalar(JsonFlags::VALUE_BOOLEAN, Some(b.to_string())),
            Token::Null => self.finish_scalar(JsonFlags::VALUE_NULL, None),
            _ => Err(self.state.malformed("expected a value")),
        }
    }

    /// Close the innermost container. The top-level container is the Document
    /// root itself and has no element node to close.
    fn close_container(&mut self) -> Result<Option<NodeId>, ReaderError> {
        self.containers.pop();
        if self.containers.is_empty() {
            self.expect = Expect::End;
            Ok(None)
        } else {
            self.expect = Expect::CommaOrClose;
            self.state.close()
        }
    }

    fn step(&mut self, token: Token) -> Result<Option<NodeId>, ReaderError> {
        match self.expect {
            Expect::TopValue => {
                let root = self.state.root();
                match token {
                    Token::ObjBegin => {
                        self.state
                            .arena_mut()
                            .set_detail(root, FormatDetail::Json(JsonFlags::ROOT | JsonFlags::OBJECT));
                        self.containers.push(true);
                        self.expect = Expect::KeyOrClose;
                        Ok(None)
                    }
                    Token::ArrBegin => {
                        self.state
                            .arena_mut()
                            .set_detail(root, FormatDetail::Json(JsonFlags::ROOT | JsonFlags::ARRAY));
                        self.containers.push(false);
                        self.expect = Expect::ItemOrClose;
                        Ok(None)
                    }
                    Token::Str(s) => self.top_scalar(JsonFlags::VALUE_STRING, Some(s)),
                    Token::Num(n) => self.top_scalar(JsonFlags::VALUE_NUMBER, Some(n)),
                    Token::Bool(b) => self.top_scalar(JsonFlags::VALUE_BOOLEAN, Some(b.to_string())),
                    Token::Null => self.top_scalar(JsonFlags::VALUE_NULL, None),
                    _ => Err(self.state.malformed("expected a value")),
                }
            }
            Expect::Key | Expect::KeyOrClose => match token {
                Token::Str(key) => {
                    self.open_element(&key, JsonFlags::PROPERTY)?;
                    self.expect = Expect::Colon;
                    Ok(None)
                }
                Token::ObjEnd if self.expect == Expect::KeyOrClose => self.close_container(),
                _ => Err(self.state.malformed("expected an object key")),
            },
            Expect::Colon => match token {
                Token::Colon => {
                    self.expect = Expect::Value;
                    Ok(None)
                }
                _ => Err(self.state.malformed("expected ':'")),
            },
            Expect::Value => self.begin_value(token),
            Expect::Item | Expect::ItemOrClose => match token {
                Token::ArrEnd if self.expect == Expect::ItemOrClose => self.close_container(),
                token => {
                    self.open_element("", JsonFlags::empty())?;
                    self.begin_value(token)
                }
            },
            Expect::CommaOrClose => match token {
                Token::Comma => {
                    let in_object = self.containers.last().copied().unwrap_or(false);
                    self.expect = if in_object { Expect::Key } else { Expect::Item };
                    Ok(None)
                }
                Token::ObjEnd if self.containers.last() == Some(&true) => self.close_container(),
                Token::ArrEnd if self.containers.last() == Some(&false) => self.close_container(),
                _ => Err(self.state.malformed("expected ',' or a closing bracket")),
            },
            Expect::End => Err(self.state.malformed("trailing content after top-level value")),
        }
    }

    fn top_scalar(
        &mut self,
        flags: JsonFlags,
        text: Option<String>,
    ) -> Result<Option<NodeId>, ReaderError> {
        let root = self.state.root();
        self.state.arena_mut().set_detail(root, FormatDetail::Json(JsonFlags::ROOT | flags));
        if let Some(text) = text {
            self.put_text(text);
        }
        self.expect = Expect::End;
        Ok(None)
    }
}

impl<R: BufRead> RecordReader for JsonReader<R> {
    fn read(&mut self) -> Result<Option<NodeId>, ReaderError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        self.state.release_pending();
        if self.done {
            return Ok(None);
        }
        loop {
            let token = match self.lexer.next_token() {
                Ok(t) => t,
                Err(message) => {
                    self.state.line = self.lexer.line;
                    let err = self.state.malformed(message);
                    return Err(self.fail(err));
                }
            };
            self.state.line = self.lexer.line;
            let Some(token) = token else {
                if self.expect != Expect::End {
                    let err = self.state.malformed("unexpected end of input");
                    return Err(self.fail(err));
                }
                self.done = true;
                return Ok(None);
            };
            match self.step(token) {
                Ok(Some(target)) => return Ok(Some(target)),
                Ok(None) => {}
                Err(err) => return Err(self.fail(err)),
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

#[derive(Debug, Clone, PartialEq)]
enum Token {
    ObjBegin,
    ObjEnd,
    ArrBegin,
    ArrEnd,
    Colon,
    Comma,
    Str(String),
    /// Raw lexeme; typed conversion happens downstream, if at all.
    Num(String),
    Bool(bool),
    Null,
}

/// Minimal incremental JSON tokenizer over a buffered byte source.
struct Lexer<R> {
    source: R,
    peeked: Option<u8>,
    line: u64,
}

impl<R: BufRead> Lexer<R> {
    fn new(source: R) -> Self {
        Self { source, peeked: None, line: 1 }
    }

    fn pull(&mut self) -> Result<Option<u8>, String> {
        let buf = self.source.fill_buf().map_err(|e| e.to_string())?;
        if buf.is_empty() {
            return Ok(None);
        }
        let b = buf[0];
        self.source.consume(1);
        Ok(Some(b))
    }

    // The counter advances on consumption, not on peek, so a diagnostic
    // raised at a peeked byte names the line the token began on.
    fn next_byte(&mut self) -> Result<Option<u8>, String> {
        let b = match self.peeked.take() {
            Some(b) => Some(b),
            None => self.pull()?,
        };
        if b == Some(b'\n') {
            self.line += 1;
        }
        Ok(b)
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, String> {
        if self.peeked.is_none() {
            self.peeked = self.pull()?;
        }
        Ok(self.peeked)
    }

    fn next_token(&mut self) -> Result<Option<Token>, String> {
        let b = loop {
            match self.next_byte()? {
                None => return Ok(None),
                Some(b) if b.is_ascii_whitespace() => {}
                Some(b) => break b,
            }
        };
        match b {
            b'{' => Ok(Some(Token::ObjBegin)),
            b'}' => Ok(Some(Token::ObjEnd)),
            b'[' => Ok(Some(Token::ArrBegin)),
            b']' => Ok(Some(Token::ArrEnd)),
            b':' => Ok(Some(Token::Colon)),
            b',' => Ok(Some(Token::Comma)),
            b'"' => Ok(Some(Token::Str(self.read_string()?))),
            b't' => {
                self.read_keyword(b"rue")?;
                Ok(Some(Token::Bool(true)))
            }
            b'f' => {
                self.read_keyword(b"alse")?;
                Ok(Some(Token::Bool(false)))
            }
            b'n' => {
                self.read_keyword(b"ull")?;
                Ok(Some(Token::Null))
            }
            b'-' | b'0'..=b'9' => Ok(Some(Token::Num(self.read_number(b)?))),
            other => Err(format!("unexpected byte 0x{other:02x}")),
        }
    }

    fn read_keyword(&mut self, rest: &[u8]) -> Result<(), String> {
        for expected in rest {
            match self.peek_byte()? {
                Some(b) if b == *expected => {
                    self.next_byte()?;
                }
                _ => return Err("invalid literal".to_string()),
            }
        }
        Ok(())
    }

    fn read_number(&mut self, first: u8) -> Result<String, String> {
        let mut lexeme = String::new();
        lexeme.push(first as char);
        while let Some(b) = self.peek_byte()? {
            if b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-') {
                lexeme.push(b as char);
                self.next_byte()?;
            } else {
                break;
            }
        }
        // Shape check only; the lexeme is kept verbatim.
        if lexeme.parse::<f64>().is_err() {
            return Err(format!("invalid number '{lexeme}'"));
        }
        Ok(lexeme)
    }

    fn read_string(&mut self) -> Result<String, String> {
        let mut bytes = Vec::new();
        loop {
            let b = self
                .next_byte()?
                .ok_or_else(|| "unterminated string".to_string())?;
            match b {
                b'"' => break,
                b'\\' => {
                    let esc = self
                        .next_byte()?
                        .ok_or_else(|| "unterminated string".to_string())?;
                    match esc {
                        b'"' => bytes.push(b'"'),
                        b'\\' => bytes.push(b'\\'),
                        b'/' => bytes.push(b'/'),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0c),
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'u' => {
                            let ch = self.read_unicode_escape()?;
                            let mut utf8 = [0u8; 4];
                            bytes.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
                        }
                        other => return Err(format!("invalid escape '\\{}'", other as char)),
                    }
                }
                _ => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| "string is not valid UTF-8".to_string())
    }

    fn read_unicode_escape(&mut self) -> Result<char, String> {
        let high = self.read_hex4()?;
        if (0xd800..0xdc00).contains(&high) {
            // High surrogate; a low surrogate escape must follow.
            if self.next_byte()? != Some(b'\\') || self.next_byte()? != Some(b'u') {
                return Err("unpaired surrogate escape".to_string());
            }
            let low = self.read_hex4()?;
            if !(0xdc00..0xe000).contains(&low) {
                return Err("unpaired surrogate escape".to_string());
            }
            let code = 0x10000 + ((high - 0xd800) << 10) + (low - 0xdc00);
            char::from_u32(code).ok_or_else(|| "invalid surrogate pair".to_string())
        } else {
            char::from_u32(high).ok_or_else(|| "invalid unicode escape".to_string())
        }
    }

    fn read_hex4(&mut self) -> Result<u32, String> {
        let mut value = 0u32;
        for _ in 0..4 {
            let b = self
                .next_byte()?
                .ok_or_else(|| "unterminated unicode escape".to_string())?;
            let digit = (b as char)
                .to_digit(16)
                .ok_or_else(|| "invalid unicode escape".to_string())?;
            value = value * 16 + digit;
        }
        Ok(value)
    }
}
