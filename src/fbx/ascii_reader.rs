//! ASCII FBX tokenization and parsing.

use std::io::Read;

use log::{info, trace};

use super::error::{FbxError, Result};
use super::node::{FbxDocument, FbxNode, Property};

/// One lexical token. `Ident` is a "named" token: an identifier merged with
/// the `:` that follows it. A single-character identifier without a `:`
/// degrades to `CharLit` instead.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Eof,
    OpenBrace,
    CloseBrace,
    Asterisk,
    Colon,
    Comma,
    Str(String),
    Ident(String),
    CharLit(char),
    Byte(u8),
    Int(i32),
    Long(i64),
    Double(f64),
}

// Element kinds ordered from narrowest to widest; an array takes the widest
// kind any of its elements needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ArrayKind {
    Byte,
    Int,
    Long,
    Double,
}

/// Reads FBX nodes from a text stream.
///
/// The lexer keeps one character and one token of pushback; the parser is
/// iterative with an explicit node stack, so arbitrarily deep trees cannot
/// exhaust the call stack.
pub struct AsciiReader<R: Read> {
    stream: R,
    position: u64,
    pushback_char: Option<u8>,
    pushback_raw: Option<Token>,
    pushback: Option<Token>,
    /// The maximum array element count that will be allocated.
    ///
    /// Malformed or hostile input could otherwise cause large amounts of
    /// memory to be allocated. Expand as necessary for trusted sources.
    pub max_array_length: usize,
}

// Characters valid inside a numeric literal. Exponent, hex and decimal
// markers are not allowed in first position.
fn is_number_char(c: u8, first: bool) -> bool {
    match c {
        b'0'..=b'9' | b'-' | b'+' => true,
        b'.' | b'e' | b'E' | b'x' | b'X' => !first,
        _ => false,
    }
}

fn is_line_end(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

impl<R: Read> AsciiReader<R> {
    pub fn new(stream: R) -> Self {
        AsciiReader {
            stream,
            position: 0,
            pushback_char: None,
            pushback_raw: None,
            pushback: None,
            max_array_length: 1 << 24,
        }
    }

    /// Read a full document: nodes until the end of the stream.
    ///
    /// The text format stores its version only in a leading comment, which
    /// the lexer discards; the document gets the default version.
    pub fn read(&mut self) -> Result<FbxDocument> {
        let mut document = FbxDocument::default();
        while let Some(node) = self.read_node()? {
            document.nodes.push(node);
        }
        info!("Read {} top-level ASCII nodes", document.nodes.len());
        Ok(document)
    }

    /// Read the next node from the stream, or `None` at end of stream.
    pub fn read_node(&mut self) -> Result<Option<FbxNode>> {
        let mut stack: Vec<FbxNode> = Vec::new();
        loop {
            let token = self.read_token()?;
            match token {
                Token::Eof => {
                    if stack.is_empty() {
                        return Ok(None);
                    }
                    return Err(FbxError::format(
                        self.position,
                        "Unexpected end of stream; expected '}'",
                    ));
                }
                Token::CloseBrace => {
                    let mut done = match stack.pop() {
                        Some(node) => node,
                        None => {
                            return Err(FbxError::format(self.position, "Unexpected '}'"));
                        }
                    };
                    // An opened brace is preserved even when it held nothing.
                    if done.children.is_empty() {
                        done.children.push(None);
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Some(done)),
                        None => return Ok(Some(done)),
                    }
                }
                Token::Ident(name) => {
                    trace!("Node '{}' at depth {}", name, stack.len());
                    let mut node = FbxNode::new(name);
                    let has_block = self.read_properties(&mut node)?;
                    if has_block {
                        stack.push(node);
                    } else {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(Some(node)),
                            None => return Ok(Some(node)),
                        }
                    }
                }
                other => {
                    return Err(FbxError::format(
                        self.position,
                        format!("Unexpected {:?}, expected an identifier", other),
                    ));
                }
            }
        }
    }

    // Reads the comma-separated property list of one node. Returns true
    // when the list was terminated by an opening brace (children follow);
    // the other legal terminators are pushed back for the caller.
    fn read_properties(&mut self, node: &mut FbxNode) -> Result<bool> {
        let mut expect_comma = false;
        loop {
            let token = self.read_token()?;
            match token {
                Token::OpenBrace => return Ok(true),
                Token::Ident(_) | Token::CloseBrace | Token::Eof => {
                    // A trailing comma before the terminator is not required.
                    self.pushback = Some(token);
                    return Ok(false);
                }
                Token::Comma if expect_comma => expect_comma = false,
                _ if expect_comma => {
                    return Err(FbxError::format(
                        self.position,
                        format!("Unexpected {:?}, expected a ','", token),
                    ));
                }
                Token::Asterisk => {
                    node.properties.push(self.read_array()?);
                    expect_comma = true;
                }
                Token::Colon | Token::Comma => {
                    return Err(FbxError::format(
                        self.position,
                        format!("Unexpected {:?} in property list", token),
                    ));
                }
                Token::Str(s) => {
                    node.properties.push(Property::String(s));
                    expect_comma = true;
                }
                Token::CharLit(c) => {
                    node.properties
                        .push(Property::Bool(matches!(c, 'T' | 'Y' | '1')));
                    expect_comma = true;
                }
                Token::Byte(v) => {
                    node.properties.push(Property::Byte(v));
                    expect_comma = true;
                }
                Token::Int(v) => {
                    node.properties.push(Property::Int(v));
                    expect_comma = true;
                }
                Token::Long(v) => {
                    node.properties.push(Property::Long(v));
                    expect_comma = true;
                }
                Token::Double(v) => {
                    node.properties.push(Property::Double(v));
                    expect_comma = true;
                }
            }
        }
    }

    // Parses `count { a: e, e, ... }` after the introducing '*'. The array
    // materializes as the narrowest kind that accommodates every element.
    fn read_array(&mut self) -> Result<Property> {
        let len_token = self.read_token()?;
        let declared: i64 = match len_token {
            Token::Byte(v) => v as i64,
            Token::Int(v) => v as i64,
            Token::Long(v) => v,
            other => {
                return Err(FbxError::format(
                    self.position,
                    format!("Unexpected {:?}, expected an integer", other),
                ));
            }
        };
        if declared < 0 {
            return Err(FbxError::format(
                self.position,
                format!("Invalid array length {}", declared),
            ));
        }
        let declared = declared as usize;
        if declared > self.max_array_length {
            return Err(FbxError::limit(
                self.position,
                format!(
                    "Array length {} higher than permitted maximum {}",
                    declared, self.max_array_length
                ),
            ));
        }
        self.expect_token(Token::OpenBrace)?;
        self.expect_token(Token::Ident("a".to_string()))?;

        let mut ints: Vec<i64> = Vec::with_capacity(declared);
        let mut doubles: Vec<f64> = Vec::with_capacity(declared);
        let mut kind = ArrayKind::Byte;
        let mut expect_comma = false;
        loop {
            let token = self.read_token()?;
            let (int_value, double_value) = match token {
                Token::CloseBrace => break,
                Token::Comma if expect_comma => {
                    expect_comma = false;
                    continue;
                }
                _ if expect_comma => {
                    return Err(FbxError::format(
                        self.position,
                        format!("Unexpected {:?}, expected a ','", token),
                    ));
                }
                Token::Byte(v) => (v as i64, v as f64),
                Token::Int(v) => {
                    kind = kind.max(ArrayKind::Int);
                    (v as i64, v as f64)
                }
                Token::Long(v) => {
                    kind = kind.max(ArrayKind::Long);
                    (v, v as f64)
                }
                Token::Double(v) => {
                    kind = kind.max(ArrayKind::Double);
                    (0, v)
                }
                other => {
                    return Err(FbxError::format(
                        self.position,
                        format!("Unexpected {:?}, expected a number", other),
                    ));
                }
            };
            if ints.len() >= declared {
                return Err(FbxError::format(self.position, "Too many elements in array"));
            }
            ints.push(int_value);
            doubles.push(double_value);
            expect_comma = true;
        }
        // Missing elements stay zero, as the original reader allowed.
        ints.resize(declared, 0);
        doubles.resize(declared, 0.0);

        Ok(match kind {
            ArrayKind::Byte => Property::Bytes(ints.iter().map(|&v| v as u8).collect()),
            ArrayKind::Int => Property::IntArray(ints.iter().map(|&v| v as i32).collect()),
            ArrayKind::Long => Property::LongArray(ints),
            ArrayKind::Double => Property::DoubleArray(doubles),
        })
    }

    fn expect_token(&mut self, expected: Token) -> Result<()> {
        let token = self.read_token()?;
        if token != expected {
            return Err(FbxError::format(
                self.position,
                format!("Unexpected {:?}, expected {:?}", token, expected),
            ));
        }
        Ok(())
    }

    // Merged-token layer: identifiers swallow a following ':' to become
    // named tokens; a lone single-character identifier degrades to a bare
    // character literal with the lookahead pushed back.
    fn read_token(&mut self) -> Result<Token> {
        if let Some(token) = self.pushback.take() {
            return Ok(token);
        }
        let token = self.next_raw_token()?;
        match token {
            Token::Ident(name) => {
                let next = self.next_raw_token()?;
                if next == Token::Colon {
                    Ok(Token::Ident(name))
                } else if name.len() == 1 {
                    self.pushback_raw = Some(next);
                    Ok(Token::CharLit(name.as_bytes()[0] as char))
                } else {
                    Err(FbxError::format(
                        self.position,
                        format!(
                            "Unexpected {:?}, expected ':' or a single-character literal",
                            next
                        ),
                    ))
                }
            }
            other => Ok(other),
        }
    }

    fn next_raw_token(&mut self) -> Result<Token> {
        loop {
            if let Some(token) = self.read_raw_token()? {
                return Ok(token);
            }
        }
    }

    // Single-token layer; `None` stands for discarded comments/whitespace.
    fn read_raw_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.pushback_raw.take() {
            return Ok(Some(token));
        }
        let c = match self.read_char()? {
            Some(c) => c,
            None => return Ok(Some(Token::Eof)),
        };
        let token = match c {
            b';' => {
                // Line comment.
                while let Some(c) = self.read_char()? {
                    if is_line_end(c) {
                        break;
                    }
                }
                return Ok(None);
            }
            b'{' => Token::OpenBrace,
            b'}' => Token::CloseBrace,
            b'*' => Token::Asterisk,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b'"' => {
                // String literal; no escape processing.
                let mut text = String::new();
                loop {
                    match self.read_char()? {
                        None => {
                            return Err(FbxError::format(
                                self.position,
                                "Unexpected end of stream; expecting end quote",
                            ));
                        }
                        Some(b'"') => break,
                        Some(c) => text.push(c as char),
                    }
                }
                Token::Str(text)
            }
            c if c.is_ascii_whitespace() => {
                // Merge whitespace runs.
                while let Some(c) = self.read_char()? {
                    if !c.is_ascii_whitespace() {
                        self.pushback_char = Some(c);
                        break;
                    }
                }
                return Ok(None);
            }
            c if is_number_char(c, true) => {
                let mut text = String::new();
                text.push(c as char);
                while let Some(c) = self.read_char()? {
                    if is_number_char(c, false) {
                        text.push(c as char);
                    } else {
                        self.pushback_char = Some(c);
                        break;
                    }
                }
                self.parse_number(&text)?
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let mut text = String::new();
                text.push(c as char);
                while let Some(c) = self.read_char()? {
                    if c.is_ascii_alphanumeric() || c == b'_' {
                        text.push(c as char);
                    } else {
                        self.pushback_char = Some(c);
                        break;
                    }
                }
                Token::Ident(text)
            }
            other => {
                return Err(FbxError::format(
                    self.position,
                    format!("Unknown character {:?}", other as char),
                ));
            }
        };
        Ok(Some(token))
    }

    // A '.' selects floating point; everything else is parsed as an integer
    // and narrowed to the smallest kind that fits.
    fn parse_number(&self, text: &str) -> Result<Token> {
        if text.contains('.') {
            let value: f64 = text
                .parse()
                .map_err(|_| FbxError::format(self.position, format!("Invalid number {:?}", text)))?;
            return Ok(Token::Double(value));
        }
        let value: i64 = text
            .parse()
            .map_err(|_| FbxError::format(self.position, format!("Invalid integer {:?}", text)))?;
        if (0..=u8::MAX as i64).contains(&value) {
            Ok(Token::Byte(value as u8))
        } else if (i32::MIN as i64..=i32::MAX as i64).contains(&value) {
            Ok(Token::Int(value as i32))
        } else {
            Ok(Token::Long(value))
        }
    }

    // One byte of lookahead over the raw stream.
    fn read_char(&mut self) -> Result<Option<u8>> {
        if let Some(c) = self.pushback_char.take() {
            return Ok(Some(c));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
