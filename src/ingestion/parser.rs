//! Incremental Parser - lazy elements from an array-rooted JSON document
//!
//! The reader is consumed in fixed-size chunks. A structural scan (strings,
//! escapes, nesting depth) finds where each top-level element ends, and only
//! that element's bytes are buffered before `serde_json` decodes them.
//!
//! Emission can be suspended from outside. While suspended the parser reads
//! nothing and yields nothing; `resume` continues with the next element.

use crate::error::{ParseError, ParseErrorKind};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default read chunk size
pub const DEFAULT_READ_BUFFER: usize = 64 * 1024;

const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Result of asking the parser for its next element
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Element(Value),
    /// Emission is paused; nothing was read
    Suspended,
    /// The closing `]` was reached and only whitespace followed
    End,
}

/// External pause/resume control over a producer
pub trait Suspendable {
    fn suspend(&mut self);
    fn resume(&mut self);
    fn is_suspended(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Container,
    String,
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Before the opening `[` (BOM and whitespace allowed)
    Start,
    /// After `[`, a `]` may close an empty array
    BeforeFirst,
    /// After `,`, an element is required
    BeforeNext,
    InElement {
        kind: ElementKind,
        depth: u32,
        in_string: bool,
        escaped: bool,
    },
    AfterElement,
    /// After the closing `]`
    Trailing,
    Done,
    Failed,
}

pub struct ArrayStreamParser<R> {
    reader: R,
    chunk: Vec<u8>,
    pos: usize,
    filled: usize,
    eof: bool,
    /// Absolute offset of `chunk[pos]`
    offset: u64,
    state: ScanState,
    bom_seen: usize,
    element: Vec<u8>,
    element_start: u64,
    suspended: bool,
    emitted: u64,
    error: Option<ParseError>,
}

impl<R: AsyncRead + Unpin> ArrayStreamParser<R> {
    pub fn new(reader: R) -> Self {
        Self::with_buffer_size(reader, DEFAULT_READ_BUFFER)
    }

    pub fn with_buffer_size(reader: R, buffer_size: usize) -> Self {
        Self {
            reader,
            chunk: vec![0; buffer_size.max(1)],
            pos: 0,
            filled: 0,
            eof: false,
            offset: 0,
            state: ScanState::Start,
            bom_seen: 0,
            element: Vec::new(),
            element_start: 0,
            suspended: false,
            emitted: 0,
            error: None,
        }
    }

    /// Elements emitted so far
    pub fn elements_emitted(&self) -> u64 {
        self.emitted
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Produce the next element, `Suspended` while paused, or `End`.
    ///
    /// After an error every further call returns the same error.
    pub async fn next_element(&mut self) -> Result<Emission, ParseError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.suspended {
            return Ok(Emission::Suspended);
        }

        match self.scan().await {
            Ok(Some(value)) => {
                self.emitted += 1;
                Ok(Emission::Element(value))
            }
            Ok(None) => Ok(Emission::End),
            Err(err) => {
                self.state = ScanState::Failed;
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    async fn peek(&mut self) -> Result<Option<u8>, ParseError> {
        if self.pos == self.filled {
            if self.eof {
                return Ok(None);
            }
            let n = self
                .reader
                .read(&mut self.chunk)
                .await
                .map_err(|e| ParseError::at(self.offset, ParseErrorKind::Io(e.to_string())))?;
            self.pos = 0;
            self.filled = n;
            if n == 0 {
                self.eof = true;
                return Ok(None);
            }
        }
        Ok(Some(self.chunk[self.pos]))
    }

    fn advance(&mut self) {
        self.pos += 1;
        self.offset += 1;
    }

    fn fail<T>(&self, kind: ParseErrorKind) -> Result<T, ParseError> {
        Err(ParseError::at(self.offset, kind))
    }

    fn start_element(&mut self, byte: u8) -> Result<(), ParseError> {
        let kind = match byte {
            b'{' | b'[' => ElementKind::Container,
            b'"' => ElementKind::String,
            b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => ElementKind::Scalar,
            other => return self.fail(ParseErrorKind::UnexpectedByte(other as char)),
        };
        self.element.clear();
        self.element.push(byte);
        self.element_start = self.offset;
        self.state = ScanState::InElement {
            kind,
            depth: if kind == ElementKind::Container { 1 } else { 0 },
            in_string: kind == ElementKind::String,
            escaped: false,
        };
        self.advance();
        Ok(())
    }

    fn finish_element(&mut self) -> Result<Value, ParseError> {
        let value = serde_json::from_slice(&self.element).map_err(|e| {
            ParseError::at(self.element_start, ParseErrorKind::InvalidElement(e.to_string()))
        })?;
        self.element.clear();
        self.state = ScanState::AfterElement;
        Ok(value)
    }

    /// Advance until one element is complete (`Some`) or the array ends (`None`)
    async fn scan(&mut self) -> Result<Option<Value>, ParseError> {
        loop {
            if self.state == ScanState::Done {
                return Ok(None);
            }

            let Some(byte) = self.peek().await? else {
                return match self.state {
                    ScanState::Trailing => {
                        self.state = ScanState::Done;
                        Ok(None)
                    }
                    _ => self.fail(ParseErrorKind::UnexpectedEof),
                };
            };

            match self.state {
                ScanState::Start => {
                    let in_bom = self.bom_seen < BOM.len() && self.offset == self.bom_seen as u64;
                    if in_bom && byte == BOM[self.bom_seen] {
                        self.bom_seen += 1;
                        self.advance();
                    } else if self.bom_seen > 0 && self.bom_seen < BOM.len() {
                        return self.fail(ParseErrorKind::NotAnArray(byte as char));
                    } else if is_whitespace(byte) {
                        self.advance();
                    } else if byte == b'[' {
                        self.state = ScanState::BeforeFirst;
                        self.advance();
                    } else {
                        return self.fail(ParseErrorKind::NotAnArray(byte as char));
                    }
                }
                ScanState::BeforeFirst | ScanState::BeforeNext => {
                    if is_whitespace(byte) {
                        self.advance();
                    } else if byte == b']' && self.state == ScanState::BeforeFirst {
                        self.state = ScanState::Trailing;
                        self.advance();
                    } else {
                        self.start_element(byte)?;
                    }
                }
                ScanState::InElement {
                    kind,
                    mut depth,
                    mut in_string,
                    mut escaped,
                } => {
                    if kind == ElementKind::Scalar && !in_string && (is_whitespace(byte) || byte == b',' || byte == b']') {
                        return self.finish_element().map(Some);
                    }

                    self.element.push(byte);
                    self.advance();

                    let mut complete = false;
                    if in_string {
                        if escaped {
                            escaped = false;
                        } else if byte == b'\\' {
                            escaped = true;
                        } else if byte == b'"' {
                            in_string = false;
                            complete = kind == ElementKind::String;
                        }
                    } else if kind == ElementKind::Container {
                        match byte {
                            b'"' => in_string = true,
                            b'{' | b'[' => depth += 1,
                            b'}' | b']' => {
                                depth -= 1;
                                complete = depth == 0;
                            }
                            _ => {}
                        }
                    }

                    if complete {
                        return self.finish_element().map(Some);
                    }
                    self.state = ScanState::InElement {
                        kind,
                        depth,
                        in_string,
                        escaped,
                    };
                }
                ScanState::AfterElement => {
                    if is_whitespace(byte) {
                        self.advance();
                    } else if byte == b',' {
                        self.state = ScanState::BeforeNext;
                        self.advance();
                    } else if byte == b']' {
                        self.state = ScanState::Trailing;
                        self.advance();
                    } else {
                        return self.fail(ParseErrorKind::UnexpectedByte(byte as char));
                    }
                }
                ScanState::Trailing => {
                    if is_whitespace(byte) {
                        self.advance();
                    } else {
                        return self.fail(ParseErrorKind::TrailingData);
                    }
                }
                ScanState::Done | ScanState::Failed => return Ok(None),
            }
        }
    }
}

impl<R> Suspendable for ArrayStreamParser<R> {
    fn suspend(&mut self) {
        self.suspended = true;
    }

    fn resume(&mut self) {
        self.suspended = false;
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn collect(input: &[u8], buffer: usize) -> Result<Vec<Value>, ParseError> {
        let mut parser = ArrayStreamParser::with_buffer_size(input, buffer);
        let mut out = Vec::new();
        loop {
            match parser.next_element().await? {
                Emission::Element(v) => out.push(v),
                Emission::End => return Ok(out),
                Emission::Suspended => unreachable!(),
            }
        }
    }

    #[tokio::test]
    async fn test_parses_mixed_elements() {
        let input = br#" [ {"a": 1, "b": [1, {"c": "]"}]}, "x\"}", 42, -1.5e3, true, null, [] ] "#;
        for buffer in [1, 2, 7, 4096] {
            let values = collect(input, buffer).await.unwrap();
            assert_eq!(
                values,
                vec![
                    json!({"a": 1, "b": [1, {"c": "]"}]}),
                    json!("x\"}"),
                    json!(42),
                    json!(-1500.0),
                    json!(true),
                    json!(null),
                    json!([]),
                ],
                "buffer size {}",
                buffer
            );
        }
    }

    #[tokio::test]
    async fn test_empty_array() {
        assert!(collect(b"[]", 16).await.unwrap().is_empty());
        assert!(collect(b"\n[ \n ]\n", 16).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skips_bom() {
        let mut input = BOM.to_vec();
        input.extend_from_slice("[{\"\u{feff}objectid\": \"1\"}]".as_bytes());
        let values = collect(&input, 2).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["\u{feff}objectid"], json!("1"));
    }

    #[tokio::test]
    async fn test_root_must_be_array() {
        let err = collect(br#"{"a": 1}"#, 16).await.unwrap_err();
        assert_eq!(err, ParseError::at(0, ParseErrorKind::NotAnArray('{')));
    }

    #[tokio::test]
    async fn test_truncated_input() {
        let err = collect(br#"[{"a": 1}, {"b": "#, 16).await.unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
        assert_eq!(err.offset, Some(17));

        let err = collect(b"", 16).await.unwrap_err();
        assert_eq!(err, ParseError::at(0, ParseErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_invalid_element_reports_element_offset() {
        let err = collect(br#"[{"a": 1}, {"b": nope}]"#, 16).await.unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidElement(_)));
        assert_eq!(err.offset, Some(11));
    }

    #[tokio::test]
    async fn test_trailing_comma_and_data() {
        let err = collect(b"[1, 2, ]", 16).await.unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedByte(']'));

        let err = collect(b"[1] [2]", 16).await.unwrap_err();
        assert_eq!(err, ParseError::at(4, ParseErrorKind::TrailingData));
    }

    #[tokio::test]
    async fn test_missing_comma() {
        let err = collect(br#"[{"a": 1} {"b": 2}]"#, 16).await.unwrap_err();
        assert_eq!(err, ParseError::at(10, ParseErrorKind::UnexpectedByte('{')));
    }

    #[tokio::test]
    async fn test_stops_after_error() {
        let mut parser = ArrayStreamParser::new(&b"[1, }"[..]);
        assert_eq!(parser.next_element().await.unwrap(), Emission::Element(json!(1)));
        let first = parser.next_element().await.unwrap_err();
        let second = parser.next_element().await.unwrap_err();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_suspend_and_resume_preserves_order() {
        let mut parser = ArrayStreamParser::with_buffer_size(&b"[1, 2, 3]"[..], 1);

        assert_eq!(parser.next_element().await.unwrap(), Emission::Element(json!(1)));
        parser.suspend();
        let offset = parser.offset();
        assert_eq!(parser.next_element().await.unwrap(), Emission::Suspended);
        assert_eq!(parser.next_element().await.unwrap(), Emission::Suspended);
        assert_eq!(parser.offset(), offset);

        parser.resume();
        assert_eq!(parser.next_element().await.unwrap(), Emission::Element(json!(2)));
        assert_eq!(parser.next_element().await.unwrap(), Emission::Element(json!(3)));
        assert_eq!(parser.next_element().await.unwrap(), Emission::End);
        assert_eq!(parser.next_element().await.unwrap(), Emission::End);
        assert_eq!(parser.elements_emitted(), 3);
    }
}
