//! Redis Serialization Protocol (RESP2) values and their wire encoding.
//!
//! Decoding is purely structural: it knows about frames, not commands. A value is
//! decoded by recursive descent from a byte buffer that may hold only part of the
//! frame, in which case the caller is told to read more and try again.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Largest bulk string payload accepted from the wire (same as Redis' `proto-max-bulk-len`).
pub const MAX_BULK_LENGTH: i64 = 512 * 1024 * 1024;
/// Largest element count accepted for a single array.
pub const MAX_ARRAY_LENGTH: i64 = 1024 * 1024;
/// Longest header line (type byte + text) before a CRLF must have been seen.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;
/// Deepest array nesting accepted.
pub const MAX_NESTING_DEPTH: usize = 32;

const CRLF: &[u8] = b"\r\n";

/// Structural errors found while decoding a frame.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum RespError {
    #[error("unknown RESP type byte 0x{0:02x}")]
    UnknownRespType(u8),
    #[error("invalid integer")]
    InvalidInteger,
    #[error("invalid bulk string length {0}")]
    InvalidBulkLength(i64),
    #[error("invalid array length {0}")]
    InvalidArrayLength(i64),
    #[error("bulk string is not terminated by CRLF")]
    MissingTerminator,
    #[error("line exceeds {MAX_LINE_LENGTH} bytes")]
    LineTooLong,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("nesting deeper than {MAX_NESTING_DEPTH} levels")]
    NestingTooDeep,
}

/// A protocol error together with the number of bytes the caller should discard
/// to get past the malformed input.
#[derive(Error, Debug, PartialEq, Clone)]
#[error("{error}")]
pub struct DecodeError {
    pub error: RespError,
    pub skip: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    /// Line-framed text. CR and LF are written as spaces, so only text without
    /// line breaks survives an encode/decode round trip unchanged.
    SimpleString(String),
    /// Error reply text, framed and sanitised like [`RespValue::SimpleString`].
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    /// Null bulk string, `$-1\r\n`.
    Null,
    Array(Vec<RespValue>),
    /// Null array, `*-1\r\n`.
    NullArray,
}

impl RespValue {
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn simple(text: &str) -> Self {
        RespValue::SimpleString(text.to_string())
    }

    /// Payload of a bulk string, if this is one.
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            RespValue::BulkString(data) => Some(data),
            _ => None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buffer = BytesMut::new();
        self.encode_into(&mut buffer);
        buffer.freeze()
    }

    pub fn encode_into(&self, buffer: &mut BytesMut) {
        match self {
            RespValue::SimpleString(text) => {
                buffer.put_u8(b'+');
                put_line_text(buffer, text);
            }
            RespValue::Error(text) => {
                buffer.put_u8(b'-');
                put_line_text(buffer, text);
            }
            RespValue::Integer(value) => {
                buffer.put_u8(b':');
                put_decimal(buffer, *value);
            }
            RespValue::BulkString(data) => {
                buffer.put_u8(b'$');
                put_decimal(buffer, data.len() as i64);
                buffer.put_slice(data);
                buffer.put_slice(CRLF);
            }
            RespValue::Null => buffer.put_slice(b"$-1\r\n"),
            RespValue::Array(elements) => {
                buffer.put_u8(b'*');
                put_decimal(buffer, elements.len() as i64);
                for element in elements {
                    element.encode_into(buffer);
                }
            }
            RespValue::NullArray => buffer.put_slice(b"*-1\r\n"),
        }
    }

    /// Decodes one complete top-level value from the front of `buffer`.
    ///
    /// Returns `Ok(None)` when the buffer holds only a prefix of a value, and
    /// `Ok(Some((value, consumed)))` once a full value is available. Nothing past
    /// `consumed` is inspected.
    pub fn decode(buffer: &[u8]) -> Result<Option<(RespValue, usize)>, DecodeError> {
        let mut parser = Parser {
            buffer,
            position: 0,
        };

        match parser.value(0) {
            Ok(value) => Ok(Some((value, parser.position))),
            Err(ParseError::Incomplete) => Ok(None),
            Err(ParseError::Invalid(error)) => Err(DecodeError {
                error,
                skip: parser.skip_past_line(),
            }),
        }
    }
}

fn put_decimal(buffer: &mut BytesMut, value: i64) {
    buffer.put_slice(value.to_string().as_bytes());
    buffer.put_slice(CRLF);
}

fn put_line_text(buffer: &mut BytesMut, text: &str) {
    if text.contains(is_line_break) {
        buffer.put_slice(text.replace(is_line_break, " ").as_bytes());
    } else {
        buffer.put_slice(text.as_bytes());
    }
    buffer.put_slice(CRLF);
}

fn is_line_break(c: char) -> bool {
    c == '\r' || c == '\n'
}

/// Finds where a complete top-level value ends without building it.
///
/// Progress is kept between calls, so bytes that arrive in many small reads are
/// each checked once. Hand it the same growing buffer every time and
/// [`FrameScanner::reset`] it whenever bytes are removed from the front.
#[derive(Debug, Default)]
pub struct FrameScanner {
    checked: usize,
    /// Children still expected by each array whose header has been checked.
    open_arrays: Vec<usize>,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues checking `buffer`. Returns the length of the first value once it
    /// is complete, `Ok(None)` while more bytes are needed, and the same error as
    /// [`RespValue::decode`] for malformed input.
    pub fn scan(&mut self, buffer: &[u8]) -> Result<Option<usize>, DecodeError> {
        loop {
            let mut parser = Parser {
                buffer,
                position: self.checked,
            };

            let children = match parser.check_element(self.open_arrays.len()) {
                Ok(children) => children,
                Err(ParseError::Incomplete) => return Ok(None),
                Err(ParseError::Invalid(error)) => {
                    let skip = parser.skip_past_line();
                    self.reset();
                    return Err(DecodeError { error, skip });
                }
            };
            self.checked = parser.position;

            if children > 0 {
                self.open_arrays.push(children);
            } else if self.close_element() {
                let length = self.checked;
                self.reset();
                return Ok(Some(length));
            }
        }
    }

    pub fn reset(&mut self) {
        self.checked = 0;
        self.open_arrays.clear();
    }

    /// Records one finished element. Returns true when that completes the top-level value.
    fn close_element(&mut self) -> bool {
        while let Some(remaining) = self.open_arrays.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                return false;
            }
            self.open_arrays.pop();
        }

        true
    }
}

enum ParseError {
    Incomplete,
    Invalid(RespError),
}

impl From<RespError> for ParseError {
    fn from(error: RespError) -> Self {
        ParseError::Invalid(error)
    }
}

struct Parser<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self, depth: usize) -> Result<RespValue, ParseError> {
        let Some(&type_byte) = self.buffer.get(self.position) else {
            return Err(ParseError::Incomplete);
        };
        self.position += 1;

        match type_byte {
            b'+' => Ok(RespValue::SimpleString(self.text_line()?)),
            b'-' => Ok(RespValue::Error(self.text_line()?)),
            b':' => Ok(RespValue::Integer(self.integer_line()?)),
            b'$' => self.bulk_string(),
            b'*' => self.array(depth),
            other => Err(RespError::UnknownRespType(other).into()),
        }
    }

    fn bulk_string(&mut self) -> Result<RespValue, ParseError> {
        match self.bulk_payload()? {
            Some(payload) => Ok(RespValue::BulkString(Bytes::copy_from_slice(payload))),
            None => Ok(RespValue::Null),
        }
    }

    /// Payload of a bulk string, `None` for the null bulk string.
    fn bulk_payload(&mut self) -> Result<Option<&'a [u8]>, ParseError> {
        let length = self.integer_line()?;

        if length == -1 {
            return Ok(None);
        }
        if !(0..=MAX_BULK_LENGTH).contains(&length) {
            return Err(RespError::InvalidBulkLength(length).into());
        }

        let start = self.position;
        let end = start + length as usize;

        if self.buffer.len() < end + CRLF.len() {
            return Err(ParseError::Incomplete);
        }
        if &self.buffer[end..end + CRLF.len()] != CRLF {
            self.position = end;
            return Err(RespError::MissingTerminator.into());
        }

        self.position = end + CRLF.len();
        Ok(Some(&self.buffer[start..end]))
    }

    fn array(&mut self, depth: usize) -> Result<RespValue, ParseError> {
        let Some(count) = self.array_length(depth)? else {
            return Ok(RespValue::NullArray);
        };

        // Capacity is bounded by what is actually buffered, not by the declared count.
        let mut elements = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            elements.push(self.value(depth + 1)?);
        }

        Ok(RespValue::Array(elements))
    }

    /// Element count of an array header, `None` for the null array.
    fn array_length(&mut self, depth: usize) -> Result<Option<usize>, ParseError> {
        let count = self.integer_line()?;

        if count == -1 {
            return Ok(None);
        }
        if !(0..=MAX_ARRAY_LENGTH).contains(&count) {
            return Err(RespError::InvalidArrayLength(count).into());
        }
        if depth >= MAX_NESTING_DEPTH {
            return Err(RespError::NestingTooDeep.into());
        }

        Ok(Some(count as usize))
    }

    /// Validates the next element without building it. An array header counts as
    /// one element; its length is returned so the caller can check the children.
    fn check_element(&mut self, depth: usize) -> Result<usize, ParseError> {
        let Some(&type_byte) = self.buffer.get(self.position) else {
            return Err(ParseError::Incomplete);
        };
        self.position += 1;

        match type_byte {
            b'+' | b'-' => self.text().map(|_| 0),
            b':' => self.integer_line().map(|_| 0),
            b'$' => self.bulk_payload().map(|_| 0),
            b'*' => Ok(self.array_length(depth)?.unwrap_or(0)),
            other => Err(RespError::UnknownRespType(other).into()),
        }
    }

    fn text_line(&mut self) -> Result<String, ParseError> {
        Ok(self.text()?.to_string())
    }

    fn text(&mut self) -> Result<&'a str, ParseError> {
        let line = self.line()?;
        Ok(std::str::from_utf8(line).map_err(|_| RespError::InvalidUtf8)?)
    }

    fn integer_line(&mut self) -> Result<i64, ParseError> {
        let line = self.line()?;
        let text = std::str::from_utf8(line).map_err(|_| RespError::InvalidInteger)?;
        text.parse::<i64>().map_err(|_| RespError::InvalidInteger.into())
    }

    fn line(&mut self) -> Result<&'a [u8], ParseError> {
        let rest = &self.buffer[self.position..];

        match rest.windows(2).position(|window| window == CRLF) {
            Some(end) => {
                self.position += end + CRLF.len();
                Ok(&rest[..end])
            }
            None if rest.len() > MAX_LINE_LENGTH => Err(RespError::LineTooLong.into()),
            None => Err(ParseError::Incomplete),
        }
    }

    fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Offset just past the line holding the current position, or the whole
    /// buffer when no CRLF follows.
    fn skip_past_line(&self) -> usize {
        let position = self.position.min(self.buffer.len());

        if position >= 2 && &self.buffer[position - 2..position] == CRLF {
            return position;
        }

        match self.buffer[position..]
            .windows(2)
            .position(|window| window == CRLF)
        {
            Some(end) => position + end + CRLF.len(),
            None => self.buffer.len(),
        }
        .max(1)
    }
}
