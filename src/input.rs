//! Reading RESP values from byte streams.
//!
//! [`RespReader`] wraps any async byte source (a client socket, the append-only
//! file) with a growable buffer and hands out one complete top-level value at a
//! time, however the bytes happen to be split across reads.

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::resp::{FrameScanner, RespError, RespValue};

const INITIAL_BUFFER_CAPACITY: usize = 4096;

/// Errors that can occur while reading values from a stream.
#[derive(Error, Debug, PartialEq)]
pub enum CommandReadError {
    /// The source ended cleanly between two values.
    #[error("end of stream")]
    EndOfStream,
    /// The source ended in the middle of a value.
    #[error("stream ended in the middle of a value")]
    Truncated,
    #[error("Protocol error: {0}")]
    Protocol(#[from] RespError),
    #[error("I/O error: {0}")]
    Io(String),
}

impl CommandReadError {
    /// Error reply sent to a client whose request could not be decoded.
    pub fn as_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR {}", self))
    }
}

pub struct RespReader<R> {
    reader: R,
    buffer: BytesMut,
    scanner: FrameScanner,
    consumed: u64,
}

impl<R> RespReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanner: FrameScanner::new(),
            consumed: 0,
        }
    }

    /// Reads the next complete value.
    ///
    /// Newly read bytes are checked incrementally, and the value is only built once
    /// its whole frame is buffered. On a protocol error the malformed bytes are
    /// discarded so the next call resumes after them.
    pub async fn read_value(&mut self) -> Result<RespValue, CommandReadError> {
        loop {
            if !self.buffer.is_empty() {
                match self.scanner.scan(&self.buffer) {
                    Ok(Some(frame_length)) => {
                        match RespValue::decode(&self.buffer[..frame_length]) {
                            Ok(Some((value, length))) => {
                                self.advance(length);
                                return Ok(value);
                            }
                            Ok(None) => (),
                            Err(e) => {
                                self.advance(e.skip);
                                return Err(CommandReadError::Protocol(e.error));
                            }
                        }
                    }
                    Ok(None) => (),
                    Err(e) => {
                        self.advance(e.skip);
                        return Err(CommandReadError::Protocol(e.error));
                    }
                }
            }

            let number_of_bytes = self
                .reader
                .read_buf(&mut self.buffer)
                .await
                .map_err(|e| CommandReadError::Io(e.to_string()))?;

            if number_of_bytes == 0 {
                if self.buffer.is_empty() {
                    return Err(CommandReadError::EndOfStream);
                }
                return Err(CommandReadError::Truncated);
            }
        }
    }

    /// Number of bytes that made up the values returned (or skipped) so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    fn advance(&mut self, length: usize) {
        let length = length.min(self.buffer.len());
        self.buffer.advance(length);
        self.scanner.reset();
        self.consumed += length as u64;
    }
}
