//! Wire framing for increment streams.
//!
//! # Contract
//!
//! The body of a successful `POST /api/chat` is newline-delimited JSON
//! (`application/x-ndjson`). Each frame carries exactly one increment encoded
//! as a JSON string literal, followed by a single LF:
//!
//! ```text
//! "Hello! "\n
//! "I "\n
//! "am\n\nhere."\n
//! ```
//!
//! JSON escaping keeps raw LF out of the literal, so LF always ends a frame.
//! A CR before the LF is tolerated and blank lines are skipped. Each frame is
//! written as its own body chunk. A body that is cut short (fault or
//! cancellation on the server) never ends cleanly, which the reader treats as
//! a transport fault.
//!
//! Decoding is incremental: [`Utf8Decoder`] carries an incomplete trailing
//! UTF-8 sequence across reads, and [`LineBuffer`] carries an incomplete line.
//! Every byte is scanned once.

use bytes::Bytes;

use crate::error::FrameError;
use crate::increment::Increment;

/// Media type of an increment stream.
pub const CONTENT_TYPE: &str = "application/x-ndjson";

/// Encode one increment as a complete frame.
pub fn encode_frame(increment: &Increment) -> Result<Bytes, FrameError> {
    let mut frame = serde_json::to_vec(increment.as_str())?;
    frame.push(b'\n');
    Ok(Bytes::from(frame))
}

/// Decode the text of one line. Blank lines and empty strings yield `None`.
pub fn decode_frame(line: &str) -> Result<Option<Increment>, FrameError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let text: String = serde_json::from_str(line)?;
    Ok(Increment::new(text))
}

/// Incremental UTF-8 decoder.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much of `chunk` as forms complete characters, keeping an
    /// incomplete trailing sequence for the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String, FrameError> {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let complete = match std::str::from_utf8(&bytes) {
            Ok(_) => bytes.len(),
            // `error_len() == None` means the input ended mid-sequence.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(FrameError::InvalidUtf8 {
                    valid_up_to: e.valid_up_to(),
                });
            }
        };

        self.pending = bytes.split_off(complete);
        String::from_utf8(bytes).map_err(|e| FrameError::InvalidUtf8 {
            valid_up_to: e.utf8_error().valid_up_to(),
        })
    }

    /// Fails if the input ended inside a multi-byte sequence.
    pub fn finish(&mut self) -> Result<(), FrameError> {
        match self.pending.len() {
            0 => Ok(()),
            pending => Err(FrameError::TruncatedUtf8 { pending }),
        }
    }
}

/// Splits a byte stream into LF-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    decoder: Utf8Decoder,
    partial: String,
}

impl LineBuffer {
    /// Feed a chunk; returns every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, FrameError> {
        let text = self.decoder.decode(chunk)?;
        let mut lines = Vec::new();
        let mut rest = text.as_str();
        while let Some(pos) = rest.find('\n') {
            self.partial.push_str(&rest[..pos]);
            lines.push(strip_cr(std::mem::take(&mut self.partial)));
            rest = &rest[pos + 1..];
        }
        self.partial.push_str(rest);
        Ok(lines)
    }

    /// End of input. Returns the unterminated remainder, if any.
    pub fn finish(&mut self) -> Result<Option<String>, FrameError> {
        self.decoder.finish()?;
        let rest = std::mem::take(&mut self.partial);
        Ok((!rest.is_empty()).then(|| strip_cr(rest)))
    }
}

fn strip_cr(mut line: String) -> String {
    if line.ends_with('\r') {
        line.pop();
    }
    line
}

/// Incremental decoder for an increment stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    lines: LineBuffer,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read; returns the increments it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Increment>, FrameError> {
        let mut increments = Vec::new();
        for line in self.lines.push(chunk)? {
            if let Some(increment) = decode_frame(&line)? {
                increments.push(increment);
            }
        }
        Ok(increments)
    }

    /// End of input. Trailing bytes without a terminator are a truncated frame.
    pub fn finish(&mut self) -> Result<(), FrameError> {
        match self.lines.finish()? {
            Some(rest) if !rest.trim().is_empty() => {
                Err(FrameError::TruncatedFrame { pending: rest.len() })
            }
            _ => Ok(()),
        }
    }
}
