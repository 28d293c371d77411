//! Incremental decoding of the agent's line-delimited event stream.
//!
//! Bytes go through [`Utf8ChunkDecoder`] first so multi-byte characters split
//! across network chunks are reassembled, then [`EventFrameDecoder`] cuts the
//! text into newline-terminated lines and parses `data: ` lines into records.

use crate::errors::MalformedFrame;
use crate::record::EventRecord;

const DATA_PREFIX: &str = "data: ";

/// Outcome of decoding one complete `data: ` line.
pub type DecodedFrame = Result<EventRecord, MalformedFrame>;

/// Stateful UTF-8 decoder that carries an incomplete trailing sequence over to
/// the next chunk. Invalid sequences decode to U+FFFD.
#[derive(Default, Debug)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        let tail = rest.to_vec();
        self.pending = tail;
        out
    }

    /// Number of bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Splits decoded text into newline-terminated frames.
///
/// Text after the last `\n` is retained until a later chunk terminates it; a
/// remainder that is never terminated is dropped at stream end.
#[derive(Default, Debug)]
pub struct EventFrameDecoder {
    text: Utf8ChunkDecoder,
    buffer: String,
}

impl EventFrameDecoder {
    /// Feeds raw bytes from the transport.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<DecodedFrame> {
        let text = self.text.decode(chunk);
        self.push_str(&text)
    }

    /// Feeds already-decoded text.
    pub fn push_str(&mut self, chunk: &str) -> Vec<DecodedFrame> {
        self.buffer.push_str(chunk);
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let remainder = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, remainder);
        complete.split('\n').filter_map(decode_line).collect()
    }

    /// Unterminated text currently buffered.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    /// Ends the stream, returning the unterminated remainder that is being
    /// discarded (if any). It is never parsed.
    pub fn finish(self) -> Option<String> {
        Some(self.buffer).filter(|rest| !rest.is_empty())
    }
}

fn decode_line(line: &str) -> Option<DecodedFrame> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix(DATA_PREFIX)?;
    Some(
        serde_json::from_str::<EventRecord>(data).map_err(|e| MalformedFrame {
            line: data.to_string(),
            reason: e.to_string(),
        }),
    )
}
