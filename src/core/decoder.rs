//! Stateful UTF-8 decoding for streamed response bodies.
//!
//! Network reads split the body at arbitrary byte offsets, so a multi-byte
//! character may straddle two reads. The decoder holds the incomplete tail of
//! one read and completes it with the head of the next. Invalid sequences
//! decode to U+FFFD, matching a non-fatal text decoder.

const REPLACEMENT: char = '\u{FFFD}';

#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next read. Any incomplete trailing sequence is held back
    /// until more bytes arrive.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // valid_up_to guarantees this prefix is well-formed
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush the decoder at end of stream. A dangling partial sequence can
    /// never complete, so it becomes a single replacement character.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        Some(REPLACEMENT.to_string())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
