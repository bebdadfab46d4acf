//! Incremental UTF-8 decoding of a raw byte stream.
//!
//! Network chunk boundaries fall anywhere, including inside a multi-byte
//! character. [`ChunkDecoder`] carries the incomplete trailing bytes of one
//! buffer into the next call, so the decoded fragments concatenate to the
//! same text the server sent regardless of how the transport split it.
//! Genuinely invalid sequences decode to U+FFFD, matching the lossy
//! behavior of a browser `TextDecoder`.

/// Stateful UTF-8 decoder. One instance per stream; never reset mid-stream.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    /// Incomplete trailing bytes carried to the next call.
    carry: Vec<u8>,
}

impl ChunkDecoder {
    /// Create a decoder with no carried state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next buffer, returning all text completed by it.
    ///
    /// The returned string may be empty when `input` only extends an
    /// incomplete multi-byte sequence.
    pub fn decode(&mut self, input: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(input);

        let mut out = String::with_capacity(data.len());
        let mut rest: &[u8] = &data;
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        // Invalid sequence: replace and resume after it.
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        // Incomplete trailing sequence: carry it forward.
                        None => {
                            self.carry = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end-of-stream.
    ///
    /// Returns a replacement character if the stream ended inside a
    /// multi-byte sequence, `None` when there was nothing pending.
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        self.carry.clear();
        Some(char::REPLACEMENT_CHARACTER.to_string())
    }

    /// Number of bytes currently carried between calls.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
