//! Incremental UTF-8 decoding for streamed response bodies.
//!
//! Network reads can end in the middle of a multi-byte character. The decoder
//! keeps the incomplete tail and prepends it to the next read, so every
//! character is decoded exactly once regardless of where the transport cut
//! the byte stream. Create one decoder per response.

#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode everything that forms complete characters so far.
    ///
    /// Invalid sequences become U+FFFD. A trailing incomplete sequence is held
    /// back until more bytes arrive, so the result may be empty.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut decoded = String::with_capacity(self.pending.len());
        let mut consumed = 0;
        while consumed < self.pending.len() {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    decoded.push_str(valid);
                    consumed = self.pending.len();
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    decoded.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match err.error_len() {
                        Some(invalid_len) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid_up_to + invalid_len;
                        }
                        None => {
                            consumed += valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        decoded
    }

    /// Flush at end of stream. A dangling partial character becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
