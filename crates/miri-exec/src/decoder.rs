//! Incremental decoding of a newline-delimited JSON body.
//!
//! Bytes arrive in arbitrary chunks. [`Utf8StreamDecoder`] keeps partial
//! multi-byte sequences between chunks, [`LineFramer`] keeps the unfinished
//! last line, and [`EnvelopeDecoder`] ties both to envelope parsing.

use miri_core::protocol::StreamEnvelope;

/// Stateful UTF-8 decoder. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes a sequence left incomplete by the end of the stream.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    #[cfg(test)]
    fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Splits decoded text on `\n`, holding back the unterminated tail.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: String,
}

impl LineFramer {
    /// Returns every line completed by `text`, without the newline.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.pending.push_str(text);
        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };
        let tail = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, tail);
        complete[..last_newline]
            .split('\n')
            .map(str::to_string)
            .collect()
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    #[cfg(test)]
    fn pending(&self) -> &str {
        &self.pending
    }
}

/// Bytes in, envelopes out. Malformed lines are logged and dropped.
#[derive(Debug, Default)]
pub struct EnvelopeDecoder {
    utf8: Utf8StreamDecoder,
    framer: LineFramer,
    lines_seen: u64,
    skipped: u64,
}

impl EnvelopeDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEnvelope> {
        let text = self.utf8.decode(chunk);
        let lines = self.framer.push(&text);
        self.parse_lines(lines)
    }

    /// Parses whatever is left once the body has ended, including a final
    /// line with no trailing newline.
    pub fn finish(&mut self) -> Vec<StreamEnvelope> {
        let tail = self.utf8.finish();
        let mut lines = self.framer.push(&tail);
        lines.extend(self.framer.finish());
        self.parse_lines(lines)
    }

    /// Number of non-blank lines discarded as malformed.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn parse_lines(&mut self, lines: Vec<String>) -> Vec<StreamEnvelope> {
        lines
            .iter()
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    fn parse_line(&mut self, line: &str) -> Option<StreamEnvelope> {
        self.lines_seen += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str::<StreamEnvelope>(trimmed) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                self.skipped += 1;
                tracing::warn!(
                    line = self.lines_seen,
                    error = %err,
                    "discarding malformed stream line"
                );
                None
            }
        }
    }
}
