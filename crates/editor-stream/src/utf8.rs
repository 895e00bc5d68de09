/// Incremental UTF-8 decoder for chunked byte streams.
///
/// A multi-byte sequence split across two chunks is held back until the rest
/// of it arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    buf: Vec<u8>,
}

impl Utf8Decoder {
    /// Decodes as much of `chunk` (plus any held-back bytes) as possible.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> String {
        self.buf.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.buf.len());
        let mut start = 0;
        while start < self.buf.len() {
            match std::str::from_utf8(&self.buf[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.buf.len();
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.buf[start..valid_end]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.buf.drain(..start);
        out
    }

    /// Flushes held-back bytes at end of stream.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        tail
    }

    /// Number of bytes waiting for the rest of their sequence.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_multibyte_sequence_is_reassembled() {
        let bytes = "é👋".as_bytes();
        let mut decoder = Utf8Decoder::default();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&decoder.push_chunk(std::slice::from_ref(b)));
        }
        assert_eq!(out, "é👋");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn every_split_point_decodes_identically() {
        let text = "data: {\"text\":\"naïve 日本語 🎉\"}\n";
        let bytes = text.as_bytes();
        for i in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::default();
            let mut out = decoder.push_chunk(&bytes[..i]);
            out.push_str(&decoder.push_chunk(&bytes[i..]));
            out.push_str(&decoder.finish());
            assert_eq!(out, text, "split at {i}");
        }
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push_chunk(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn truncated_tail_is_flushed_lossily_on_finish() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push_chunk(&"ü".as_bytes()[..1]), "");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.pending_len(), 0);
    }
}
