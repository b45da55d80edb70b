//! Streaming text decoding of the incoming byte stream.
//!
//! Decoding never fails: malformed input becomes U+FFFD and the decoder picks
//! up again at the next byte. Multi-byte sequences split across read chunks
//! are carried over between calls.

use encoding_rs::{CoderResult, Decoder, Encoding};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A character encoding, identified by its WHATWG label.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    pub fn utf_8() -> Self {
        Self(encoding_rs::UTF_8)
    }

    pub fn windows_1252() -> Self {
        Self(encoding_rs::WINDOWS_1252)
    }

    pub fn utf_16le() -> Self {
        Self(encoding_rs::UTF_16LE)
    }

    pub fn utf_16be() -> Self {
        Self(encoding_rs::UTF_16BE)
    }

    /// Encodings offered in the UI.
    pub fn supported() -> [Self; 4] {
        [
            Self::utf_8(),
            Self::windows_1252(),
            Self::utf_16le(),
            Self::utf_16be(),
        ]
    }

    /// Resolve any label `encoding_rs` knows (case-insensitive, e.g. `latin1`).
    pub fn for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.trim().as_bytes()).map(Self)
    }

    /// Canonical lowercase name, e.g. `utf-8`.
    pub fn label(&self) -> String {
        self.0.name().to_ascii_lowercase()
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.0
    }

    /// Fresh streaming decoder for this encoding.
    pub fn decoder(&self) -> TextDecoder {
        TextDecoder::new(*self)
    }

    /// Encode outgoing text. Unmappable characters become numeric character
    /// references, as `encoding_rs` does for legacy encodings.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        // encoding_rs only encodes to ASCII-compatible encodings; UTF-16 is
        // written out by hand.
        if self.0 == encoding_rs::UTF_16LE {
            return text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        }
        if self.0 == encoding_rs::UTF_16BE {
            return text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        }
        let (bytes, _, _) = self.0.encode(text);
        bytes.into_owned()
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::utf_8()
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextEncoding({})", self.0.name())
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown text encoding: {0}")]
pub struct UnknownEncoding(pub String);

impl FromStr for TextEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::for_label(s).ok_or_else(|| UnknownEncoding(s.to_string()))
    }
}

impl Serialize for TextEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for TextEncoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// Incremental decoder owned by a single read loop.
pub struct TextDecoder {
    encoding: TextEncoding,
    inner: Decoder,
    finished: bool,
}

impl TextDecoder {
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            inner: encoding.0.new_decoder_with_bom_removal(),
            finished: false,
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Decode one chunk. An incomplete trailing sequence is held back until
    /// the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.run(chunk, false)
    }

    /// Flush the decoder at end of stream. A dangling partial sequence comes
    /// out as U+FFFD. Calling it again yields nothing.
    pub fn finish(&mut self) -> String {
        if self.finished {
            return String::new();
        }
        self.finished = true;
        self.run(&[], true)
    }

    fn run(&mut self, mut src: &[u8], last: bool) -> String {
        let capacity = self
            .inner
            .max_utf8_buffer_length(src.len())
            .unwrap_or(src.len() * 3 + 4);
        let mut out = String::with_capacity(capacity);

        loop {
            let (result, read, _had_errors) = self.inner.decode_to_string(src, &mut out, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => {
                    let more = self
                        .inner
                        .max_utf8_buffer_length(src.len())
                        .unwrap_or(src.len() * 3 + 4)
                        .max(16);
                    out.reserve(more);
                }
            }
        }
        out
    }
}

impl fmt::Debug for TextDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextDecoder")
            .field("encoding", &self.encoding)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multibyte_sequence() {
        let mut decoder = TextEncoding::utf_8().decoder();
        let euro = "€".as_bytes();
        assert_eq!(decoder.decode(&euro[..1]), "");
        assert_eq!(decoder.decode(&euro[1..]), "€");
    }

    #[test]
    fn test_malformed_input_is_substituted() {
        let mut decoder = TextEncoding::utf_8().decoder();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_flushes_partial_sequence() {
        let mut decoder = TextEncoding::utf_8().decoder();
        assert_eq!(decoder.decode(&[0xE2, 0x82]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_windows_1252() {
        let mut decoder = TextEncoding::windows_1252().decoder();
        assert_eq!(decoder.decode(&[0x80, b'!']), "€!");
    }

    #[test]
    fn test_utf16le_split_code_unit() {
        let mut decoder = TextEncoding::utf_16le().decoder();
        assert_eq!(decoder.decode(&[b'h']), "");
        assert_eq!(decoder.decode(&[0x00, b'i', 0x00]), "hi");
    }

    #[test]
    fn test_bom_is_removed() {
        let mut decoder = TextEncoding::utf_8().decoder();
        assert_eq!(decoder.decode(b"\xEF\xBB\xBFok"), "ok");
    }

    #[test]
    fn test_labels() {
        assert_eq!(TextEncoding::for_label("latin1"), Some(TextEncoding::windows_1252()));
        assert_eq!(TextEncoding::for_label("UTF-16LE"), Some(TextEncoding::utf_16le()));
        assert!("klingon".parse::<TextEncoding>().is_err());
        assert_eq!(TextEncoding::default().label(), "utf-8");
    }

    #[test]
    fn test_encode_round_trips_through_decoder() {
        for encoding in TextEncoding::supported() {
            let bytes = encoding.encode("AT+OK\r\n");
            let mut decoder = encoding.decoder();
            assert_eq!(decoder.decode(&bytes), "AT+OK\r\n", "{encoding}");
        }
    }

    #[test]
    fn test_serde_by_label() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            encoding: TextEncoding,
        }
        let holder: Holder = toml::from_str("encoding = \"utf-16be\"").unwrap();
        assert_eq!(holder.encoding, TextEncoding::utf_16be());
        assert_eq!(
            toml::to_string(&holder).unwrap().trim(),
            "encoding = \"utf-16be\""
        );
    }
}
