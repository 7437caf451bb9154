// ABOUTME: UCS2 (UTF-16BE) encoder used as the catch-all fallback alphabet
// ABOUTME: Two octets per BMP character, surrogate pairs for anything beyond

use bytes::Bytes;

use crate::encoder::{Alphabet, CharacterEncoder, EncodingError};

/// UCS2 encoder.
///
/// Strictly speaking UCS2 only covers the Basic Multilingual Plane, but like
/// most handsets and SMSCs this encoder emits UTF-16 surrogate pairs for
/// anything beyond, so it accepts any Rust string. It should therefore sit
/// last in the selector priority list.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ucs2Encoder;

impl CharacterEncoder for Ucs2Encoder {
    fn alphabet(&self) -> Alphabet {
        Alphabet::Ucs2
    }

    fn can_encode(&self, _text: &str) -> bool {
        true
    }

    fn encode(&self, text: &str) -> Result<Bytes, EncodingError> {
        let mut out = Vec::with_capacity(text.len() * 2);
        for unit in text.encode_utf16() {
            out.extend_from_slice(&unit.to_be_bytes());
        }
        Ok(Bytes::from(out))
    }
}
