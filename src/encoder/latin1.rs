// ABOUTME: ISO-8859-1 encoder for the 8-bit SMS alphabet
// ABOUTME: One octet per character, limited to code points up to U+00FF

use bytes::Bytes;

use crate::encoder::{Alphabet, CharacterEncoder, EncodingError};

/// Latin-1 (ISO-8859-1) encoder, one octet per character
#[derive(Debug, Default, Clone, Copy)]
pub struct Latin1Encoder;

impl CharacterEncoder for Latin1Encoder {
    fn alphabet(&self) -> Alphabet {
        Alphabet::EightBit
    }

    fn can_encode(&self, text: &str) -> bool {
        text.chars().all(|c| (c as u32) <= 0xFF)
    }

    fn encode(&self, text: &str) -> Result<Bytes, EncodingError> {
        let mut out = Vec::with_capacity(text.chars().count());
        for c in text.chars() {
            let code = c as u32;
            if code > 0xFF {
                return Err(EncodingError::Unrepresentable {
                    character: c,
                    alphabet: Alphabet::EightBit,
                });
            }
            out.push(code as u8);
        }
        Ok(Bytes::from(out))
    }
}
