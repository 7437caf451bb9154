// ABOUTME: GSM 03.38 default alphabet encoders in unpacked and septet-packed forms
// ABOUTME: Maps characters to septet codes, including two-septet escape sequences for the extension table

use bytes::Bytes;

use crate::encoder::{Alphabet, CharacterEncoder, EncodingError};

/// Escape code announcing a character from the extension table
pub(crate) const ESCAPE: u8 = 0x1B;

/// Septet code of a character in the GSM 03.38 default table, if present.
///
/// Code 0x1B (ESC) is reserved for extension sequences and is never returned.
pub(crate) fn default_table(c: char) -> Option<u8> {
    match c {
        // These ASCII ranges map to their own values in the default table.
        // '$' (0x24) and '@' (0x40) are deliberately excluded: those code
        // points hold '¤' and '¡' instead.
        ' '..='#' | '%'..='?' | 'A'..='Z' | 'a'..='z' => Some(c as u8),
        '@' => Some(0x00),
        '£' => Some(0x01),
        '$' => Some(0x02),
        '¥' => Some(0x03),
        'è' => Some(0x04),
        'é' => Some(0x05),
        'ù' => Some(0x06),
        'ì' => Some(0x07),
        'ò' => Some(0x08),
        'Ç' => Some(0x09),
        '\n' => Some(0x0A),
        'Ø' => Some(0x0B),
        'ø' => Some(0x0C),
        '\r' => Some(0x0D),
        'Å' => Some(0x0E),
        'å' => Some(0x0F),
        'Δ' => Some(0x10),
        '_' => Some(0x11),
        'Φ' => Some(0x12),
        'Γ' => Some(0x13),
        'Λ' => Some(0x14),
        'Ω' => Some(0x15),
        'Π' => Some(0x16),
        'Ψ' => Some(0x17),
        'Σ' => Some(0x18),
        'Θ' => Some(0x19),
        'Ξ' => Some(0x1A),
        'Æ' => Some(0x1C),
        'æ' => Some(0x1D),
        'ß' => Some(0x1E),
        'É' => Some(0x1F),
        '¤' => Some(0x24),
        '¡' => Some(0x40),
        'Ä' => Some(0x5B),
        'Ö' => Some(0x5C),
        'Ñ' => Some(0x5D),
        'Ü' => Some(0x5E),
        '§' => Some(0x5F),
        '¿' => Some(0x60),
        'ä' => Some(0x7B),
        'ö' => Some(0x7C),
        'ñ' => Some(0x7D),
        'ü' => Some(0x7E),
        'à' => Some(0x7F),
        _ => None,
    }
}

/// Septet code of a character in the GSM 03.38 extension table, if present.
///
/// Each of these is emitted as ESC followed by the returned code, costing two
/// septets.
pub(crate) fn extension_table(c: char) -> Option<u8> {
    match c {
        '\u{0C}' => Some(0x0A), // form feed
        '^' => Some(0x14),
        '{' => Some(0x28),
        '}' => Some(0x29),
        '\\' => Some(0x2F),
        '[' => Some(0x3C),
        '~' => Some(0x3D),
        ']' => Some(0x3E),
        '|' => Some(0x40),
        '€' => Some(0x65),
        _ => None,
    }
}

/// Whether the whole text is representable in the GSM 7-bit alphabet
pub(crate) fn representable(text: &str) -> bool {
    text.chars()
        .all(|c| default_table(c).is_some() || extension_table(c).is_some())
}

/// Number of septets needed for one character (2 for extension characters).
///
/// Characters outside the alphabet count 1; `can_encode` is the gate, the
/// counter must stay total.
pub(crate) fn septets(c: char) -> usize {
    if extension_table(c).is_some() { 2 } else { 1 }
}

fn to_septets(text: &str) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        if let Some(code) = default_table(c) {
            out.push(code);
        } else if let Some(code) = extension_table(c) {
            out.push(ESCAPE);
            out.push(code);
        } else {
            return Err(EncodingError::Unrepresentable {
                character: c,
                alphabet: Alphabet::Gsm7Default,
            });
        }
    }
    Ok(out)
}

/// Pack 7-bit septets into octets, LSB first, as mandated by GSM 03.38
fn pack(septets: &[u8]) -> Vec<u8> {
    let mut packed = Vec::with_capacity((septets.len() * 7).div_ceil(8));
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    for &septet in septets {
        buffer |= u32::from(septet & 0x7F) << bits;
        bits += 7;
        while bits >= 8 {
            packed.push((buffer & 0xFF) as u8);
            buffer >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        packed.push(buffer as u8);
    }
    packed
}

/// GSM 7-bit default alphabet encoder producing one octet per septet.
///
/// This is the form most SMPP servers expect in `short_message` when the
/// data coding scheme announces the default alphabet: the server performs
/// the septet packing itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct Gsm7Encoder;

impl CharacterEncoder for Gsm7Encoder {
    fn alphabet(&self) -> Alphabet {
        Alphabet::Gsm7Default
    }

    fn can_encode(&self, text: &str) -> bool {
        representable(text)
    }

    fn encode(&self, text: &str) -> Result<Bytes, EncodingError> {
        to_septets(text).map(Bytes::from)
    }
}

/// GSM 7-bit default alphabet encoder with septets packed into octets.
///
/// Use this when the peer expects pre-packed user data. 160 septets pack
/// into the full 140-octet payload. Packed output is position-dependent, so
/// the segmenter only accepts it for content that fits a single segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackedGsm7Encoder;

impl CharacterEncoder for PackedGsm7Encoder {
    fn alphabet(&self) -> Alphabet {
        Alphabet::Gsm7Packed
    }

    fn can_encode(&self, text: &str) -> bool {
        representable(text)
    }

    fn encode(&self, text: &str) -> Result<Bytes, EncodingError> {
        let septets = to_septets(text).map_err(|e| match e {
            EncodingError::Unrepresentable { character, .. } => EncodingError::Unrepresentable {
                character,
                alphabet: Alphabet::Gsm7Packed,
            },
            other => other,
        })?;
        Ok(Bytes::from(pack(&septets)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_ascii_identity_ranges() {
        assert_eq!(default_table('A'), Some(0x41));
        assert_eq!(default_table('z'), Some(0x7A));
        assert_eq!(default_table('0'), Some(0x30));
        assert_eq!(default_table('!'), Some(0x21));
        // code points remapped by the GSM table
        assert_eq!(default_table('@'), Some(0x00));
        assert_eq!(default_table('$'), Some(0x02));
        assert_eq!(default_table('_'), Some(0x11));
    }

    #[test]
    fn test_extension_characters_cost_two_septets() {
        for c in ['|', '^', '€', '{', '}', '[', '~', ']', '\\'] {
            assert_eq!(septets(c), 2, "{c:?} should cost 2 septets");
            assert_eq!(default_table(c), None);
        }
        assert_eq!(septets('a'), 1);
    }

    #[test]
    fn test_escape_code_never_produced_from_input() {
        assert_eq!(default_table('\u{1B}'), None);
        assert_eq!(extension_table('\u{1B}'), None);
    }

    #[test]
    fn test_encode_emits_escape_pairs() {
        let encoded = Gsm7Encoder.encode("a€b").unwrap();
        assert_eq!(&encoded[..], &[0x61, ESCAPE, 0x65, 0x62]);
    }

    #[test]
    fn test_encode_rejects_non_gsm_text() {
        assert!(!Gsm7Encoder.can_encode("héllo ☃"));
        assert!(matches!(
            Gsm7Encoder.encode("☃"),
            Err(EncodingError::Unrepresentable { character: '☃', .. })
        ));
    }

    #[test]
    fn test_pack_known_vector() {
        // "hello" => 68 65 6C 6C 6F packed is E8 32 9B FD 06
        let packed = PackedGsm7Encoder.encode("hello").unwrap();
        assert_eq!(&packed[..], &[0xE8, 0x32, 0x9B, 0xFD, 0x06]);
    }

    #[test]
    fn test_pack_160_septets_fill_140_octets() {
        let text = "a".repeat(160);
        let packed = PackedGsm7Encoder.encode(&text).unwrap();
        assert_eq!(packed.len(), 140);
    }

    #[test]
    fn test_eight_septets_pack_into_seven_octets() {
        let packed = PackedGsm7Encoder.encode("aaaaaaaa").unwrap();
        assert_eq!(packed.len(), 7);
    }
}
