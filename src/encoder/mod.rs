// ABOUTME: Character encoding selection for SMS content with pluggable alphabet encoders
// ABOUTME: Tries encoders in configured priority order and picks the first that covers the whole text

//! Alphabet selection and text encoding.
//!
//! SMS payloads are limited to 140 octets, so the cheapest alphabet that can
//! represent the whole message wins. The [`EncoderSelector`] walks a
//! configurable priority list of [`CharacterEncoder`] implementations and
//! returns the output of the first one whose `can_encode` accepts every
//! character of the content.
//!
//! # Example
//!
//! ```rust
//! use smsgate::encoder::{Alphabet, EncoderSelector};
//!
//! let selector = EncoderSelector::default();
//! let encoded = selector.select("plain ascii").unwrap();
//! assert_eq!(encoded.alphabet, Alphabet::Gsm7Default);
//!
//! let encoded = selector.select("snowman ☃").unwrap();
//! assert_eq!(encoded.alphabet, Alphabet::Ucs2);
//! ```

pub mod gsm7;
pub mod latin1;
pub mod ucs2;

pub use gsm7::{Gsm7Encoder, PackedGsm7Encoder};
pub use latin1::Latin1Encoder;
pub use ucs2::Ucs2Encoder;

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;
use tracing::trace;

/// Error raised when message content cannot be encoded
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// A character is outside the target alphabet
    #[error("character {character:?} is not representable in {alphabet:?}")]
    Unrepresentable { character: char, alphabet: Alphabet },

    /// No configured encoder accepts the content
    #[error("no configured encoder can represent the content")]
    NoSuitableEncoder,
}

/// SMPP data coding scheme values for the supported alphabets
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DataCoding {
    /// SMSC default alphabet (GSM 7-bit)
    SmscDefault = 0x00,
    /// Latin-1 (ISO-8859-1)
    Latin1 = 0x03,
    /// UCS2 (ISO/IEC-10646)
    Ucs2 = 0x08,
}

/// Character alphabet used to encode message content.
///
/// Carries the sizing rules the segmenter needs: how many encoding units one
/// character costs and how many units fit in a segment, with or without a
/// concatenation header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alphabet {
    /// GSM 7-bit default alphabet, one octet per septet
    Gsm7Default,
    /// GSM 7-bit default alphabet, septets packed into octets
    Gsm7Packed,
    /// 8-bit Latin-1
    EightBit,
    /// 16-bit UCS2
    Ucs2,
}

impl Alphabet {
    /// Encoding units one character costs in this alphabet.
    ///
    /// A unit is a septet for the 7-bit alphabets, an octet for 8-bit and a
    /// 16-bit code unit for UCS2. GSM extension characters cost two septets
    /// (escape + code); characters outside the Basic Multilingual Plane cost
    /// two UCS2 units (surrogate pair).
    pub fn unit_cost(&self, c: char) -> usize {
        match self {
            Alphabet::Gsm7Default | Alphabet::Gsm7Packed => gsm7::septets(c),
            Alphabet::EightBit => 1,
            Alphabet::Ucs2 => c.len_utf16(),
        }
    }

    /// Maximum units that fit when the whole message is a single segment
    pub fn single_segment_capacity(&self) -> usize {
        match self {
            Alphabet::Gsm7Default | Alphabet::Gsm7Packed => 160,
            Alphabet::EightBit => 140,
            Alphabet::Ucs2 => 70,
        }
    }

    /// Maximum units per segment once a 6-octet concatenation header is added
    pub fn multipart_capacity(&self) -> usize {
        match self {
            Alphabet::Gsm7Default | Alphabet::Gsm7Packed => 153,
            Alphabet::EightBit => 134,
            Alphabet::Ucs2 => 67,
        }
    }

    /// SMPP data coding scheme byte announcing this alphabet
    pub fn data_coding(&self) -> DataCoding {
        match self {
            Alphabet::Gsm7Default | Alphabet::Gsm7Packed => DataCoding::SmscDefault,
            Alphabet::EightBit => DataCoding::Latin1,
            Alphabet::Ucs2 => DataCoding::Ucs2,
        }
    }
}

/// Text encoded with the alphabet that was selected for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// Encoded payload bytes
    pub bytes: Bytes,
    /// Alphabet the bytes are encoded in
    pub alphabet: Alphabet,
}

/// A character encoder for one SMS alphabet.
///
/// `can_encode` must accept a text only if `encode` will succeed on it; the
/// selector relies on that to pick an encoder without trial encoding.
pub trait CharacterEncoder: Send + Sync {
    /// The alphabet this encoder produces
    fn alphabet(&self) -> Alphabet;

    /// Whether every character of the text is representable
    fn can_encode(&self, text: &str) -> bool;

    /// Encode the whole text
    fn encode(&self, text: &str) -> Result<Bytes, EncodingError>;
}

/// Picks an encoder by priority order.
///
/// The first encoder in the list that can represent all characters of the
/// content wins. The default order is GSM 7-bit then UCS2, which mirrors what
/// handsets do: 7-bit until a single character forces the 16-bit alphabet.
pub struct EncoderSelector {
    encoders: Vec<Box<dyn CharacterEncoder>>,
}

impl Default for EncoderSelector {
    fn default() -> Self {
        Self::new(vec![Box::new(Gsm7Encoder), Box::new(Ucs2Encoder)])
    }
}

impl EncoderSelector {
    /// Create a selector with an explicit priority order
    pub fn new(encoders: Vec<Box<dyn CharacterEncoder>>) -> Self {
        Self { encoders }
    }

    /// Find the first encoder able to represent the whole text
    pub fn pick(&self, text: &str) -> Result<&dyn CharacterEncoder, EncodingError> {
        for encoder in &self.encoders {
            if encoder.can_encode(text) {
                trace!(alphabet = ?encoder.alphabet(), "encoder selected");
                return Ok(encoder.as_ref());
            }
        }
        Err(EncodingError::NoSuitableEncoder)
    }

    /// Encode the text with the highest-priority encoder that accepts it
    pub fn select(&self, text: &str) -> Result<Encoded, EncodingError> {
        let encoder = self.pick(text)?;
        Ok(Encoded {
            bytes: encoder.encode(text)?,
            alphabet: encoder.alphabet(),
        })
    }
}

impl std::fmt::Debug for EncoderSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let order: Vec<_> = self.encoders.iter().map(|e| e.alphabet()).collect();
        f.debug_struct("EncoderSelector").field("order", &order).finish()
    }
}
