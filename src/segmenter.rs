// ABOUTME: Splits encoded SMS content into SMPP-sized segments with concatenation headers
// ABOUTME: Keeps escape and surrogate pairs whole and stamps each part with a shared reference number

//! Message segmentation.
//!
//! A single SMS payload is limited to 140 octets: 160 GSM 7-bit septets, 140
//! 8-bit characters or 70 UCS2 code units. Longer content is split into parts
//! of 153 / 134 / 67 units, each prefixed by a 6-octet
//! [User Data Header](https://en.wikipedia.org/wiki/User_Data_Header) carrying
//! the concatenation reference number, the total number of parts and this
//! part's 1-based sequence number.
//!
//! Splitting happens at character granularity before encoding, so a GSM
//! escape pair (or a UTF-16 surrogate pair) can never straddle a segment
//! boundary: if it would, the boundary shifts one unit earlier. For the
//! unpacked, 8-bit and UCS2 alphabets, encoding each part separately is
//! equivalent to encoding the whole message and cutting the result, because
//! those encodings are independent of a character's position. Packed GSM 7-bit
//! is the exception: its octets depend on each septet's bit offset, so packed
//! content is limited to a single segment and multipart splitting is refused.

use std::sync::atomic::{AtomicU8, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tracing::debug;

use crate::encoder::{Alphabet, CharacterEncoder, EncodingError};

/// A concatenated SMS can reference at most 255 parts (one octet in the UDH)
const MAXIMUM_SEGMENTS: usize = 255;

/// Size of the User Data Header for an 8-bit reference number
pub const UDH_SIZE: usize = 6;

// UDH field values for concatenated short messages, 8-bit reference number
// [3GPP TS 23.040]
const UDH_HEADER_LENGTH: u8 = 0x05;
const UDH_IEI_CONCATENATED: u8 = 0x00;
const UDH_IE_DATA_LENGTH: u8 = 0x03;

/// Error raised when a message cannot be segmented
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SegmentationError {
    /// The message would need more parts than the UDH can reference
    #[error("message splits into {0} segments, more than the {MAXIMUM_SEGMENTS} allowed")]
    TooManySegments(usize),

    /// A part failed to encode even though the whole message was accepted
    #[error("failed to encode segment {sequence}/{total}")]
    SegmentEncoding {
        sequence: usize,
        total: usize,
        #[source]
        source: EncodingError,
    },

    /// The alphabet cannot carry content across multiple segments
    #[error("{0:?} payloads cannot be split into multiple segments")]
    MultipartUnsupported(Alphabet),
}

/// Generates concatenation reference numbers.
///
/// All segments of one message carry the same reference number; messages
/// split close together in time must get distinct ones so a receiving
/// handset can tell interleaved deliveries apart.
pub trait ReferenceNumberGenerator: Send + Sync {
    /// Produce the reference number for the next multipart message
    fn next_reference(&self) -> u8;
}

/// Rolling 8-bit reference counter.
///
/// Increments for every multipart message and wraps at 255, so a reference
/// number is only reused after the full range has been exhausted.
#[derive(Debug, Default)]
pub struct RollingReferenceGenerator {
    counter: AtomicU8,
}

impl RollingReferenceGenerator {
    /// Create a generator starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator starting at an arbitrary value
    pub fn starting_at(value: u8) -> Self {
        Self {
            counter: AtomicU8::new(value),
        }
    }
}

impl ReferenceNumberGenerator for RollingReferenceGenerator {
    fn next_reference(&self) -> u8 {
        // wrapping is the documented behavior of fetch_add on overflow
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

/// One part of a (possibly multipart) message, ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSegment {
    payload: Bytes,
    alphabet: Alphabet,
    sequence: u8,
    total: u8,
    reference: Option<u8>,
}

impl EncodedSegment {
    /// Encoded payload bytes, without the UDH
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Alphabet the payload is encoded in
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// 1-based position of this part in the sequence
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Total number of parts of the message
    pub fn total(&self) -> u8 {
        self.total
    }

    /// Concatenation reference number, present only for multipart messages
    pub fn reference(&self) -> Option<u8> {
        self.reference
    }

    /// Whether `user_data` starts with a User Data Header
    pub fn has_udh(&self) -> bool {
        self.reference.is_some()
    }

    /// The bytes to submit: UDH (for multipart messages) followed by payload
    pub fn user_data(&self) -> Bytes {
        match self.reference {
            Some(reference) => {
                let mut data = BytesMut::with_capacity(UDH_SIZE + self.payload.len());
                data.put_slice(&[
                    UDH_HEADER_LENGTH,
                    UDH_IEI_CONCATENATED,
                    UDH_IE_DATA_LENGTH,
                    reference,
                    self.total,
                    self.sequence,
                ]);
                data.put_slice(&self.payload);
                data.freeze()
            }
            None => self.payload.clone(),
        }
    }
}

/// Splits message text into encoded segments.
///
/// # Example
///
/// ```rust
/// use smsgate::encoder::Gsm7Encoder;
/// use smsgate::segmenter::Segmenter;
///
/// let segmenter = Segmenter::default();
/// let segments = segmenter.split(&"a".repeat(161), &Gsm7Encoder).unwrap();
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[0].payload().len(), 153);
/// assert_eq!(segments[1].payload().len(), 8);
/// ```
pub struct Segmenter {
    generator: Box<dyn ReferenceNumberGenerator>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(Box::new(RollingReferenceGenerator::new()))
    }
}

impl std::fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segmenter").finish_non_exhaustive()
    }
}

impl Segmenter {
    /// Create a segmenter with a custom reference number generator
    pub fn new(generator: Box<dyn ReferenceNumberGenerator>) -> Self {
        Self { generator }
    }

    /// Split the text into one or more encoded segments.
    ///
    /// Returns a single headerless segment when the content fits, otherwise
    /// ordered parts sharing one reference number. Reassembling the payloads
    /// in sequence order reproduces the encoding of the whole text.
    pub fn split(
        &self,
        text: &str,
        encoder: &dyn CharacterEncoder,
    ) -> Result<Vec<EncodedSegment>, SegmentationError> {
        let alphabet = encoder.alphabet();
        let units: usize = text.chars().map(|c| alphabet.unit_cost(c)).sum();

        if units <= alphabet.single_segment_capacity() {
            let payload = encoder.encode(text).map_err(|source| {
                SegmentationError::SegmentEncoding {
                    sequence: 1,
                    total: 1,
                    source,
                }
            })?;
            return Ok(vec![EncodedSegment {
                payload,
                alphabet,
                sequence: 1,
                total: 1,
                reference: None,
            }]);
        }

        // packed septet octets depend on each septet's bit offset within the
        // payload, so per-part encodings would not concatenate back into the
        // whole-message encoding
        if alphabet == Alphabet::Gsm7Packed {
            return Err(SegmentationError::MultipartUnsupported(alphabet));
        }

        let parts = cut_parts(text, alphabet, alphabet.multipart_capacity());
        if parts.len() > MAXIMUM_SEGMENTS {
            return Err(SegmentationError::TooManySegments(parts.len()));
        }

        let reference = self.generator.next_reference();
        let total = parts.len();
        debug!(units, total, reference, ?alphabet, "splitting message");

        let mut segments = Vec::with_capacity(total);
        for (index, part) in parts.iter().enumerate() {
            let payload = encoder.encode(part).map_err(|source| {
                SegmentationError::SegmentEncoding {
                    sequence: index + 1,
                    total,
                    source,
                }
            })?;
            segments.push(EncodedSegment {
                payload,
                alphabet,
                sequence: (index + 1) as u8,
                total: total as u8,
                reference: Some(reference),
            });
        }
        Ok(segments)
    }
}

/// Cut the text into parts of at most `budget` encoding units.
///
/// A multi-unit character (escape pair, surrogate pair) that would cross the
/// boundary moves entirely into the next part.
fn cut_parts(text: &str, alphabet: Alphabet, budget: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut used = 0;
    for (index, c) in text.char_indices() {
        let cost = alphabet.unit_cost(c);
        if used + cost > budget && used > 0 {
            parts.push(&text[start..index]);
            start = index;
            used = 0;
        }
        used += cost;
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{Gsm7Encoder, PackedGsm7Encoder, Ucs2Encoder};

    #[test]
    fn test_gsm7_160_characters_fit_in_one_segment() {
        let segments = Segmenter::default()
            .split(&"a".repeat(160), &Gsm7Encoder)
            .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].payload().len(), 160);
        assert_eq!(segments[0].sequence(), 1);
        assert_eq!(segments[0].total(), 1);
        assert!(!segments[0].has_udh());
        assert_eq!(segments[0].reference(), None);
    }

    #[test]
    fn test_gsm7_161_characters_split_153_plus_8() {
        let segments = Segmenter::default()
            .split(&"a".repeat(161), &Gsm7Encoder)
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].payload().len(), 153);
        assert_eq!(segments[1].payload().len(), 8);
        assert_eq!(
            (segments[0].sequence(), segments[0].total()),
            (1, 2)
        );
        assert_eq!(
            (segments[1].sequence(), segments[1].total()),
            (2, 2)
        );
    }

    #[test]
    fn test_nine_extension_characters_single_segment_of_18_bytes() {
        let segments = Segmenter::default()
            .split(&"€".repeat(9), &Gsm7Encoder)
            .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].payload().len(), 18);
    }

    #[test]
    fn test_escape_pair_never_straddles_a_boundary() {
        // 152 plain septets, then a 2-septet extension character: it cannot
        // fit in the remaining single unit of the 153-septet budget, so the
        // boundary shifts one unit earlier
        let text = format!("{}€{}", "a".repeat(152), "b".repeat(10));
        let segments = Segmenter::default().split(&text, &Gsm7Encoder).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].payload().len(), 152);
        assert_eq!(&segments[1].payload()[..2], &[0x1B, 0x65]);
    }

    #[test]
    fn test_ucs2_57_characters_single_segment() {
        let segments = Segmenter::default()
            .split(&"é".repeat(57), &Ucs2Encoder)
            .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].payload().len(), 114);
    }

    #[test]
    fn test_ucs2_splits_at_67_code_units() {
        let segments = Segmenter::default()
            .split(&"é".repeat(71), &Ucs2Encoder)
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].payload().len(), 67 * 2);
        assert_eq!(segments[1].payload().len(), 4 * 2);
    }

    #[test]
    fn test_surrogate_pair_kept_whole() {
        // 132 single-unit characters then an emoji costing 2 units
        let text = format!("{}😀", "a".repeat(132));
        let segments = Segmenter::default().split(&text, &Ucs2Encoder).unwrap();
        let last = segments.last().unwrap();
        assert_eq!(&last.payload()[last.payload().len() - 4..], &[0xD8, 0x3D, 0xDE, 0x00]);
        // every payload holds an even number of octets: no half surrogate
        for segment in &segments {
            assert_eq!(segment.payload().len() % 2, 0);
        }
    }

    #[test]
    fn test_segments_share_one_reference_number() {
        let segmenter = Segmenter::default();
        let first = segmenter.split(&"a".repeat(400), &Gsm7Encoder).unwrap();
        let second = segmenter.split(&"b".repeat(400), &Gsm7Encoder).unwrap();
        let first_ref = first[0].reference().unwrap();
        assert!(first.iter().all(|s| s.reference() == Some(first_ref)));
        assert_ne!(second[0].reference().unwrap(), first_ref);
    }

    #[test]
    fn test_reassembled_payloads_match_whole_encoding() {
        let text = format!("{}[{}]{}", "a".repeat(150), "b".repeat(150), "c".repeat(60));
        let segments = Segmenter::default().split(&text, &Gsm7Encoder).unwrap();
        let reassembled: Vec<u8> = segments
            .iter()
            .flat_map(|s| s.payload().iter().copied())
            .collect();
        let whole = Gsm7Encoder.encode(&text).unwrap();
        assert_eq!(reassembled, whole.to_vec());
    }

    #[test]
    fn test_user_data_header_layout() {
        let segments = Segmenter::new(Box::new(RollingReferenceGenerator::starting_at(0x2A)))
            .split(&"a".repeat(161), &Gsm7Encoder)
            .unwrap();
        let data = segments[1].user_data();
        assert_eq!(&data[..UDH_SIZE], &[0x05, 0x00, 0x03, 0x2A, 2, 2]);
        assert_eq!(data.len(), UDH_SIZE + 8);
    }

    #[test]
    fn test_rolling_reference_wraps_after_255() {
        let generator = RollingReferenceGenerator::starting_at(255);
        assert_eq!(generator.next_reference(), 255);
        assert_eq!(generator.next_reference(), 0);
        assert_eq!(generator.next_reference(), 1);
    }

    #[test]
    fn test_packed_gsm7_single_segment_allowed() {
        let segments = Segmenter::default()
            .split(&"a".repeat(160), &PackedGsm7Encoder)
            .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].payload().len(), 140);
        assert_eq!(
            segments[0].payload(),
            &PackedGsm7Encoder.encode(&"a".repeat(160)).unwrap()
        );
    }

    #[test]
    fn test_packed_gsm7_refuses_multipart() {
        // packing 153-septet parts independently would not reproduce the
        // whole-message packing, so splitting packed content is an error
        assert!(matches!(
            Segmenter::default().split(&"a".repeat(161), &PackedGsm7Encoder),
            Err(SegmentationError::MultipartUnsupported(Alphabet::Gsm7Packed))
        ));
    }

    #[test]
    fn test_too_many_segments_rejected() {
        // 255 * 153 = 39015 septets is the most a GSM7 message can reference
        let text = "a".repeat(255 * 153 + 1);
        assert!(matches!(
            Segmenter::default().split(&text, &Gsm7Encoder),
            Err(SegmentationError::TooManySegments(256))
        ));
    }
}
