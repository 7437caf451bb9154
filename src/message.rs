// ABOUTME: Outbound message model with validated phone numbers and addressed parties
// ABOUTME: Provides a fluent builder for constructing immutable messages ready for submission

use thiserror::Error;

/// Maximum accepted number of digits in a phone number.
///
/// E.164 allows up to 15 digits; a little slack is kept for short codes and
/// national prefixes that some SMSCs accept.
const MAX_PHONE_NUMBER_DIGITS: usize = 20;

/// Error raised when a message cannot be constructed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidMessageError {
    /// The phone number is empty or contains invalid characters
    #[error("invalid phone number {number:?}: {reason}")]
    InvalidPhoneNumber { number: String, reason: String },

    /// A required field was not provided to the builder
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The message has no recipients
    #[error("message must have at least one recipient")]
    NoRecipients,
}

/// A validated phone number.
///
/// Accepts an optional leading `+` followed by digits only. Validation happens
/// once at construction; the rest of the pipeline can treat the inner string
/// as well-formed.
///
/// # Example
///
/// ```rust
/// use smsgate::PhoneNumber;
///
/// let number = PhoneNumber::new("+33601020304").unwrap();
/// assert_eq!(number.as_str(), "+33601020304");
/// assert!(PhoneNumber::new("not a number").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Validate and wrap a phone number string
    pub fn new(number: impl Into<String>) -> Result<Self, InvalidMessageError> {
        let number = number.into();
        let digits = number.strip_prefix('+').unwrap_or(&number);
        if digits.is_empty() {
            return Err(InvalidMessageError::InvalidPhoneNumber {
                number,
                reason: "number is empty".into(),
            });
        }
        if digits.len() > MAX_PHONE_NUMBER_DIGITS {
            return Err(InvalidMessageError::InvalidPhoneNumber {
                number,
                reason: format!("more than {MAX_PHONE_NUMBER_DIGITS} digits"),
            });
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidMessageError::InvalidPhoneNumber {
                number,
                reason: "only digits and an optional leading '+' are allowed".into(),
            });
        }
        Ok(Self(number))
    }

    /// The validated number as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The originating party of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Optional display name
    pub name: Option<String>,
    /// Originating phone number
    pub number: PhoneNumber,
}

impl Sender {
    /// Create a sender without a display name
    pub fn new(number: PhoneNumber) -> Self {
        Self { name: None, number }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A destination party of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Optional display name
    pub name: Option<String>,
    /// Destination phone number
    pub number: PhoneNumber,
}

impl Recipient {
    /// Create a recipient without a display name
    pub fn new(number: PhoneNumber) -> Self {
        Self { name: None, number }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// An outbound SMS message.
///
/// Immutable once built: the sender pipeline only ever reads it. Use
/// [`OutboundMessage::builder`] to construct one.
///
/// # Example
///
/// ```rust
/// use smsgate::{OutboundMessage, PhoneNumber};
///
/// let message = OutboundMessage::builder()
///     .content("Hello!")
///     .from(PhoneNumber::new("+33601020304").unwrap())
///     .to(PhoneNumber::new("+33698765432").unwrap())
///     .build()
///     .unwrap();
/// assert_eq!(message.content(), "Hello!");
/// ```
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    content: String,
    sender: Sender,
    recipients: Vec<Recipient>,
}

impl OutboundMessage {
    /// Create a builder for constructing messages
    pub fn builder() -> OutboundMessageBuilder {
        OutboundMessageBuilder::default()
    }

    /// The text content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The originating party
    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// The destination parties, in submission order
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }
}

/// Builder for [`OutboundMessage`] with a fluent API
#[derive(Debug, Default)]
pub struct OutboundMessageBuilder {
    content: Option<String>,
    sender: Option<Sender>,
    recipients: Vec<Recipient>,
}

impl OutboundMessageBuilder {
    /// Set the text content
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the originating number
    pub fn from(mut self, number: PhoneNumber) -> Self {
        self.sender = Some(Sender::new(number));
        self
    }

    /// Set the originating party, including display name
    pub fn sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Add a destination number
    pub fn to(mut self, number: PhoneNumber) -> Self {
        self.recipients.push(Recipient::new(number));
        self
    }

    /// Add a destination party, including display name
    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    /// Build the message
    pub fn build(self) -> Result<OutboundMessage, InvalidMessageError> {
        let content = self
            .content
            .ok_or(InvalidMessageError::MissingField("content"))?;
        let sender = self
            .sender
            .ok_or(InvalidMessageError::MissingField("sender"))?;
        if self.recipients.is_empty() {
            return Err(InvalidMessageError::NoRecipients);
        }
        Ok(OutboundMessage {
            content,
            sender,
            recipients: self.recipients,
        })
    }
}
