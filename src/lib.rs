// ABOUTME: Crate root wiring the SMS sending pipeline modules together
// ABOUTME: Encoding, segmentation, retries and session management behind one sender API

//! SMS transport reliability core.
//!
//! Everything between "send this text to these numbers" and a bound SMPP
//! session: alphabet selection ([`encoder`]), splitting into concatenated
//! segments ([`segmenter`]), bounded retries ([`retry`]) and session
//! lifecycle management ([`session`]), orchestrated by [`sender::SmsSender`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use smsgate::retry::{RetryPolicy, TokioAwaiter};
//! use smsgate::sender::SmsSender;
//! use smsgate::session::{SessionConfig, SessionManager};
//! use smsgate::{OutboundMessage, PhoneNumber};
//!
//! # async fn demo<T: smsgate::session::SmppTransport>(
//! #     transport: T,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new("smsc.example.com", 2775)
//!     .with_credentials("system_id", "password")
//!     .with_connect_at_startup(true);
//! let session = SessionManager::new(transport, config);
//! session.start().await;
//!
//! let sender = SmsSender::new(
//!     session.clone(),
//!     RetryPolicy::FixedDelay { max_attempts: 3, delay: Duration::from_secs(1) },
//!     TokioAwaiter,
//! );
//!
//! let message = OutboundMessage::builder()
//!     .content("Hello, World!")
//!     .from(PhoneNumber::new("+33601020304")?)
//!     .to(PhoneNumber::new("+33698765432")?)
//!     .build()?;
//! let report = sender.send(&message).await;
//! assert!(report.all_succeeded());
//!
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod encoder;
pub mod message;
pub mod retry;
pub mod segmenter;
pub mod sender;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export the message model for easy access
pub use message::{
    InvalidMessageError, OutboundMessage, OutboundMessageBuilder, PhoneNumber, Recipient, Sender,
};

// Re-export the main pipeline entry points
pub use sender::{RecipientOutcome, SendError, SendReport, SmsSender};
pub use session::{SessionConfig, SessionManager};
