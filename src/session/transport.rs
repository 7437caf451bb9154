// ABOUTME: Transport seam between session management and the SMPP wire protocol
// ABOUTME: Defines bind/submit/enquire/unbind operations and the transport error taxonomy

use bytes::Bytes;

use thiserror::Error;

use crate::encoder::DataCoding;
use crate::retry::Retryable;
use crate::session::config::SessionConfig;

/// One segment ready to be submitted over a bound session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Originating address
    pub source: String,
    /// Destination address
    pub destination: String,
    /// Data coding scheme announcing the payload alphabet
    pub data_coding: DataCoding,
    /// Short message field: user data header (if any) followed by the payload
    pub user_data: Bytes,
    /// Whether `user_data` starts with a user data header
    pub udh_present: bool,
}

/// Error raised by transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure
    #[error("transport i/o error")]
    Io(#[from] std::io::Error),

    /// The peer did not answer within the configured window
    #[error("operation timed out")]
    Timeout,

    /// The connection is gone
    #[error("connection closed")]
    Closed,

    /// The peer answered with a non-zero command status
    #[error("request rejected by peer: {0}")]
    Rejected(String),

    /// The destination or source address is not acceptable
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl TransportError {
    /// Whether the session must be torn down and rebound after this error.
    ///
    /// A rejected request or a bad address leaves the session usable; i/o
    /// failures, timeouts and closed connections do not.
    pub fn requires_rebind(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_) | TransportError::Timeout | TransportError::Closed
        )
    }
}

impl Retryable for TransportError {
    fn retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidAddress(_))
    }
}

/// A bound SMPP session.
///
/// Implementations wrap one transmitter or transceiver bind. All methods take
/// `&self`; a session is shared behind an `Arc` between the manager, its
/// keep-alive task and in-flight submissions.
pub trait SmppSession: Send + Sync + 'static {
    /// Submit one message segment, returning the SMSC message id
    fn submit(
        &self,
        request: SubmitRequest,
    ) -> impl std::future::Future<Output = Result<String, TransportError>> + Send;

    /// Probe session liveness with an enquire_link exchange
    fn enquire_link(&self)
    -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Gracefully unbind and close the connection
    fn unbind(&self) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}

/// Factory for bound sessions.
///
/// The manager calls `bind` whenever it needs a fresh session: at startup,
/// on demand and from its reconnection task.
pub trait SmppTransport: Send + Sync + 'static {
    type Session: SmppSession;

    /// Connect and bind according to `config`
    fn bind(
        &self,
        config: &SessionConfig,
    ) -> impl std::future::Future<Output = Result<Self::Session, TransportError>> + Send;
}
