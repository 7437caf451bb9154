// ABOUTME: Outbound send pipeline tying encoding, segmentation, retries and the session together
// ABOUTME: Encodes once per message, submits per recipient, retries whole submissions from segment one

//! Outbound message sending.
//!
//! [`SmsSender::send`] runs the full pipeline for one message: pick an
//! alphabet, split the content into segments, then submit every segment to
//! every recipient over the managed session. Encoding and segmentation happen
//! once per message; submission happens once per recipient and is retried as
//! a whole, so a failure at segment 3 of 4 resubmits all four parts on the
//! next attempt. Recipients are independent: one failing destination never
//! stops delivery to the others.

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::encoder::{EncoderSelector, EncodingError};
use crate::message::{OutboundMessage, Recipient, Sender};
use crate::retry::{Awaiter, RetryError, RetryStrategyProvider, Retryable, SimpleRetryExecutor};
use crate::segmenter::{EncodedSegment, SegmentationError, Segmenter};
use crate::session::{
    SessionError, SessionManager, SmppSession, SmppTransport, SubmitRequest, TransportError,
};

/// Error raised by one submission attempt for one recipient
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// No usable session could be obtained
    #[error("could not obtain a session")]
    Session(#[from] SessionError),

    /// A segment submission failed
    #[error("failed to submit segment {sequence}/{total}")]
    Submit {
        sequence: u8,
        total: u8,
        #[source]
        source: TransportError,
    },
}

impl Retryable for SubmissionError {
    fn retryable(&self) -> bool {
        match self {
            SubmissionError::Session(cause) => cause.retryable(),
            SubmissionError::Submit { source, .. } => source.retryable(),
        }
    }
}

/// Why sending to a recipient ultimately failed
#[derive(Debug, Error)]
pub enum SendError {
    /// No configured alphabet can represent the content
    #[error("message content cannot be encoded")]
    Encoding(#[from] EncodingError),

    /// The content cannot be split into a valid sequence of segments
    #[error("message content cannot be segmented")]
    Segmentation(#[from] SegmentationError),

    /// Submission kept failing through all retry attempts
    #[error("message submission failed")]
    Retry(#[from] RetryError<SubmissionError>),
}

/// Preparation failures are shared by every recipient of the message
#[derive(Debug, Clone)]
enum PrepareError {
    Encoding(EncodingError),
    Segmentation(SegmentationError),
}

impl From<PrepareError> for SendError {
    fn from(error: PrepareError) -> Self {
        match error {
            PrepareError::Encoding(e) => SendError::Encoding(e),
            PrepareError::Segmentation(e) => SendError::Segmentation(e),
        }
    }
}

/// Outcome of sending one message to one recipient
#[derive(Debug)]
pub struct RecipientOutcome {
    recipient: Recipient,
    result: Result<Vec<String>, SendError>,
}

impl RecipientOutcome {
    /// The recipient this outcome is about
    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    /// SMSC message ids (one per segment) on success, the failure otherwise
    pub fn result(&self) -> &Result<Vec<String>, SendError> {
        &self.result
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-recipient outcomes of one [`SmsSender::send`] call
#[derive(Debug)]
pub struct SendReport {
    outcomes: Vec<RecipientOutcome>,
}

impl SendReport {
    /// Outcomes in recipient order
    pub fn outcomes(&self) -> &[RecipientOutcome] {
        &self.outcomes
    }

    /// Whether every recipient was delivered to
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(RecipientOutcome::succeeded)
    }
}

/// Sends outbound messages over a managed SMPP session.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo<T: smsgate::session::SmppTransport>(
/// #     session: smsgate::session::SessionManager<T>,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// use std::time::Duration;
/// use smsgate::retry::{RetryPolicy, TokioAwaiter};
/// use smsgate::sender::SmsSender;
/// use smsgate::{OutboundMessage, PhoneNumber};
///
/// let sender = SmsSender::new(
///     session,
///     RetryPolicy::FixedDelay { max_attempts: 3, delay: Duration::from_secs(1) },
///     TokioAwaiter,
/// );
/// let message = OutboundMessage::builder()
///     .content("Hello!")
///     .from(PhoneNumber::new("+33601020304")?)
///     .to(PhoneNumber::new("+33698765432")?)
///     .build()?;
/// let report = sender.send(&message).await;
/// assert!(report.all_succeeded());
/// # Ok(())
/// # }
/// ```
pub struct SmsSender<T: SmppTransport, P, A> {
    selector: EncoderSelector,
    segmenter: Segmenter,
    session: SessionManager<T>,
    retry: SimpleRetryExecutor<P, A>,
}

impl<T, P, A> SmsSender<T, P, A>
where
    T: SmppTransport,
    P: RetryStrategyProvider,
    A: Awaiter,
{
    /// Create a sender with the default alphabet priority and segmenter
    pub fn new(session: SessionManager<T>, retry_policy: P, awaiter: A) -> Self {
        Self {
            selector: EncoderSelector::default(),
            segmenter: Segmenter::default(),
            session,
            retry: SimpleRetryExecutor::new(retry_policy, awaiter),
        }
    }

    /// Replace the alphabet priority list
    pub fn with_selector(mut self, selector: EncoderSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Replace the segmenter
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Send one message to all of its recipients.
    ///
    /// Never fails as a whole: the report carries one outcome per recipient
    /// in recipient order.
    pub async fn send(&self, message: &OutboundMessage) -> SendReport {
        let mut outcomes = Vec::with_capacity(message.recipients().len());

        let segments = match self.prepare(message.content()) {
            Ok(segments) => segments,
            Err(error) => {
                // nothing to submit: the same preparation failure applies to
                // every recipient
                warn!(error = %SendError::from(error.clone()), "message preparation failed");
                for recipient in message.recipients() {
                    outcomes.push(RecipientOutcome {
                        recipient: recipient.clone(),
                        result: Err(error.clone().into()),
                    });
                }
                return SendReport { outcomes };
            }
        };

        debug!(
            segments = segments.len(),
            recipients = message.recipients().len(),
            "sending message"
        );
        for recipient in message.recipients() {
            let result = self
                .retry
                .execute("submit message", || {
                    self.submit_all(message.sender(), recipient, &segments)
                })
                .await
                .map_err(SendError::Retry);
            match &result {
                Ok(ids) => info!(
                    destination = %recipient.number,
                    segments = ids.len(),
                    "message delivered"
                ),
                Err(error) => warn!(
                    destination = %recipient.number,
                    %error,
                    "message delivery failed"
                ),
            }
            outcomes.push(RecipientOutcome {
                recipient: recipient.clone(),
                result,
            });
        }
        SendReport { outcomes }
    }

    fn prepare(&self, content: &str) -> Result<Vec<EncodedSegment>, PrepareError> {
        let encoder = self.selector.pick(content).map_err(PrepareError::Encoding)?;
        self.segmenter
            .split(content, encoder)
            .map_err(PrepareError::Segmentation)
    }

    /// Submit every segment to one recipient, in sequence order.
    ///
    /// The first failing segment aborts the attempt; the retry executor then
    /// resubmits the whole sequence, because a partially delivered multipart
    /// message is undeliverable to the handset anyway.
    async fn submit_all(
        &self,
        sender: &Sender,
        recipient: &Recipient,
        segments: &[EncodedSegment],
    ) -> Result<Vec<String>, SubmissionError> {
        let session = self.session.session().await?;
        let response_timeout = self.session.config().response_timeout;

        let mut message_ids = Vec::with_capacity(segments.len());
        for segment in segments {
            let request = SubmitRequest {
                source: sender.number.as_str().to_string(),
                destination: recipient.number.as_str().to_string(),
                data_coding: segment.alphabet().data_coding(),
                user_data: segment.user_data(),
                udh_present: segment.has_udh(),
            };
            let submitted = match timeout(response_timeout, session.submit(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            };
            match submitted {
                Ok(id) => {
                    self.session.record_activity();
                    message_ids.push(id);
                }
                Err(source) => {
                    self.session.submission_failed(&source);
                    return Err(SubmissionError::Submit {
                        sequence: segment.sequence(),
                        total: segment.total(),
                        source,
                    });
                }
            }
        }
        Ok(message_ids)
    }
}
