// ABOUTME: Shared in-memory SMPP transport mock for session and sender tests
// ABOUTME: Counts operations and fails on demand through pre-armed failure budgets

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::session::{SessionConfig, SmppSession, SmppTransport, SubmitRequest, TransportError};

/// Observable state shared between a [`MockTransport`] and its sessions.
///
/// `*_failures_remaining` counters arm a number of failures: each matching
/// operation consumes one and fails until the counter reaches zero.
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub bind_calls: AtomicU32,
    pub bind_failures_remaining: AtomicU32,
    pub enquire_calls: AtomicU32,
    pub enquire_failures_remaining: AtomicU32,
    pub unbind_calls: AtomicU32,
    pub submit_failures_remaining: AtomicU32,
    /// Destination and segment sequence number of every submit, in order
    pub submits: Mutex<Vec<(String, u8)>>,
    /// Destinations answered with an invalid-address error
    pub invalid_destinations: Mutex<HashSet<String>>,
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<MockState> {
        self.state.clone()
    }
}

impl SmppTransport for MockTransport {
    type Session = MockSession;

    async fn bind(&self, _config: &SessionConfig) -> Result<MockSession, TransportError> {
        self.state.bind_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.state.bind_failures_remaining) {
            return Err(TransportError::Closed);
        }
        Ok(MockSession {
            state: self.state.clone(),
        })
    }
}

#[derive(Debug)]
pub(crate) struct MockSession {
    state: Arc<MockState>,
}

impl SmppSession for MockSession {
    async fn submit(&self, request: SubmitRequest) -> Result<String, TransportError> {
        if self
            .state
            .invalid_destinations
            .lock()
            .unwrap()
            .contains(&request.destination)
        {
            return Err(TransportError::InvalidAddress(request.destination));
        }
        // sequence number sits in the sixth UDH octet; headerless means a
        // single-segment message
        let sequence = if request.udh_present {
            request.user_data[5]
        } else {
            1
        };
        let order = {
            let mut submits = self.state.submits.lock().unwrap();
            submits.push((request.destination, sequence));
            submits.len()
        };
        if take_failure(&self.state.submit_failures_remaining) {
            return Err(TransportError::Closed);
        }
        Ok(format!("msg-{order}"))
    }

    async fn enquire_link(&self) -> Result<(), TransportError> {
        self.state.enquire_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.state.enquire_failures_remaining) {
            return Err(TransportError::Timeout);
        }
        Ok(())
    }

    async fn unbind(&self) -> Result<(), TransportError> {
        self.state.unbind_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
