// ABOUTME: SMPP session lifecycle management with automatic reconnection and keep-alive
// ABOUTME: State machine over a pluggable transport, one reconnect and one keep-alive task at most

//! Session lifecycle management.
//!
//! A [`SessionManager`] owns at most one bound session over an
//! [`SmppTransport`] and keeps it usable: it binds at startup or on demand,
//! probes idle sessions with enquire_link, schedules reconnection when the
//! connection drops and unbinds cleanly at shutdown.
//!
//! The manager is a cheap-to-clone handle; its background tasks hold clones
//! of it. At most one reconnection task and one keep-alive task exist at any
//! time, so repeated connection-loss signals never stack reconnection
//! attempts.

pub mod config;
pub mod transport;

pub use config::{KeepAliveConfig, SessionConfig, SessionReuseConfig};
pub use transport::{SmppSession, SmppTransport, SubmitRequest, TransportError};

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

use crate::retry::Retryable;

/// Lifecycle state of the managed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session, none being established
    Disconnected,
    /// A bind is in progress
    Connecting,
    /// A session is bound and usable
    Bound,
    /// Shutdown is unbinding the session
    Unbinding,
}

/// Error raised by session management operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// Establishing a session failed
    #[error("failed to establish session")]
    ConnectionFailed(#[source] TransportError),

    /// The session went away and has not been re-established yet
    #[error("session lost")]
    SessionLost,

    /// The manager is shutting down and hands out no more sessions
    #[error("session manager is shutting down")]
    ShuttingDown,
}

impl Retryable for SessionError {
    fn retryable(&self) -> bool {
        match self {
            SessionError::ConnectionFailed(cause) => cause.retryable(),
            SessionError::SessionLost => true,
            SessionError::ShuttingDown => false,
        }
    }
}

struct Inner<S> {
    state: SessionState,
    session: Option<Arc<S>>,
    last_activity: Instant,
    shutting_down: bool,
}

struct Shared<T: SmppTransport> {
    transport: T,
    config: SessionConfig,
    inner: Mutex<Inner<T::Session>>,
    /// Serializes binds so concurrent callers share one bind attempt
    bind_lock: tokio::sync::Mutex<()>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    keepalive_task: Mutex<Option<JoinHandle<()>>>,
}

/// Keeps one SMPP session bound over a transport.
///
/// Cloning yields another handle to the same managed session. Internal state
/// sits behind a plain mutex that is never held across an await.
pub struct SessionManager<T: SmppTransport> {
    shared: Arc<Shared<T>>,
}

impl<T: SmppTransport> Clone for SessionManager<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: SmppTransport> SessionManager<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                inner: Mutex::new(Inner {
                    state: SessionState::Disconnected,
                    session: None,
                    last_activity: Instant::now(),
                    shutting_down: false,
                }),
                bind_lock: tokio::sync::Mutex::new(()),
                reconnect_task: Mutex::new(None),
                keepalive_task: Mutex::new(None),
            }),
        }
    }

    /// Connect at startup when the configuration asks for it.
    ///
    /// A failed startup bind is logged and handed to the reconnection task
    /// rather than surfaced: senders will bind on demand or pick up the
    /// reconnected session.
    pub async fn start(&self) {
        if !self.shared.config.connect_at_startup {
            return;
        }
        if let Err(error) = self.bind().await {
            warn!(%error, "startup bind failed, will retry in background");
            self.schedule_reconnect();
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().unwrap().state
    }

    /// The session configuration this manager runs with
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// The currently bound session, without binding on demand.
    ///
    /// Unlike [`SessionManager::session`] this never connects and never
    /// probes, so it is the right call for health checks and for callers
    /// that must not pay a bind on their own path. Fails with
    /// [`SessionError::SessionLost`] while the session is down and the
    /// reconnection task has not restored it yet.
    pub fn bound_session(&self) -> Result<Arc<T::Session>, SessionError> {
        let inner = self.shared.inner.lock().unwrap();
        if inner.shutting_down {
            return Err(SessionError::ShuttingDown);
        }
        match inner.state {
            SessionState::Bound => inner.session.clone().ok_or(SessionError::SessionLost),
            _ => Err(SessionError::SessionLost),
        }
    }

    /// Note traffic on the session, refreshing its liveness window
    pub fn record_activity(&self) {
        self.shared.inner.lock().unwrap().last_activity = Instant::now();
    }

    /// Hand out a usable session, binding one if necessary.
    ///
    /// With session reuse enabled, a bound session idle beyond the freshness
    /// window is probed with an enquire_link first; if the probe fails the
    /// session is torn down and a fresh one is bound.
    pub async fn session(&self) -> Result<Arc<T::Session>, SessionError> {
        let existing = {
            let inner = self.shared.inner.lock().unwrap();
            if inner.shutting_down {
                return Err(SessionError::ShuttingDown);
            }
            match inner.state {
                SessionState::Bound => inner
                    .session
                    .clone()
                    .map(|session| (session, inner.last_activity)),
                _ => None,
            }
        };

        if let Some((session, last_activity)) = existing {
            let reuse = &self.shared.config.reuse;
            if !reuse.enabled || last_activity.elapsed() <= reuse.freshness_window {
                return Ok(session);
            }
            match timeout(reuse.probe_timeout, session.enquire_link()).await {
                Ok(Ok(())) => {
                    self.record_activity();
                    return Ok(session);
                }
                Ok(Err(error)) => {
                    debug!(%error, "stale session failed liveness probe, rebinding")
                }
                Err(_) => debug!("stale session liveness probe timed out, rebinding"),
            }
            self.stop_keepalive();
            self.mark_session_lost();
        }

        self.bind().await
    }

    /// Establish a session, transitioning Connecting then Bound.
    ///
    /// Concurrent callers queue on the bind lock; whoever enters after a
    /// successful bind gets the session that bind produced.
    pub async fn bind(&self) -> Result<Arc<T::Session>, SessionError> {
        let _guard = self.shared.bind_lock.lock().await;

        {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.shutting_down {
                return Err(SessionError::ShuttingDown);
            }
            if inner.state == SessionState::Bound {
                if let Some(session) = inner.session.clone() {
                    return Ok(session);
                }
            }
            inner.state = SessionState::Connecting;
        }

        let config = &self.shared.config;
        debug!(host = %config.host, port = config.port, "binding session");
        let bound = match timeout(config.bind_timeout, self.shared.transport.bind(config)).await {
            Ok(Ok(session)) => session,
            Ok(Err(error)) => {
                self.shared.inner.lock().unwrap().state = SessionState::Disconnected;
                return Err(SessionError::ConnectionFailed(error));
            }
            Err(_) => {
                self.shared.inner.lock().unwrap().state = SessionState::Disconnected;
                return Err(SessionError::ConnectionFailed(TransportError::Timeout));
            }
        };

        let session = Arc::new(bound);
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.state = SessionState::Bound;
            inner.session = Some(session.clone());
            inner.last_activity = Instant::now();
        }
        info!(host = %config.host, port = config.port, "session bound");
        self.cancel_reconnect();
        self.start_keepalive();
        Ok(session)
    }

    /// Signal that the connection carrying the session is gone.
    ///
    /// Tears down local state and schedules reconnection. Safe to call from
    /// multiple places for the same loss: only the first signal spawns a
    /// reconnection task, the rest find it already running.
    pub fn channel_closed(&self) {
        if self.shared.inner.lock().unwrap().shutting_down {
            return;
        }
        warn!("session connection lost");
        self.stop_keepalive();
        self.mark_session_lost();
        self.schedule_reconnect();
    }

    /// React to a failed submission: connection-level errors tear the
    /// session down and trigger reconnection, protocol-level rejections
    /// leave it bound.
    pub fn submission_failed(&self, error: &TransportError) {
        if error.requires_rebind() {
            self.channel_closed();
        }
    }

    /// Unbind and stop all background tasks. Idempotent.
    pub async fn shutdown(&self) {
        let session = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.shutting_down {
                return;
            }
            inner.shutting_down = true;
            if inner.state == SessionState::Bound {
                inner.state = SessionState::Unbinding;
            }
            inner.session.take()
        };
        self.stop_keepalive();
        self.cancel_reconnect();

        if let Some(session) = session {
            match timeout(self.shared.config.unbind_timeout, session.unbind()).await {
                Ok(Ok(())) => debug!("session unbound"),
                Ok(Err(error)) => warn!(%error, "unbind failed"),
                Err(_) => warn!("unbind timed out"),
            }
        }
        self.shared.inner.lock().unwrap().state = SessionState::Disconnected;
    }

    fn mark_session_lost(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state == SessionState::Bound {
            inner.state = SessionState::Disconnected;
        }
        inner.session = None;
    }

    fn schedule_reconnect(&self) {
        let mut slot = self.shared.reconnect_task.lock().unwrap();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let manager = self.clone();
        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(manager.shared.config.reconnect_delay).await;
                if manager.shared.inner.lock().unwrap().shutting_down {
                    return;
                }
                match manager.bind().await {
                    Ok(_) => return,
                    Err(error) => warn!(%error, "reconnection attempt failed"),
                }
            }
        }));
    }

    fn start_keepalive(&self) {
        if !self.shared.config.keep_alive.enabled {
            return;
        }
        let mut slot = self.shared.keepalive_task.lock().unwrap();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let manager = self.clone();
        *slot = Some(tokio::spawn(async move {
            let keep_alive = manager.shared.config.keep_alive.clone();
            let mut ticker = tokio::time::interval(keep_alive.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let session = {
                    let inner = manager.shared.inner.lock().unwrap();
                    match inner.state {
                        SessionState::Bound => match inner.session.clone() {
                            Some(session) => session,
                            None => return,
                        },
                        _ => return,
                    }
                };
                match timeout(keep_alive.timeout, session.enquire_link()).await {
                    Ok(Ok(())) => manager.record_activity(),
                    Ok(Err(error)) => {
                        warn!(%error, "keep-alive enquire_link failed");
                        manager.channel_closed();
                        return;
                    }
                    Err(_) => {
                        warn!("keep-alive enquire_link timed out");
                        manager.channel_closed();
                        return;
                    }
                }
            }
        }));
    }

    fn stop_keepalive(&self) {
        if let Some(task) = self.shared.keepalive_task.lock().unwrap().take() {
            task.abort();
        }
    }

    fn cancel_reconnect(&self) {
        if let Some(task) = self.shared.reconnect_task.lock().unwrap().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::testutil::MockTransport;

    fn test_config() -> SessionConfig {
        SessionConfig::new("smsc.test", 2775)
            .with_credentials("sys", "pw")
            .with_keep_alive(KeepAliveConfig::disabled())
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_transitions_to_bound() {
        let transport = MockTransport::new();
        let state = transport.state();
        let manager = SessionManager::new(transport, test_config());

        assert_eq!(manager.state(), SessionState::Disconnected);
        manager.bind().await.unwrap();
        assert_eq!(manager.state(), SessionState::Bound);
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_failure_stays_disconnected() {
        let transport = MockTransport::new();
        let state = transport.state();
        state.bind_failures_remaining.store(1, Ordering::SeqCst);
        let manager = SessionManager::new(transport, test_config());

        let error = manager.bind().await.unwrap_err();
        assert!(matches!(error, SessionError::ConnectionFailed(_)));
        assert_eq!(manager.state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_binds_on_demand() {
        let transport = MockTransport::new();
        let state = transport.state();
        let manager = SessionManager::new(transport, test_config());

        manager.session().await.unwrap();
        assert_eq!(manager.state(), SessionState::Bound);
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 1);
        // a second call reuses the bound session
        manager.session().await.unwrap();
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_session_reports_loss() {
        let transport = MockTransport::new();
        let manager = SessionManager::new(transport, test_config());

        assert!(matches!(
            manager.bound_session().unwrap_err(),
            SessionError::SessionLost
        ));
        manager.bind().await.unwrap();
        assert!(manager.bound_session().is_ok());

        manager.channel_closed();
        assert!(matches!(
            manager.bound_session().unwrap_err(),
            SessionError::SessionLost
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_loss_signals_spawn_one_reconnect() {
        let transport = MockTransport::new();
        let state = transport.state();
        let manager = SessionManager::new(transport, test_config());

        manager.bind().await.unwrap();
        manager.channel_closed();
        manager.channel_closed();
        assert_eq!(manager.state(), SessionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(manager.state(), SessionState::Bound);
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 2);

        // no further binds once reconnected
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_failure_triggers_reconnect() {
        let transport = MockTransport::new();
        let state = transport.state();
        state.enquire_failures_remaining.store(1, Ordering::SeqCst);
        let config = SessionConfig::new("smsc.test", 2775)
            .with_keep_alive(KeepAliveConfig::new(Duration::from_secs(30)));
        let manager = SessionManager::new(transport, config);

        manager.bind().await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(state.enquire_calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), SessionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(manager.state(), SessionState::Bound);
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_session_reused_without_probe() {
        let transport = MockTransport::new();
        let state = transport.state();
        let config = test_config().with_reuse(SessionReuseConfig::new(Duration::from_secs(30)));
        let manager = SessionManager::new(transport, config);

        manager.bind().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        manager.session().await.unwrap();
        assert_eq!(state.enquire_calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_session_probed_before_reuse() {
        let transport = MockTransport::new();
        let state = transport.state();
        let config = test_config().with_reuse(SessionReuseConfig::new(Duration::from_secs(30)));
        let manager = SessionManager::new(transport, config);

        manager.bind().await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        manager.session().await.unwrap();
        assert_eq!(state.enquire_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 1);

        // the successful probe refreshed the freshness window
        tokio::time::sleep(Duration::from_secs(10)).await;
        manager.session().await.unwrap();
        assert_eq!(state.enquire_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_rebinds() {
        let transport = MockTransport::new();
        let state = transport.state();
        state.enquire_failures_remaining.store(1, Ordering::SeqCst);
        let config = test_config().with_reuse(SessionReuseConfig::new(Duration::from_secs(30)));
        let manager = SessionManager::new(transport, config);

        manager.bind().await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        manager.session().await.unwrap();
        assert_eq!(state.enquire_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state(), SessionState::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_unbinds_once() {
        let transport = MockTransport::new();
        let state = transport.state();
        let manager = SessionManager::new(transport, test_config());

        manager.bind().await.unwrap();
        manager.shutdown().await;
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert_eq!(state.unbind_calls.load(Ordering::SeqCst), 1);

        manager.shutdown().await;
        assert_eq!(state.unbind_calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            manager.session().await.unwrap_err(),
            SessionError::ShuttingDown
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_pending_reconnect() {
        let transport = MockTransport::new();
        let state = transport.state();
        let manager = SessionManager::new(transport, test_config());

        manager.bind().await.unwrap();
        manager.channel_closed();
        manager.shutdown().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_keeps_session_bound() {
        let transport = MockTransport::new();
        let manager = SessionManager::new(transport, test_config());

        manager.bind().await.unwrap();
        manager.submission_failed(&TransportError::Rejected("throttled".into()));
        assert_eq!(manager.state(), SessionState::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_error_triggers_reconnect() {
        let transport = MockTransport::new();
        let state = transport.state();
        let manager = SessionManager::new(transport, test_config());

        manager.bind().await.unwrap();
        manager.submission_failed(&TransportError::Closed);
        assert_eq!(manager.state(), SessionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(manager.state(), SessionState::Bound);
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_bind_failure_retries_in_background() {
        let transport = MockTransport::new();
        let state = transport.state();
        state.bind_failures_remaining.store(1, Ordering::SeqCst);
        let config = test_config().with_connect_at_startup(true);
        let manager = SessionManager::new(transport, config);

        manager.start().await;
        assert_eq!(manager.state(), SessionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(manager.state(), SessionState::Bound);
        assert_eq!(state.bind_calls.load(Ordering::SeqCst), 2);
    }
}
