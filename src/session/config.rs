// ABOUTME: Session configuration covering connection endpoints, timeouts and lifetime policies
// ABOUTME: Builder-style with_* setters over sensible defaults

use std::time::Duration;

/// Keep-alive policy for a bound session.
///
/// When enabled, the session manager sends periodic enquire_link requests on
/// an otherwise idle session and tears the session down when one goes
/// unanswered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveConfig {
    /// Whether keep-alive probing runs at all
    pub enabled: bool,
    /// Pause between enquire_link requests
    pub interval: Duration,
    /// How long to wait for an enquire_link response
    pub timeout: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

impl KeepAliveConfig {
    /// Keep-alive with a custom probe interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// No keep-alive probing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Policy for reusing an already-bound session across sends.
///
/// Disabled by default: each caller gets whatever session is currently bound,
/// binding on demand if none is. When enabled, a session last active within
/// `freshness_window` is handed out as-is; an older one is probed with an
/// enquire_link first and replaced if the probe fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReuseConfig {
    /// Whether freshness checking applies before reuse
    pub enabled: bool,
    /// Activity within this window counts as proof of liveness
    pub freshness_window: Duration,
    /// How long the liveness probe may take
    pub probe_timeout: Duration,
}

impl Default for SessionReuseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            freshness_window: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionReuseConfig {
    /// Freshness-checked reuse with a custom window
    pub fn new(freshness_window: Duration) -> Self {
        Self {
            enabled: true,
            freshness_window,
            ..Self::default()
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }
}

/// Everything needed to establish and maintain an SMPP session.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use smsgate::session::{KeepAliveConfig, SessionConfig};
///
/// let config = SessionConfig::new("smsc.example.com", 2775)
///     .with_credentials("my-system", "secret")
///     .with_keep_alive(KeepAliveConfig::new(Duration::from_secs(60)))
///     .with_connect_at_startup(true);
/// assert_eq!(config.port, 2775);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// SMSC host name or address
    pub host: String,
    /// SMSC port
    pub port: u16,
    /// system_id presented at bind time
    pub system_id: String,
    /// Password presented at bind time
    pub password: String,
    /// Optional system_type presented at bind time
    pub system_type: Option<String>,
    /// Time allowed for connect plus bind
    pub bind_timeout: Duration,
    /// Time allowed for a submit response
    pub response_timeout: Duration,
    /// Time allowed for the unbind exchange at shutdown
    pub unbind_timeout: Duration,
    /// Pause between reconnection attempts after a lost session
    pub reconnect_delay: Duration,
    /// Bind eagerly when the manager starts instead of on first use
    pub connect_at_startup: bool,
    /// Keep-alive policy
    pub keep_alive: KeepAliveConfig,
    /// Session reuse policy
    pub reuse: SessionReuseConfig,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            system_id: String::new(),
            password: String::new(),
            system_type: None,
            bind_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(5),
            unbind_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(5),
            connect_at_startup: false,
            keep_alive: KeepAliveConfig::default(),
            reuse: SessionReuseConfig::default(),
        }
    }

    pub fn with_credentials(
        mut self,
        system_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.system_id = system_id.into();
        self.password = password.into();
        self
    }

    pub fn with_system_type(mut self, system_type: impl Into<String>) -> Self {
        self.system_type = Some(system_type.into());
        self
    }

    pub fn with_bind_timeout(mut self, timeout: Duration) -> Self {
        self.bind_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_unbind_timeout(mut self, timeout: Duration) -> Self {
        self.unbind_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_connect_at_startup(mut self, connect_at_startup: bool) -> Self {
        self.connect_at_startup = connect_at_startup;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: KeepAliveConfig) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_reuse(mut self, reuse: SessionReuseConfig) -> Self {
        self.reuse = reuse;
        self
    }
}
