//! Peer and dial configuration.
//!
//! [`PeerConfig`] tunes a single peer: queue capacity, timeouts and
//! keepalive. Values live on the peer rather than in globals so differently
//! tuned peers can share a process. [`DialOptions`] carries the settings a
//! dialer needs before a connection exists; the peer itself never reads it.

use std::{env, fmt, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::error::PeerConfigError;

/// Default capacity of the outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
/// Default time [`crate::PeerHandle::try_send`] waits for queue space.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);
/// Default deadline for control frame writes.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(5);
/// Default grace given to the last inbound delivery once the peer is closing.
pub const DEFAULT_DELIVERY_GRACE: Duration = Duration::from_secs(1);
/// Keepalive intervals below this are accepted but logged as too aggressive.
pub const MIN_RECOMMENDED_KEEPALIVE: Duration = Duration::from_secs(1);

/// Validated settings for one peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerConfig {
    queue_capacity: usize,
    send_timeout: Duration,
    control_timeout: Duration,
    delivery_grace: Duration,
    keepalive: Option<Duration>,
}

impl PeerConfig {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> PeerConfigBuilder { PeerConfigBuilder::default() }

    /// Capacity of the outbound queue.
    #[must_use]
    pub fn queue_capacity(&self) -> usize { self.queue_capacity }

    /// How long `try_send` waits for space before reporting backpressure.
    #[must_use]
    pub fn send_timeout(&self) -> Duration { self.send_timeout }

    /// Deadline for ping, close and forced-close writes.
    #[must_use]
    pub fn control_timeout(&self) -> Duration { self.control_timeout }

    /// Grace given to a pending inbound delivery after close is requested.
    #[must_use]
    pub fn delivery_grace(&self) -> Duration { self.delivery_grace }

    /// Keepalive ping interval, if enabled.
    #[must_use]
    pub fn keepalive(&self) -> Option<Duration> { self.keepalive }

    /// Returns `true` if keepalive is enabled with an interval shorter than
    /// [`MIN_RECOMMENDED_KEEPALIVE`].
    #[must_use]
    pub fn keepalive_is_aggressive(&self) -> bool {
        self.keepalive
            .is_some_and(|interval| interval < MIN_RECOMMENDED_KEEPALIVE)
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            delivery_grace: DEFAULT_DELIVERY_GRACE,
            keepalive: None,
        }
    }
}

/// Builder for [`PeerConfig`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use peerlink::PeerConfig;
///
/// let config = PeerConfig::builder()
///     .queue_capacity(64)
///     .keepalive(Duration::from_secs(30))
///     .build()
///     .expect("valid config");
/// assert_eq!(config.keepalive(), Some(Duration::from_secs(30)));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct PeerConfigBuilder {
    config: PeerConfig,
}

impl PeerConfigBuilder {
    /// Set the outbound queue capacity.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set how long `try_send` waits for queue space.
    #[must_use]
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    /// Set the deadline for control frame writes.
    #[must_use]
    pub fn control_timeout(mut self, timeout: Duration) -> Self {
        self.config.control_timeout = timeout;
        self
    }

    /// Set the grace given to the last inbound delivery during shutdown.
    ///
    /// Zero abandons a blocked delivery as soon as close is requested.
    #[must_use]
    pub fn delivery_grace(mut self, grace: Duration) -> Self {
        self.config.delivery_grace = grace;
        self
    }

    /// Set the keepalive interval. [`Duration::ZERO`] disables keepalive.
    #[must_use]
    pub fn keepalive(mut self, interval: Duration) -> Self {
        self.config.keepalive = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PeerConfigError::InvalidCapacity`] if the queue capacity is
    /// zero and [`PeerConfigError::ZeroTimeout`] if the send or control
    /// timeout is zero.
    pub fn build(self) -> Result<PeerConfig, PeerConfigError> {
        let config = self.config;
        if config.queue_capacity == 0 {
            return Err(PeerConfigError::InvalidCapacity(config.queue_capacity));
        }
        if config.send_timeout.is_zero() {
            return Err(PeerConfigError::ZeroTimeout("send_timeout"));
        }
        if config.control_timeout.is_zero() {
            return Err(PeerConfigError::ZeroTimeout("control_timeout"));
        }
        Ok(config)
    }
}

/// Cookie storage shared across connections for session affinity.
///
/// The dialer stores cookies set by the server and replays them on the next
/// connection to the same URL. The peer treats the store as opaque.
pub trait CookieJar: Send + Sync {
    /// Record cookies returned by the server for `url`.
    fn set_cookies(&self, url: &str, cookies: Vec<String>);

    /// Cookies to send when connecting to `url`.
    fn cookies(&self, url: &str) -> Vec<String>;
}

/// Settings consumed by whatever establishes the connection.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct DialOptions {
    /// Request per-message compression; the server may ignore it.
    pub enable_compression: bool,
    /// Proxy URL overriding the environment.
    pub proxy_url: Option<String>,
    /// Cookie store passed through to the dialer.
    #[serde(skip)]
    pub cookie_jar: Option<Arc<dyn CookieJar>>,
}

impl DialOptions {
    /// Proxy to use for a connection with the given URL scheme.
    ///
    /// An explicit [`DialOptions::proxy_url`] wins. Otherwise `wss`/`https`
    /// consult `HTTPS_PROXY`, `ws`/`http` consult `HTTP_PROXY`, and both fall
    /// back to `ALL_PROXY`. Upper-case names take precedence over lower-case
    /// ones and empty values are ignored.
    #[must_use]
    pub fn proxy_for(&self, scheme: &str) -> Option<String> {
        if let Some(url) = self.proxy_url.as_deref().filter(|url| !url.is_empty()) {
            return Some(url.to_owned());
        }
        let scheme_var = match scheme.to_ascii_lowercase().as_str() {
            "wss" | "https" => Some("HTTPS_PROXY"),
            "ws" | "http" => Some("HTTP_PROXY"),
            _ => None,
        };
        scheme_var
            .into_iter()
            .chain(std::iter::once("ALL_PROXY"))
            .find_map(proxy_from_env)
    }
}

fn proxy_from_env(name: &str) -> Option<String> {
    [name.to_owned(), name.to_ascii_lowercase()]
        .into_iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
}

impl fmt::Debug for DialOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialOptions")
            .field("enable_compression", &self.enable_compression)
            .field("proxy_url", &self.proxy_url)
            .field("cookie_jar", &self.cookie_jar.is_some())
            .finish()
    }
}
