//! Outbound connection configuration and connection utilities.
//!
//! This module covers the connection lifecycle only:
//! - Configurable connect timeout and default per-call TTL
//! - TCP keepalive and nodelay
//! - Tracing spans around connection establishment
//! - Retry with linear backoff while connecting
//!
//! Forwarded calls themselves are never retried.

use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpSocket, TcpStream};
use tracing::Instrument;

pub(crate) fn duration_to_u64_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration for an outbound connection to one destination.
#[derive(Debug, Clone)]
pub struct OutboundConfig {
    /// Destination service name for logs and error messages.
    pub service_name: String,

    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,

    /// TTL applied to a call whose context carries no deadline.
    pub call_timeout: Duration,

    /// Maximum number of additional connection attempts.
    pub max_retries: u32,

    /// Backoff unit between connection attempts, multiplied by the attempt number.
    pub base_backoff: Duration,

    /// Cap on the backoff between connection attempts.
    pub max_backoff: Duration,

    pub tcp_keepalive: bool,

    pub tcp_nodelay: bool,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            service_name: "relaykit_outbound".to_owned(),
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            max_retries: 3,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            tcp_keepalive: true,
            tcp_nodelay: true,
        }
    }
}

impl OutboundConfig {
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    #[must_use]
    pub fn without_keepalive(mut self) -> Self {
        self.tcp_keepalive = false;
        self
    }
}

async fn open(address: &str, cfg: &OutboundConfig) -> anyhow::Result<TcpStream> {
    let mut last_error = None;

    for addr in tokio::net::lookup_host(address).await? {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_keepalive(cfg.tcp_keepalive)?;

        match socket.connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(cfg.tcp_nodelay)?;
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(e.into()),
        None => Err(anyhow::anyhow!("{address} did not resolve to any address")),
    }
}

/// Open a TCP connection with the configured socket options.
///
/// Single attempt bounded by `connect_timeout`. See [`connect_with_retry`] for
/// the retrying variant.
///
/// # Errors
/// Returns an error if the address does not resolve, the connection is refused,
/// or the attempt times out.
pub async fn connect_with_stack(address: &str, cfg: &OutboundConfig) -> anyhow::Result<TcpStream> {
    let span = tracing::debug_span!(
        "framed_connect",
        service = %cfg.service_name,
        address = %address
    );

    async move {
        let stream = tokio::time::timeout(cfg.connect_timeout, open(address, cfg))
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "connect to {address} timed out after {}ms",
                    duration_to_u64_ms(cfg.connect_timeout)
                )
            })??;

        tracing::info!(
            service = %cfg.service_name,
            address,
            connect_timeout_ms = duration_to_u64_ms(cfg.connect_timeout),
            call_timeout_ms = duration_to_u64_ms(cfg.call_timeout),
            "outbound connected"
        );
        Ok(stream)
    }
    .instrument(span)
    .await
}

/// Connect with retries, backing off `base_backoff * attempt` capped at `max_backoff`.
///
/// # Errors
/// Returns the last connection error once `max_retries` additional attempts have failed.
pub async fn connect_with_retry(address: &str, cfg: &OutboundConfig) -> anyhow::Result<TcpStream> {
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match connect_with_stack(address, cfg).await {
            Ok(stream) => {
                if attempt > 1 {
                    tracing::info!(
                        service = %cfg.service_name,
                        attempt,
                        "outbound connection established after retries"
                    );
                }
                return Ok(stream);
            }
            Err(e) if attempt <= cfg.max_retries => {
                let backoff = (cfg.base_backoff * attempt).min(cfg.max_backoff);
                tracing::warn!(
                    service = %cfg.service_name,
                    attempt,
                    max_retries = cfg.max_retries,
                    error = %e,
                    backoff_ms = duration_to_u64_ms(backoff),
                    "outbound connection failed, retrying..."
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                tracing::error!(
                    service = %cfg.service_name,
                    attempt,
                    error = %e,
                    "outbound connection failed after all retries"
                );
                return Err(e).context(format!(
                    "Failed to connect to {} at {address} after {attempt} attempts",
                    cfg.service_name
                ));
            }
        }
    }
}
