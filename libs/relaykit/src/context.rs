//! Per-call context.
//!
//! A [`CallContext`] is created at the inbound boundary and threaded by reference
//! through the handler, the client facade and the middleware chain down to the
//! transport. It carries the call metadata, the deadline and the cancellation signal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::RpcError;
use crate::transport::Headers;

#[derive(Debug, Clone)]
pub struct CallContext {
    caller: Arc<str>,
    service: Arc<str>,
    procedure: Arc<str>,
    headers: Headers,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    /// Create a context for `procedure` with no deadline and a fresh cancellation token.
    #[must_use]
    pub fn new(procedure: impl Into<Arc<str>>) -> Self {
        Self {
            caller: Arc::from(""),
            service: Arc::from(""),
            procedure: procedure.into(),
            headers: Headers::new(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<Arc<str>>) -> Self {
        self.caller = caller.into();
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = service.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        for (key, value) in headers {
            self.headers.insert(key.to_ascii_lowercase(), value);
        }
        self
    }

    /// Set the deadline. An earlier deadline already present is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Set the deadline relative to now. An earlier deadline already present is kept.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Replace the cancellation token, e.g. with a child of a connection-wide token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn caller(&self) -> &str {
        &self.caller
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when the call has no deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the call is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drive `fut` to completion unless the call is cancelled or its deadline passes first.
    ///
    /// # Errors
    /// Returns [`RpcError::cancelled`] or [`RpcError::deadline_exceeded`] when the call is
    /// aborted, otherwise whatever `fut` returns.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(RpcError::cancelled());
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(RpcError::cancelled()),
            () = deadline => Err(RpcError::deadline_exceeded()),
            result = fut => result,
        }
    }
}
