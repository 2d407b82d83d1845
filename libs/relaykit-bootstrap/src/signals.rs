//! Shutdown signals.
//!
//! Handlers are installed before the inbound starts listening, so a SIGTERM
//! arriving during startup stops the dispatcher instead of killing the process.

use std::fmt;

use anyhow::{Context, Result};
use tokio::signal;

/// Signal that requested shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    CtrlC,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownSignal::CtrlC => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        })
    }
}

/// Installed shutdown handlers.
#[derive(Debug)]
pub struct Signals {
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl Signals {
    /// Install the handlers. Must run inside a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if the SIGTERM handler cannot be installed.
    pub fn install() -> Result<Self> {
        #[cfg(unix)]
        let terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;

        Ok(Self {
            #[cfg(unix)]
            terminate,
        })
    }

    /// Wait for the next Ctrl+C or SIGTERM.
    ///
    /// # Errors
    /// Returns an error if listening for Ctrl+C fails.
    pub async fn recv(&mut self) -> Result<ShutdownSignal> {
        let signal = tokio::select! {
            result = signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                ShutdownSignal::CtrlC
            }
            () = self.terminated() => ShutdownSignal::Terminate,
        };

        tracing::info!(%signal, "Shutdown signal received, stopping dispatcher");
        Ok(signal)
    }

    #[cfg(unix)]
    async fn terminated(&mut self) {
        // A closed stream never reports SIGTERM again.
        if self.terminate.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    #[cfg(not(unix))]
    async fn terminated(&mut self) {
        std::future::pending::<()>().await;
    }
}
