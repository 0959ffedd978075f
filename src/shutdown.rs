//! Signal handling for long-running commands.
//!
//! `submit` and `job watch` block on the poller until the job finishes. A
//! SIGINT or SIGTERM cancels the returned token so the watch loop can stop
//! the poller and clean up before exiting.

use std::sync::{Arc, OnceLock};

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Signal that ended a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    /// Conventional exit status of a process ended by this signal.
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownSignal::Interrupt => 130,
            ShutdownSignal::Terminate => 143,
        }
    }
}

/// Cancellation token paired with the signal that triggered it.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    received: Arc<OnceLock<ShutdownSignal>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The first signal received, if any.
    pub fn received(&self) -> Option<ShutdownSignal> {
        self.received.get().copied()
    }

    /// Record `sig` and cancel the token. Later signals keep the first one.
    pub fn trigger(&self, sig: ShutdownSignal) {
        if self.received.set(sig).is_ok() {
            tracing::info!(signal = ?sig, "Shutting down");
        }
        self.token.cancel();
    }
}

/// Install a handler that listens for SIGINT and SIGTERM.
///
/// If the handlers cannot be installed the returned [`Shutdown`] simply never
/// fires.
pub fn install_shutdown_handler() -> Shutdown {
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        let sig = tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
            _ = handle.token().cancelled() => return,
        };
        handle.trigger(sig);
    });

    shutdown
}
