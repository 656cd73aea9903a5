//! Shutdown signal helpers.

use std::fmt;

/// The signal that ended [`wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Interrupt,
    Terminate,
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shutdown::Interrupt => write!(f, "SIGINT"),
            Shutdown::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Waits for the first of SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait() -> std::io::Result<Shutdown> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => Ok(Shutdown::Interrupt),
        _ = terminate.recv() => Ok(Shutdown::Terminate),
    }
}

/// Waits for ctrl-c.
#[cfg(not(unix))]
pub async fn wait() -> std::io::Result<Shutdown> {
    tokio::signal::ctrl_c().await?;
    Ok(Shutdown::Interrupt)
}
