//! Graceful shutdown.
//!
//! A [`ShutdownSignal`] is shared by the accept loop and everything else
//! that must stop with the server. The [`ConnectionTracker`] counts open
//! connections so shutdown can wait for them to drain.
//!
//! ```
//! use tessera_server::ShutdownSignal;
//!
//! # tokio_test::block_on(async {
//! let signal = ShutdownSignal::new();
//! let waiter = signal.clone();
//!
//! signal.trigger();
//! waiter.wait().await;
//! assert!(waiter.is_triggered());
//! # });
//! ```

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable one-shot stop flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    state: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// A signal that has not fired.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// A signal fired by SIGINT or SIGTERM (Ctrl+C elsewhere).
    ///
    /// Must be called inside a Tokio runtime. If the handlers cannot be
    /// installed the failure is logged and the signal only fires through
    /// [`trigger`](Self::trigger).
    #[must_use]
    pub fn from_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            match os_signal().await {
                Ok(name) => {
                    tracing::info!(signal = name, "shutdown requested");
                    trigger.trigger();
                }
                Err(e) => tracing::error!(error = %e, "cannot listen for shutdown signals"),
            }
        });
        signal
    }

    /// Fires the signal. Later calls do nothing.
    pub fn trigger(&self) {
        self.state.send_if_modified(|fired| !std::mem::replace(fired, true));
    }

    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.state.borrow()
    }

    /// Completes when the signal fires, immediately if it already has.
    pub async fn wait(&self) {
        let mut receiver = self.state.subscribe();
        // the sender lives in `self`, so this only fails if it was dropped
        let _ = receiver.wait_for(|fired| *fired).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = interrupt.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn os_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Counts open connections.
///
/// ```
/// use tessera_server::shutdown::ConnectionTracker;
///
/// let tracker = ConnectionTracker::new();
/// let guard = tracker.open();
/// assert_eq!(tracker.active(), 1);
/// drop(guard);
/// assert_eq!(tracker.active(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    count: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    /// A tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
        }
    }

    /// Registers a connection until the guard is dropped.
    #[must_use]
    pub fn open(&self) -> ConnectionGuard {
        self.count.send_modify(|n| *n += 1);
        ConnectionGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Open connections.
    #[must_use]
    pub fn active(&self) -> usize {
        *self.count.borrow()
    }

    /// Completes once no connection is open.
    pub async fn drained(&self) {
        let mut receiver = self.count.subscribe();
        let _ = receiver.wait_for(|n| *n == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one connection counted; see [`ConnectionTracker::open`].
#[derive(Debug)]
pub struct ConnectionGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
