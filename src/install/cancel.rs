//! One-shot cancellation shared between the workflow task and the signal
//! listener.
//!
//! Cancellation is observed only through [`CancelToken`], backed by a watch
//! channel; there is no raw boolean shared across tasks. The controller
//! owns the sender and any listener tasks, and aborts the listeners on drop
//! so signal handling never outlives the invocation that installed it.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Read side of the cancellation signal. Cheap to clone; safe to poll from
/// any task.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Synchronous check, used at phase boundaries.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation fires. If the controller is dropped
    /// without cancelling, the future stays pending.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// A token that can never be cancelled, for call sites without a caller
    /// context.
    pub fn never() -> Self {
        static NEVER: std::sync::OnceLock<watch::Sender<bool>> = std::sync::OnceLock::new();
        let tx = NEVER.get_or_init(|| watch::channel(false).0);
        Self { rx: tx.subscribe() }
    }
}

/// Owns the cancellation signal for one invocation.
pub struct CancellationController {
    tx: watch::Sender<bool>,
    listeners: Vec<JoinHandle<()>>,
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx,
            listeners: Vec::new(),
        }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the cancellation signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Derive cancellation from a caller-supplied token: when the parent
    /// cancels, so does this controller. An already-cancelled parent
    /// cancels the child immediately, before any forwarding task runs.
    pub fn link_parent(&mut self, parent: CancelToken) {
        if parent.is_cancelled() {
            self.cancel();
            return;
        }
        let tx = self.tx.clone();
        self.listeners.push(tokio::spawn(async move {
            parent.cancelled().await;
            tx.send_replace(true);
        }));
    }

    /// Install a scoped SIGINT/SIGTERM listener that cancels immediately on
    /// the first signal. Dropping the controller deregisters it.
    #[cfg(unix)]
    pub fn listen_for_signals(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let tx = self.tx.clone();
        self.listeners.push(tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => debug!("received SIGINT, cancelling installation"),
                _ = sigterm.recv() => debug!("received SIGTERM, cancelling installation"),
            }
            tx.send_replace(true);
        }));
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn listen_for_signals(&mut self) -> std::io::Result<()> {
        let tx = self.tx.clone();
        self.listeners.push(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("received Ctrl+C, cancelling installation");
                tx.send_replace(true);
            }
        }));
        Ok(())
    }
}

impl Drop for CancellationController {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}
