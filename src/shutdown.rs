//! Process-wide shutdown handling.
//!
//! [`ShutdownCoordinator`] owns the cancellation flag and the single slot for
//! the connection currently in use. The pipeline registers each freshly opened
//! stream for the duration of its exchange; when the termination signal
//! arrives the coordinator thread closes whatever is registered and exits the
//! process. In-flight exchanges are abandoned, not drained.
use crate::error::{ClientError, Result};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// What the coordinator thread does after closing the active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Terminate the process with status 0.
    Exit,
    /// Return from the coordinator thread and leave the process running.
    Return,
}

/// Cloneable handle that requests shutdown. Firing more than once is harmless.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger(Sender<()>);

impl ShutdownTrigger {
    pub fn fire(&self) {
        let _ = self.0.try_send(());
    }
}

struct Inner {
    client_id: String,
    cancelled: AtomicBool,
    handler_installed: AtomicBool,
    active: Mutex<Option<TcpStream>>,
    tx: Sender<()>,
    rx: Receiver<()>,
}

#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    pub fn new(client_id: impl Into<String>) -> Self {
        let (tx, rx) = bounded(1);
        Self {
            inner: Arc::new(Inner {
                client_id: client_id.into(),
                cancelled: AtomicBool::new(false),
                handler_installed: AtomicBool::new(false),
                active: Mutex::new(None),
                tx,
                rx,
            }),
        }
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger(self.inner.tx.clone())
    }

    /// Route SIGINT/SIGTERM to this coordinator. Only the first call installs a handler.
    pub fn install_signal_handler(&self) -> std::result::Result<(), ctrlc::Error> {
        if self.inner.handler_installed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let trigger = self.trigger();
        ctrlc::set_handler(move || trigger.fire())
    }

    /// Start the coordinator thread. It blocks until triggered.
    pub fn spawn(&self, policy: ExitPolicy) -> std::io::Result<JoinHandle<()>> {
        let this = self.clone();
        std::thread::Builder::new()
            .name("shutdown".into())
            .spawn(move || {
                if this.inner.rx.recv().is_err() {
                    return;
                }
                this.shutdown();
                if policy == ExitPolicy::Exit {
                    std::process::exit(0);
                }
            })
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn slot(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.inner.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `stream` the active connection until the returned guard is dropped.
    ///
    /// Fails with [`ClientError::Cancelled`] (and closes `stream`) if shutdown
    /// already happened, so a connection opened during shutdown never outlives it.
    pub fn register(&self, stream: &TcpStream) -> Result<ActiveConnection<'_>> {
        let mut slot = self.slot();
        if self.is_cancelled() {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(ClientError::Cancelled);
        }
        *slot = Some(stream.try_clone()?);
        Ok(ActiveConnection { coordinator: self })
    }

    /// Cancel and close the active connection, if any. Idempotent.
    pub fn shutdown(&self) {
        let client_id = &self.inner.client_id;
        debug!(action = "shutdown_client", result = "in_progress", client_id = %client_id);
        let mut slot = self.slot();
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Some(stream) = slot.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                warn!(action = "close_connection", result = "fail", client_id = %client_id, error = %e);
            }
        }
        drop(slot);
        info!(action = "shutdown_client", result = "success", client_id = %client_id);
    }

    fn release(&self) {
        self.slot().take();
    }
}

/// Registration of the connection in use; clears the slot on drop.
pub struct ActiveConnection<'a> {
    coordinator: &'a ShutdownCoordinator,
}

impl Drop for ActiveConnection<'_> {
    fn drop(&mut self) {
        self.coordinator.release();
    }
}
