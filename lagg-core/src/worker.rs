//! Background thread paired with a readiness signal.
//!
//! A [`PipedWorker`] runs a task on its own thread, either once or repeatedly
//! until stopped. It carries a [`Notifier`] the task (or anything it feeds)
//! can signal, so the owning thread can wait on the worker's progress inside
//! the same `poll` as its other descriptors.

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::notify::Notifier;

/// How many times the worker runs its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Run the task a single time.
    Once,
    /// Re-run the task until the worker is stopped.
    Repeat,
}

/// State shared between a worker and its task.
#[derive(Clone)]
pub struct WorkerHandle {
    signal: Arc<Notifier>,
    stop: Arc<AtomicBool>,
    wake: Arc<Notifier>,
}

impl WorkerHandle {
    /// Fresh handle reporting through `signal`, not yet stopped.
    pub(crate) fn new(signal: Arc<Notifier>) -> io::Result<Self> {
        Ok(Self {
            signal,
            stop: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notifier::new()?),
        })
    }

    /// Readiness signal observed by the owner.
    pub fn signal(&self) -> &Arc<Notifier> {
        &self.signal
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Descriptor that becomes readable once a stop is requested.
    ///
    /// Tasks that block in `poll` include it so a stop can interrupt them.
    pub fn stop_fd(&self) -> RawFd {
        self.wake.as_raw_fd()
    }
}

/// A background thread plus a readiness signal.
pub struct PipedWorker {
    handle: WorkerHandle,
    thread: Option<JoinHandle<()>>,
}

impl PipedWorker {
    /// Spawn a worker with a fresh readiness signal.
    pub fn spawn<F>(name: &str, mode: ExecMode, task: F) -> io::Result<Self>
    where
        F: FnMut(&WorkerHandle) + Send + 'static,
    {
        Self::with_signal(name, mode, Arc::new(Notifier::new()?), task)
    }

    /// Spawn a worker that reports through an existing signal.
    pub fn with_signal<F>(
        name: &str,
        mode: ExecMode,
        signal: Arc<Notifier>,
        mut task: F,
    ) -> io::Result<Self>
    where
        F: FnMut(&WorkerHandle) + Send + 'static,
    {
        let handle = WorkerHandle::new(signal)?;

        let thread_handle = handle.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                task(&thread_handle);
                if mode == ExecMode::Once || thread_handle.is_stopped() {
                    break;
                }
            })?;

        tracing::debug!("worker '{name}' started ({mode:?})");

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Readiness signal observed by the owner.
    pub fn signal(&self) -> &Arc<Notifier> {
        self.handle.signal()
    }

    /// Request the worker to stop after the current task run.
    pub fn stop(&self) {
        self.handle.stop.store(true, Ordering::Release);
        if let Err(e) = self.handle.wake.notify() {
            tracing::warn!("failed to wake worker for stop: {e}");
        }
    }

    /// Wait for the worker thread to finish.
    pub fn join(mut self) -> thread::Result<()> {
        match self.thread.take() {
            Some(t) => t.join(),
            None => Ok(()),
        }
    }
}

impl Drop for PipedWorker {
    fn drop(&mut self) {
        if let Some(t) = self.thread.take() {
            self.stop();
            if t.join().is_err() {
                tracing::warn!("worker thread panicked");
            }
        }
    }
}
