//! Serialized executor: a single worker thread that owns mutable state.
//!
//! All mutation of the synthesizer's queue and playback state happens on one
//! OS thread. Callers on other threads never touch that state; they send a
//! closure through a [`Spawner`] and the worker runs it against `&mut S`.
//!
//! Tasks run strictly in the order they were submitted and always run to
//! completion before the next one starts. A task may submit further tasks;
//! those run after everything already queued.
//!
//! Shutdown is itself a queued command, so every task submitted before
//! [`Executor::shutdown`] still runs, then the worker exits and drops `S` on
//! its own thread. Tasks submitted afterwards are rejected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use crate::error::SpeechError;

/// A unit of work run on the worker against the owned state.
pub type Task<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

enum Command<S> {
    Run(Task<S>),
    Shutdown,
}

// ── Spawner (Send + Sync submit handle) ────────────────────────────

/// Cloneable handle used to submit tasks to the worker.
pub struct Spawner<S> {
    tx: mpsc::Sender<Command<S>>,
    worker: Arc<OnceLock<ThreadId>>,
    closed: Arc<AtomicBool>,
}

impl<S> Clone for Spawner<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            worker: Arc::clone(&self.worker),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<S: 'static> Spawner<S> {
    /// Queue `task`. Returns `false` if the executor has shut down.
    pub fn submit(&self, task: impl FnOnce(&mut S) + Send + 'static) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send(Command::Run(Box::new(task))).is_ok()
    }

    /// Queue `task` and block until it has run, returning its result.
    ///
    /// Returns `None` if the executor shut down before running it. When
    /// called from the worker thread itself the task is only queued (waiting
    /// would deadlock) and `None` is returned immediately.
    pub fn submit_and_wait<R: Send + 'static>(
        &self,
        task: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Option<R> {
        if self.is_worker_thread() {
            self.submit(move |state| {
                task(state);
            });
            return None;
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        let queued = self.submit(move |state| {
            let _ = reply_tx.send(task(state));
        });
        if !queued {
            return None;
        }
        // If the worker exits first the task is dropped along with `reply_tx`.
        reply_rx.recv().ok()
    }

    /// Whether the calling thread is the worker.
    pub fn is_worker_thread(&self) -> bool {
        self.worker
            .get()
            .is_some_and(|id| *id == thread::current().id())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Receiving end of a [`channel`], consumed by [`Executor::start`].
pub struct Inbox<S> {
    rx: mpsc::Receiver<Command<S>>,
}

/// Create the submit handle before the worker exists.
///
/// The state handed to [`Executor::start`] usually needs its own spawner (to
/// queue follow-up work), so the channel is created first.
pub fn channel<S>() -> (Spawner<S>, Inbox<S>) {
    let (tx, rx) = mpsc::channel();
    let spawner = Spawner {
        tx,
        worker: Arc::new(OnceLock::new()),
        closed: Arc::new(AtomicBool::new(false)),
    };
    (spawner, Inbox { rx })
}

// ── Executor (worker owner) ────────────────────────────────────────

/// Owns the worker thread.
pub struct Executor<S> {
    spawner: Spawner<S>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Send + 'static> Executor<S> {
    /// Spawn the worker, moving `state` onto it.
    pub fn start(
        name: &str,
        spawner: Spawner<S>,
        inbox: Inbox<S>,
        state: S,
    ) -> Result<Self, SpeechError> {
        let worker_id = Arc::clone(&spawner.worker);
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let _ = worker_id.set(thread::current().id());
                Self::run(&inbox, state);
            })
            .map_err(SpeechError::ExecutorSpawn)?;
        let _ = spawner.worker.set(handle.thread().id());

        tracing::debug!(thread = name, "Executor started");
        Ok(Self {
            spawner,
            worker: Mutex::new(Some(handle)),
        })
    }

    pub const fn spawner(&self) -> &Spawner<S> {
        &self.spawner
    }

    /// Run everything already queued, stop the worker and join it.
    ///
    /// Idempotent. When called from the worker thread the join is skipped.
    pub fn shutdown(&self) {
        if self.spawner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.spawner.tx.send(Command::Shutdown);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };
        if self.spawner.is_worker_thread() {
            tracing::warn!("Executor shut down from its own worker; not joining");
            return;
        }
        if handle.join().is_err() {
            tracing::error!("Executor worker panicked");
        }
    }

    /// The worker body: recv → run → recv, until shutdown.
    fn run(inbox: &Inbox<S>, mut state: S) {
        while let Ok(command) = inbox.rx.recv() {
            match command {
                Command::Run(task) => task(&mut state),
                Command::Shutdown => break,
            }
        }
        tracing::debug!("Executor worker exiting");
    }
}

impl<S> Drop for Executor<S> {
    fn drop(&mut self) {
        // Best-effort: the worker may already be gone.
        if !self.spawner.closed.swap(true, Ordering::SeqCst) {
            let _ = self.spawner.tx.send(Command::Shutdown);
        }
        let handle = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
