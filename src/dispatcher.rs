//! Per-consumer delivery queues.
//!
//! Squashable outputs (intermediate candidate updates) supersede each other
//! while pending; definitive ones are always delivered, in order.
//! `cancel_pending()` drops every delivery whose context was created at or
//! before the cancellation, when it reaches the head of the queue.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use ime_core::protocol::{Command, Output};
use tracing::{debug, warn};

use crate::context::{next_stamp, AsyncContext, EvaluationCallback, TriggeringEvent};

/// Intermediate, non-committing result that a newer one may replace.
pub fn is_squashable(output: &Output) -> bool {
    output.consumed
        && output
            .candidate_list
            .as_ref()
            .is_some_and(|list| !list.is_empty())
        && output.result.is_none()
        && output.deletion_range.is_none()
}

pub(crate) struct Delivery {
    command: Option<Command>,
    event: Option<TriggeringEvent>,
    callback: EvaluationCallback,
    stamp: u64,
    squashable: bool,
}

impl Delivery {
    /// `None` when the context carries no callback: nobody to deliver to.
    pub(crate) fn from_context(
        command: Option<Command>,
        event: Option<TriggeringEvent>,
        callback: Option<EvaluationCallback>,
        stamp: u64,
    ) -> Option<Self> {
        let squashable = command.as_ref().is_some_and(|c| is_squashable(&c.output));
        Some(Self {
            command,
            event,
            callback: callback?,
            stamp,
            squashable,
        })
    }

    /// Delivery of an async context without evaluating it.
    pub(crate) fn pass_through(ctx: AsyncContext) -> Option<Self> {
        Self::from_context(None, ctx.event, ctx.callback, ctx.stamp)
    }

    fn deliver(self) {
        (self.callback)(self.command, self.event);
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Delivery>,
    cancel_stamp: u64,
    closed: bool,
}

struct Shared {
    name: String,
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Next live delivery, skipping cancelled ones. Blocks when `wait` is
    /// set, until a delivery arrives or the queue is closed and drained.
    /// Cancelled deliveries are dropped after the lock is released: their
    /// callbacks and events may call back into this queue.
    fn next(&self, wait: bool) -> Option<Delivery> {
        let mut cancelled = Vec::new();
        let mut state = self.lock();
        let live = loop {
            if let Some(delivery) = state.pending.pop_front() {
                if delivery.stamp <= state.cancel_stamp {
                    cancelled.push(delivery);
                    continue;
                }
                break Some(delivery);
            }
            if !wait || state.closed {
                break None;
            }
            state = self.ready.wait(state).unwrap_or_else(|e| e.into_inner());
        };
        drop(state);

        if !cancelled.is_empty() {
            debug!(
                queue = %self.name,
                dropped = cancelled.len(),
                "cancelled deliveries dropped"
            );
        }
        live
    }
}

/// Cloneable handle to one delivery queue.
#[derive(Clone)]
pub struct CallbackQueue {
    shared: Arc<Shared>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CallbackQueue {
    fn with_name(name: &str) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.to_string(),
                state: Mutex::new(QueueState::default()),
                ready: Condvar::new(),
            }),
            thread: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue pumped by the consumer through [`dispatch_pending`](Self::dispatch_pending).
    pub fn manual(name: &str) -> Self {
        Self::with_name(name)
    }

    /// Queue with its own delivery thread.
    pub fn spawn(name: &str) -> io::Result<Self> {
        let queue = Self::with_name(name);
        let shared = Arc::clone(&queue.shared);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(delivery) = shared.next(true) {
                    delivery.deliver();
                }
                debug!(queue = %shared.name, "delivery thread stopped");
            })?;
        *queue.thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(queue)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub(crate) fn post(&self, delivery: Delivery) {
        let mut state = self.shared.lock();
        if state.closed {
            warn!(queue = %self.shared.name, "delivery posted after shutdown; dropped");
            return;
        }
        let mut superseded = VecDeque::new();
        if delivery.squashable {
            let (keep, stale): (VecDeque<_>, VecDeque<_>) =
                state.pending.drain(..).partition(|d| !d.squashable);
            state.pending = keep;
            superseded = stale;
        }
        state.pending.push_back(delivery);
        drop(state);
        self.shared.ready.notify_one();

        // Callbacks and events of superseded deliveries are dropped unlocked.
        if !superseded.is_empty() {
            debug!(
                queue = %self.shared.name,
                superseded = superseded.len(),
                "squashed pending deliveries"
            );
        }
    }

    /// Drop every delivery whose context was created before this call.
    /// Contexts created afterwards are unaffected.
    pub fn cancel_pending(&self) {
        let stamp = next_stamp();
        self.shared.lock().cancel_stamp = stamp;
        debug!(queue = %self.shared.name, stamp, "pending deliveries cancelled");
    }

    /// Deliver everything pending on the calling thread. Returns the number
    /// of callbacks invoked.
    pub fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        while let Some(delivery) = self.shared.next(false) {
            delivery.deliver();
            delivered += 1;
        }
        delivered
    }

    /// Deliveries waiting, cancelled ones included until they reach the head.
    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Refuse further posts and let the delivery thread (if any) drain and
    /// exit. Must not be called from the delivery thread itself.
    pub fn shutdown(&self) {
        self.shared.lock().closed = true;
        self.shared.ready.notify_all();
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                warn!(queue = %self.shared.name, "shutdown from the delivery thread; not joining");
                return;
            }
            if handle.join().is_err() {
                warn!(queue = %self.shared.name, "delivery thread panicked");
            }
        }
    }
}
