//! Value objects describing one pending call and where its result goes.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use ime_core::protocol::{Command, Input};

use crate::dispatcher::CallbackQueue;
use crate::error::ClientError;

/// The key or touch event that caused an evaluation. Handed back to the
/// callback untouched.
pub type TriggeringEvent = Box<dyn Any + Send>;

/// Invoked once with the evaluated command, or `None` when the call failed
/// (or, for pass-through, when there was nothing to evaluate).
pub type EvaluationCallback = Box<dyn FnOnce(Option<Command>, Option<TriggeringEvent>) + Send>;

pub(crate) type SyncReply = Result<Command, ClientError>;

static STAMPS: AtomicU64 = AtomicU64::new(0);

/// Process-wide monotonic sequence shared by context creation and
/// cancellation, so the two can be ordered.
pub(crate) fn next_stamp() -> u64 {
    STAMPS.fetch_add(1, Ordering::SeqCst) + 1
}

pub enum EvaluationContext {
    Synchronous(SyncContext),
    Asynchronous(AsyncContext),
}

pub struct SyncContext {
    pub(crate) input: Input,
    pub(crate) reply: mpsc::SyncSender<SyncReply>,
}

impl SyncContext {
    /// The receiver is the caller's result slot; the worker fills it once.
    pub(crate) fn new(input: Input) -> (Self, mpsc::Receiver<SyncReply>) {
        let (reply, rx) = mpsc::sync_channel(1);
        (Self { input, reply }, rx)
    }
}

pub struct AsyncContext {
    pub(crate) input: Input,
    pub(crate) event: Option<TriggeringEvent>,
    pub(crate) callback: Option<EvaluationCallback>,
    pub(crate) queue: Option<CallbackQueue>,
    pub(crate) stamp: u64,
}

impl AsyncContext {
    pub fn new(input: Input) -> Self {
        Self {
            input,
            event: None,
            callback: None,
            queue: None,
            stamp: next_stamp(),
        }
    }

    pub fn with_event(mut self, event: impl Any + Send) -> Self {
        self.event = Some(Box::new(event));
        self
    }

    pub fn with_callback(
        mut self,
        callback: impl FnOnce(Option<Command>, Option<TriggeringEvent>) + Send + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Deliver on `queue` instead of the executor's default queue.
    pub fn on_queue(mut self, queue: CallbackQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// The input stays editable until the worker picks the context up.
    pub fn input_mut(&mut self) -> &mut Input {
        &mut self.input
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }
}

impl fmt::Debug for AsyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncContext")
            .field("input", &self.input)
            .field("has_event", &self.event.is_some())
            .field("has_callback", &self.callback.is_some())
            .field("stamp", &self.stamp)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ime_core::protocol::{InputKind, KeyEvent};

    use super::*;

    #[test]
    fn test_stamps_increase() {
        let a = AsyncContext::new(Input::new(InputKind::NoOperation));
        let b = AsyncContext::new(Input::new(InputKind::NoOperation));
        assert!(b.stamp() > a.stamp());
        assert!(next_stamp() > b.stamp());
    }

    #[test]
    fn test_input_editable_before_dispatch() {
        let mut ctx = AsyncContext::new(Input::send_key(KeyEvent::character('a')));
        ctx.input_mut().kind = InputKind::SendKey {
            key: KeyEvent::character('b'),
        };
        assert_eq!(
            ctx.input().kind,
            InputKind::SendKey {
                key: KeyEvent::character('b')
            }
        );
    }

    #[test]
    fn test_sync_slot_filled_once() {
        let (ctx, rx) = SyncContext::new(Input::new(InputKind::GetConfig));
        ctx.reply.send(Err(ClientError::NotInitialized)).unwrap();
        drop(ctx);
        assert!(matches!(rx.recv(), Ok(Err(ClientError::NotInitialized))));
        assert!(rx.recv().is_err());
    }
}
