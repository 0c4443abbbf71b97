//! Public call surface for front-ends.
//!
//! A [`SessionExecutor`] owns the worker thread. Every call is a job on the
//! worker's FIFO: synchronous calls block on their own reply slot,
//! asynchronous ones return at once and are answered through a
//! [`CallbackQueue`].


use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};

use ime_core::engine::Engine;
use ime_core::protocol::{
    Command, CompositionMode, Config, Input, InputFieldType, InputKind, KeyEvent, Output,
    Request, SessionCommand, StorageEntry, StorageType, TouchEvent, UsageEvent,
    UserDictionaryCommand,
};
use ime_core::settings::Settings;
use ime_core::transport::{self, Transport};
use tracing::{debug, warn};

use crate::context::{
    AsyncContext, EvaluationCallback, EvaluationContext, SyncContext, TriggeringEvent,
};
use crate::dispatcher::CallbackQueue;
use crate::error::ClientError;
use crate::worker::{self, Job, Worker};

pub struct SessionExecutor {
    jobs: mpsc::Sender<Job>,
    worker: Option<JoinHandle<()>>,
    worker_thread: ThreadId,
    callbacks: CallbackQueue,
    /// Whether `callbacks` was spawned here and must be shut down on drop.
    owns_callbacks: bool,
}

impl SessionExecutor {
    /// Start the worker and a default delivery thread. The executor is not
    /// usable until [`initialize`](Self::initialize).
    pub fn spawn(settings: &Settings) -> Result<Self, ClientError> {
        let name = &settings.worker.callback_thread_name;
        let callbacks = CallbackQueue::spawn(name).map_err(|source| ClientError::Spawn {
            name: name.clone(),
            source,
        })?;
        let mut executor = Self::with_callback_queue(settings, callbacks.clone())
            .inspect_err(|_| callbacks.shutdown())?;
        executor.owns_callbacks = true;
        Ok(executor)
    }

    /// Start the worker with `callbacks` as the default delivery queue.
    /// The queue stays the caller's to pump or shut down.
    pub fn with_callback_queue(
        settings: &Settings,
        callbacks: CallbackQueue,
    ) -> Result<Self, ClientError> {
        let name = &settings.worker.thread_name;
        let worker = Worker::new(settings.session.capabilities.clone(), callbacks.clone());
        let (jobs, handle) = worker.spawn(name).map_err(|source| ClientError::Spawn {
            name: name.clone(),
            source,
        })?;
        Ok(Self {
            jobs,
            worker_thread: handle.thread().id(),
            worker: Some(handle),
            callbacks,
            owns_callbacks: false,
        })
    }

    /// Spawn, select the transport from `settings.transport` (falling back to
    /// the engine built by `local`), and initialize.
    pub fn bootstrap<F>(settings: &Settings, local: F) -> Result<Self, ClientError>
    where
        F: FnOnce() -> Box<dyn Engine>,
    {
        let executor = Self::spawn(settings)?;
        executor.initialize(transport::select(&settings.transport, local));
        Ok(executor)
    }

    /// Install (or replace) the transport. A replaced transport's session is
    /// deleted first.
    pub fn initialize(&self, transport: Box<dyn Transport>) {
        self.enqueue(Job::Initialize(transport));
    }

    pub fn callback_queue(&self) -> &CallbackQueue {
        &self.callbacks
    }

    fn enqueue(&self, job: Job) {
        if let Err(mpsc::SendError(job)) = self.jobs.send(job) {
            warn!("worker gone; resolving job locally");
            worker::reject(job, &self.callbacks);
        }
    }

    // --- Generic evaluation ---

    /// Evaluate on the worker and block until it answers.
    pub fn evaluate_synchronously(&self, input: Input) -> Result<Command, ClientError> {
        if thread::current().id() == self.worker_thread {
            return Err(ClientError::Reentrant);
        }
        let (ctx, reply) = SyncContext::new(input);
        self.enqueue(Job::Evaluate(EvaluationContext::Synchronous(ctx)));
        reply.recv().map_err(|_| ClientError::WorkerStopped)?
    }

    pub fn evaluate_asynchronously(&self, ctx: AsyncContext) {
        debug!(command = ?ctx.input().command_type(), stamp = ctx.stamp(), "enqueue");
        self.enqueue(Job::Evaluate(EvaluationContext::Asynchronous(ctx)));
    }

    fn call(&self, input: Input, callback: Option<EvaluationCallback>) {
        let mut ctx = AsyncContext::new(input);
        ctx.callback = callback;
        self.evaluate_asynchronously(ctx);
    }

    fn command(&self, command: SessionCommand, callback: Option<EvaluationCallback>) {
        self.call(Input::send_command(command), callback);
    }

    fn output_of(&self, input: Input) -> Result<Output, ClientError> {
        self.evaluate_synchronously(input).map(|c| c.output)
    }

    // --- Key and touch input ---

    pub fn send_key(
        &self,
        key: KeyEvent,
        touch_events: Vec<TouchEvent>,
        event: Option<TriggeringEvent>,
        callback: Option<EvaluationCallback>,
    ) {
        let mut ctx = AsyncContext::new(Input::send_key(key).with_touch_events(touch_events));
        ctx.event = event;
        ctx.callback = callback;
        self.evaluate_asynchronously(ctx);
    }

    /// Hand `event` back through the callback queue without evaluating
    /// anything, after every delivery queued before it.
    pub fn pass_through(&self, event: TriggeringEvent, callback: EvaluationCallback) {
        let mut ctx = AsyncContext::new(Input::new(InputKind::NoOperation));
        ctx.event = Some(event);
        ctx.callback = Some(callback);
        self.enqueue(Job::PassThrough(ctx));
    }

    // --- Session commands ---

    pub fn submit(&self, callback: Option<EvaluationCallback>) {
        self.command(SessionCommand::Submit, callback);
    }

    pub fn submit_candidate(
        &self,
        id: i32,
        row: Option<u32>,
        callback: Option<EvaluationCallback>,
    ) {
        self.command(SessionCommand::SubmitCandidate { id, row }, callback);
    }

    pub fn switch_input_mode(&self, mode: CompositionMode, callback: Option<EvaluationCallback>) {
        self.command(SessionCommand::SwitchInputMode { mode }, callback);
    }

    pub fn reset_context(&self, callback: Option<EvaluationCallback>) {
        self.command(SessionCommand::ResetContext, callback);
    }

    pub fn move_cursor(&self, position: u32, callback: Option<EvaluationCallback>) {
        self.command(SessionCommand::MoveCursor { position }, callback);
    }

    pub fn page_next(&self, callback: Option<EvaluationCallback>) {
        self.command(SessionCommand::ConvertNextPage, callback);
    }

    pub fn page_prev(&self, callback: Option<EvaluationCallback>) {
        self.command(SessionCommand::ConvertPrevPage, callback);
    }

    pub fn switch_input_field_type(
        &self,
        field_type: InputFieldType,
        callback: Option<EvaluationCallback>,
    ) {
        self.command(SessionCommand::SwitchInputFieldType { field_type }, callback);
    }

    pub fn undo_or_rewind(&self, callback: Option<EvaluationCallback>) {
        self.command(SessionCommand::UndoOrRewind, callback);
    }

    pub fn expand_suggestion(&self, callback: Option<EvaluationCallback>) {
        self.command(SessionCommand::ExpandSuggestion, callback);
    }

    pub fn send_usage_event(&self, event: UsageEvent) {
        self.command(SessionCommand::UsageEvent { event }, None);
    }

    // --- Storage ---

    pub fn insert_to_storage(&self, entry: StorageEntry) {
        self.call(Input::new(InputKind::InsertToStorage { entry }), None);
    }

    pub fn read_all_from_storage(&self, storage: StorageType) -> Result<Output, ClientError> {
        self.output_of(Input::new(InputKind::ReadAllFromStorage { storage }))
    }

    pub fn clear_storage(&self, storage: StorageType) {
        self.call(Input::new(InputKind::ClearStorage { storage }), None);
    }

    // --- Configuration ---

    pub fn get_config(&self) -> Result<Output, ClientError> {
        self.output_of(Input::new(InputKind::GetConfig))
    }

    pub fn set_config(&self, config: Config) {
        self.call(Input::new(InputKind::SetConfig { config }), None);
    }

    pub fn set_imposed_config(&self, config: Config) {
        self.call(Input::new(InputKind::SetImposedConfig { config }), None);
    }

    pub fn send_user_dictionary_command(
        &self,
        command: UserDictionaryCommand,
    ) -> Result<Output, ClientError> {
        self.output_of(Input::new(InputKind::SendUserDictionaryCommand { command }))
    }

    // --- Maintenance ---

    pub fn reload(&self) {
        self.call(Input::new(InputKind::Reload), None);
    }

    pub fn sync_data(&self) {
        self.call(Input::new(InputKind::SyncData), None);
    }

    pub fn clear_user_history(&self) {
        self.call(Input::new(InputKind::ClearUserHistory), None);
    }

    pub fn clear_user_prediction(&self) {
        self.call(Input::new(InputKind::ClearUserPrediction), None);
    }

    pub fn clear_unused_user_prediction(&self) {
        self.call(Input::new(InputKind::ClearUnusedUserPrediction), None);
    }

    // --- Session lifecycle ---

    pub fn ensure_session(&self) {
        self.enqueue(Job::EnsureSession);
    }

    pub fn delete_session(&self) {
        self.enqueue(Job::DeleteSession);
    }

    /// Merge `request` into the negotiated request. Later calls merge over
    /// earlier ones in submission order.
    pub fn update_request(&self, request: Request, touch_events: Vec<TouchEvent>) {
        self.enqueue(Job::UpdateRequest {
            request,
            touch_events,
        });
    }

    // --- Delivery control ---

    /// Drop every pending delivery on the default queue whose call was made
    /// before now. Running evaluations are not interrupted.
    pub fn cancel_pending_evaluations(&self) {
        self.callbacks.cancel_pending();
    }

    /// Block until every job enqueued so far has been processed. Deliveries
    /// are posted by then, not necessarily invoked.
    pub fn wait_for_idle(&self) -> Result<(), ClientError> {
        if thread::current().id() == self.worker_thread {
            return Err(ClientError::Reentrant);
        }
        let (tx, rx) = mpsc::channel();
        self.enqueue(Job::Barrier(tx));
        rx.recv().map_err(|_| ClientError::WorkerStopped)
    }
}

impl Drop for SessionExecutor {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(handle) = self.worker.take() {
            if thread::current().id() == self.worker_thread {
                warn!("executor dropped on its worker thread; not joining");
            } else if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        if self.owns_callbacks {
            self.callbacks.shutdown();
        }
    }
}
