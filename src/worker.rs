use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use ime_core::protocol::{Capability, Command, Input, Request, TouchEvent};
use ime_core::transport::Transport;
use ime_session::SessionManager;
use tracing::{debug, info, warn};

use crate::context::{AsyncContext, EvaluationContext};
use crate::dispatcher::{CallbackQueue, Delivery};
use crate::error::ClientError;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

pub(crate) enum Job {
    Initialize(Box<dyn Transport>),
    EnsureSession,
    UpdateRequest {
        request: Request,
        touch_events: Vec<TouchEvent>,
    },
    DeleteSession,
    Evaluate(EvaluationContext),
    PassThrough(AsyncContext),
    /// Answered once every job queued before it has been processed.
    Barrier(mpsc::Sender<()>),
    Shutdown,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// State owned by the worker thread. Nothing else touches the session.
pub(crate) struct Worker {
    session: Option<SessionManager>,
    capabilities: Vec<Capability>,
    /// Request diffs received before `Initialize`, applied on it.
    early_request: Request,
    callbacks: CallbackQueue,
}

impl Worker {
    pub fn new(capabilities: Vec<Capability>, callbacks: CallbackQueue) -> Self {
        Self {
            session: None,
            capabilities,
            early_request: Request::default(),
            callbacks,
        }
    }

    pub fn spawn(self, name: &str) -> io::Result<(mpsc::Sender<Job>, JoinHandle<()>)> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || self.run(rx))?;
        Ok((tx, handle))
    }

    fn run(mut self, rx: mpsc::Receiver<Job>) {
        info!("worker started");
        while let Ok(job) = rx.recv() {
            if !self.handle(job) {
                break;
            }
        }
        // Anything queued after Shutdown still resolves.
        while let Ok(job) = rx.try_recv() {
            reject(job, &self.callbacks);
        }
        if let Some(session) = self.session.as_mut() {
            let _ = session.delete_session();
        }
        info!("worker stopped");
    }

    /// Returns false on `Shutdown`.
    fn handle(&mut self, job: Job) -> bool {
        match job {
            Job::Initialize(transport) => self.initialize(transport),
            Job::EnsureSession => match self.session.as_mut() {
                Some(session) => {
                    if let Err(e) = session.ensure_session() {
                        warn!(error = %e, "ensure_session failed");
                    }
                }
                None => warn!("ensure_session before initialize; ignored"),
            },
            Job::UpdateRequest {
                request,
                touch_events,
            } => match self.session.as_mut() {
                Some(session) => {
                    if let Err(e) = session.update_request(&request, touch_events) {
                        warn!(error = %e, "update_request failed");
                    }
                }
                None => self.early_request.merge_from(&request),
            },
            Job::DeleteSession => {
                if let Some(session) = self.session.as_mut() {
                    let _ = session.delete_session();
                }
            }
            Job::Evaluate(EvaluationContext::Synchronous(ctx)) => {
                let result = self.evaluate(ctx.input);
                // The caller may have given up waiting.
                let _ = ctx.reply.send(result);
            }
            Job::Evaluate(EvaluationContext::Asynchronous(ctx)) => {
                let AsyncContext {
                    input,
                    event,
                    callback,
                    queue,
                    stamp,
                } = ctx;
                let command = match self.evaluate(input) {
                    Ok(command) => Some(command),
                    Err(e) => {
                        warn!(error = %e, "asynchronous evaluation failed");
                        None
                    }
                };
                if let Some(delivery) = Delivery::from_context(command, event, callback, stamp) {
                    queue.as_ref().unwrap_or(&self.callbacks).post(delivery);
                }
            }
            Job::PassThrough(ctx) => {
                let queue = ctx.queue.clone();
                if let Some(delivery) = Delivery::pass_through(ctx) {
                    queue.as_ref().unwrap_or(&self.callbacks).post(delivery);
                }
            }
            Job::Barrier(tx) => {
                let _ = tx.send(());
            }
            Job::Shutdown => return false,
        }
        true
    }

    fn initialize(&mut self, transport: Box<dyn Transport>) {
        match self.session.as_mut() {
            Some(session) => session.replace_transport(transport),
            None => {
                let mut session = SessionManager::new(transport, self.capabilities.clone());
                let early = std::mem::take(&mut self.early_request);
                // No session yet: this only stores the baseline.
                let _ = session.update_request(&early, Vec::new());
                self.session = Some(session);
            }
        }
        debug!(
            transport = ?self.session.as_ref().map(SessionManager::transport_kind),
            "worker initialized"
        );
    }

    fn evaluate(&mut self, input: Input) -> Result<Command, ClientError> {
        let session = self.session.as_mut().ok_or(ClientError::NotInitialized)?;
        Ok(session.evaluate(input)?)
    }
}

/// Resolve a job the worker will never run: synchronous callers get
/// `WorkerStopped`, asynchronous callbacks get `None`.
pub(crate) fn reject(job: Job, callbacks: &CallbackQueue) {
    match job {
        Job::Evaluate(EvaluationContext::Synchronous(ctx)) => {
            let _ = ctx.reply.send(Err(ClientError::WorkerStopped));
        }
        Job::Evaluate(EvaluationContext::Asynchronous(ctx)) | Job::PassThrough(ctx) => {
            let queue = ctx.queue.clone();
            if let Some(delivery) = Delivery::pass_through(ctx) {
                queue.as_ref().unwrap_or(callbacks).post(delivery);
            }
        }
        Job::Barrier(tx) => {
            let _ = tx.send(());
        }
        Job::Initialize(_)
        | Job::EnsureSession
        | Job::UpdateRequest { .. }
        | Job::DeleteSession
        | Job::Shutdown => {}
    }
}
