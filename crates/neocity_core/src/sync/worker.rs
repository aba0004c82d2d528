//! # Transform Worker Supervision
//!
//! Runs a [`TransformWorker`] on its own thread, feeds it step requests over
//! a bounded channel and restarts it when it crashes.
//!
//! ```text
//!  main thread                           worker thread
//!  ───────────                           ─────────────
//!  spawn ──────── Init ────────────────►  init()
//!        ◄─────── Ready ────────────────
//!  request_step ─ Step ────────────────►  step() writes inactive page
//!        ◄─────── SwapNotify ───────────  swap_page()
//!        ◄─────── Result ───────────────
//!  terminate ──── Terminate ───────────►  exit
//! ```
//!
//! A worker that panics or exits on its own is restarted after
//! `restart_backoff_ms`, up to `max_restarts` times. After that it is marked
//! terminated and step requests are refused.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;

use super::transform_bridge::{BridgeWriter, TransformBridge};
use crate::config::WorkerConfig;
use crate::error::{CoreError, CoreResult};

/// Messages exchanged with the worker thread.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerMessage {
    /// Prepare for `capacity` entity slots.
    Init {
        /// Bridge capacity.
        capacity: usize,
    },
    /// Run one step.
    Step {
        /// Step size in seconds.
        dt: f32,
        /// Frame the step belongs to.
        frame: u64,
    },
    /// A step finished and its page was published.
    Result {
        /// Frame of the step.
        frame: u64,
        /// Entities written.
        published: u32,
    },
    /// The worker reported a recoverable error.
    Error(String),
    /// Stop the worker thread.
    Terminate,
    /// Initialization finished.
    Ready,
    /// The worker flipped the active bridge page.
    SwapNotify {
        /// Page now active.
        active_page: usize,
    },
}

/// A message plus the moment it was sent.
#[derive(Clone, Debug)]
pub struct WorkerEnvelope {
    /// Payload.
    pub message: WorkerMessage,
    /// Send time.
    pub timestamp: Instant,
}

impl WorkerEnvelope {
    /// Stamps a message with the current time.
    #[must_use]
    pub fn new(message: WorkerMessage) -> Self {
        Self {
            message,
            timestamp: Instant::now(),
        }
    }
}

/// Work run on the worker thread.
pub trait TransformWorker: Send {
    /// Called once per (re)start before any step.
    ///
    /// # Errors
    ///
    /// An error stops the thread, which counts as a crash.
    fn init(&mut self, _capacity: usize) -> CoreResult<()> {
        Ok(())
    }

    /// Writes transforms for one step into the inactive bridge page.
    ///
    /// The page is swapped after this returns `Ok`. Returns the number of
    /// entities written.
    ///
    /// # Errors
    ///
    /// An error is reported back and the page is not swapped.
    fn step(&mut self, dt: f32, frame: u64, writer: &mut BridgeWriter) -> CoreResult<u32>;
}

/// Lifecycle state of a supervised worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned, waiting for `Ready`.
    Starting,
    /// Idle, accepting a step.
    Ready,
    /// Running a step.
    Busy,
    /// Crashed, waiting out the backoff.
    Restarting,
    /// Stopped for good.
    Terminated,
}

/// Counters shared with the worker thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Steps that completed and published a page.
    pub steps_completed: u64,
    /// Steps that returned an error.
    pub step_errors: u64,
    /// Restarts after crashes.
    pub restarts: u32,
    /// Duration of the last completed step, microseconds.
    pub last_step_micros: u64,
}

/// Factory for fresh worker instances, called on every (re)start.
pub type WorkerFactory = Box<dyn FnMut() -> Box<dyn TransformWorker>>;

/// Boxes a closure that builds concrete workers into a [`WorkerFactory`].
pub fn worker_factory<W, F>(mut make: F) -> WorkerFactory
where
    W: TransformWorker + 'static,
    F: FnMut() -> W + 'static,
{
    Box::new(move || -> Box<dyn TransformWorker> { Box::new(make()) })
}

struct WorkerLink {
    commands: Sender<WorkerEnvelope>,
    events: Receiver<WorkerEnvelope>,
    handle: JoinHandle<()>,
}

/// Owns the worker thread and its restart policy.
pub struct WorkerSupervisor {
    config: WorkerConfig,
    bridge: Arc<TransformBridge>,
    factory: WorkerFactory,
    link: Option<WorkerLink>,
    state: WorkerState,
    restart_at: Option<Instant>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerSupervisor {
    /// Spawns the first worker and sends it `Init`.
    ///
    /// The supervisor holds the bridge writer role for as long as a worker
    /// thread is alive.
    ///
    /// # Errors
    ///
    /// Fails if the bridge writer role is taken or the thread cannot be
    /// spawned.
    pub fn spawn(
        config: WorkerConfig,
        bridge: Arc<TransformBridge>,
        factory: WorkerFactory,
    ) -> CoreResult<Self> {
        let mut supervisor = Self {
            config,
            bridge,
            factory,
            link: None,
            state: WorkerState::Starting,
            restart_at: None,
            stats: Arc::new(Mutex::new(WorkerStats::default())),
        };
        supervisor.start()?;
        Ok(supervisor)
    }

    fn start(&mut self) -> CoreResult<()> {
        let writer = self.bridge.writer()?;
        let worker = (self.factory)();
        let (command_tx, command_rx) = bounded(self.config.channel_capacity);
        let (event_tx, event_rx) = bounded(self.config.channel_capacity);
        let stats = Arc::clone(&self.stats);

        let handle = thread::Builder::new()
            .name("neocity-transform-worker".to_string())
            .spawn(move || run_worker(worker, writer, &command_rx, &event_tx, &stats))
            .map_err(|e| CoreError::WorkerFailed(format!("failed to spawn worker thread: {e}")))?;

        command_tx
            .send(WorkerEnvelope::new(WorkerMessage::Init {
                capacity: self.bridge.capacity(),
            }))
            .map_err(|_| CoreError::WorkerDisconnected)?;

        self.link = Some(WorkerLink {
            commands: command_tx,
            events: event_rx,
            handle,
        });
        self.state = WorkerState::Starting;
        self.restart_at = None;
        tracing::info!(
            restarts = self.stats.lock().restarts,
            capacity = self.bridge.capacity(),
            "transform worker started"
        );
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> WorkerState {
        self.state
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        *self.stats.lock()
    }

    /// Asks the worker to run one step.
    ///
    /// # Errors
    ///
    /// - [`CoreError::WorkerUnavailable`] once the worker is terminated
    /// - [`CoreError::WorkerBusy`] while it is starting, restarting or
    ///   stepping
    /// - [`CoreError::WorkerDisconnected`] if the thread is gone; the next
    ///   poll handles the crash
    pub fn request_step(&mut self, dt: f32, frame: u64) -> CoreResult<()> {
        match self.state {
            WorkerState::Terminated => return Err(CoreError::WorkerUnavailable),
            WorkerState::Ready => {}
            _ => return Err(CoreError::WorkerBusy),
        }
        let Some(link) = &self.link else {
            return Err(CoreError::WorkerDisconnected);
        };
        match link
            .commands
            .try_send(WorkerEnvelope::new(WorkerMessage::Step { dt, frame }))
        {
            Ok(()) => {
                self.state = WorkerState::Busy;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(CoreError::WorkerBusy),
            Err(TrySendError::Disconnected(_)) => Err(CoreError::WorkerDisconnected),
        }
    }

    /// Handles at most one pending message without blocking.
    ///
    /// Also restarts a crashed worker once its backoff has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WorkerFailed`] when a crash exhausts the restart
    /// budget.
    pub fn poll(&mut self) -> CoreResult<Option<WorkerMessage>> {
        match self.state {
            WorkerState::Terminated => return Ok(None),
            WorkerState::Restarting => {
                if self.restart_at.is_some_and(|at| Instant::now() >= at) {
                    self.start()?;
                }
                return Ok(None);
            }
            _ => {}
        }

        let received = match &self.link {
            Some(link) => link.events.try_recv(),
            None => return Ok(None),
        };
        match received {
            Ok(envelope) => Ok(Some(self.handle(envelope))),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => self.on_crash().map(|()| None),
        }
    }

    /// Like [`poll`](Self::poll), but waits up to `timeout` for a message,
    /// sitting out a restart backoff if one is pending.
    ///
    /// # Errors
    ///
    /// Same as [`poll`](Self::poll).
    pub fn poll_timeout(&mut self, timeout: Duration) -> CoreResult<Option<WorkerMessage>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.poll()? {
                return Ok(Some(message));
            }
            let now = Instant::now();
            if self.state == WorkerState::Terminated || now >= deadline {
                return Ok(None);
            }

            if self.state == WorkerState::Restarting {
                let wake = self.restart_at.map_or(deadline, |at| at.min(deadline));
                thread::sleep(wake.saturating_duration_since(now));
                continue;
            }

            let received = match &self.link {
                Some(link) => link.events.recv_timeout(deadline - now),
                None => return Ok(None),
            };
            match received {
                Ok(envelope) => return Ok(Some(self.handle(envelope))),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                // The next poll sees the disconnect and handles the crash
                Err(RecvTimeoutError::Disconnected) => {}
            }
        }
    }

    fn handle(&mut self, envelope: WorkerEnvelope) -> WorkerMessage {
        match &envelope.message {
            WorkerMessage::Ready | WorkerMessage::Result { .. } => {
                self.state = WorkerState::Ready;
            }
            WorkerMessage::Error(reason) => {
                tracing::warn!(reason = reason.as_str(), "transform worker reported an error");
                if self.state == WorkerState::Busy {
                    self.state = WorkerState::Ready;
                }
            }
            _ => {}
        }
        envelope.message
    }

    fn on_crash(&mut self) -> CoreResult<()> {
        let reason = match self.link.take() {
            Some(link) => match link.handle.join() {
                Ok(()) => "worker thread exited".to_string(),
                Err(payload) => panic_reason(payload.as_ref()),
            },
            None => "worker link missing".to_string(),
        };

        let restarts = self.stats.lock().restarts;
        if restarts >= self.config.max_restarts {
            self.state = WorkerState::Terminated;
            tracing::error!(
                reason = reason.as_str(),
                restarts,
                "transform worker crashed, restart budget exhausted"
            );
            return Err(CoreError::WorkerFailed(reason));
        }

        self.stats.lock().restarts += 1;
        self.state = WorkerState::Restarting;
        self.restart_at =
            Some(Instant::now() + Duration::from_millis(self.config.restart_backoff_ms));
        tracing::warn!(
            reason = reason.as_str(),
            attempt = restarts + 1,
            max = self.config.max_restarts,
            "transform worker crashed, restarting"
        );
        Ok(())
    }

    /// Stops the worker thread and waits for it to exit.
    pub fn terminate(&mut self) {
        if let Some(WorkerLink {
            commands,
            events,
            handle,
        }) = self.link.take()
        {
            // A full or closed channel means the thread is stuck or gone;
            // dropping the sender below disconnects it either way.
            let _ = commands.try_send(WorkerEnvelope::new(WorkerMessage::Terminate));
            drop(commands);
            // The worker may be blocked sending into a full event channel;
            // closing the receiver makes that send fail so the thread exits.
            drop(events);
            let _ = handle.join();
        }
        if self.state != WorkerState::Terminated {
            self.state = WorkerState::Terminated;
            tracing::info!("transform worker terminated");
        }
    }
}

impl Drop for WorkerSupervisor {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Worker thread body. Returning (or unwinding) drops the writer and the
/// event sender, which the supervisor observes as a disconnect.
fn run_worker(
    mut worker: Box<dyn TransformWorker>,
    mut writer: BridgeWriter,
    commands: &Receiver<WorkerEnvelope>,
    events: &Sender<WorkerEnvelope>,
    stats: &Mutex<WorkerStats>,
) {
    let reply = |message: WorkerMessage| events.send(WorkerEnvelope::new(message)).is_ok();

    while let Ok(envelope) = commands.recv() {
        match envelope.message {
            WorkerMessage::Init { capacity } => {
                if let Err(e) = worker.init(capacity) {
                    reply(WorkerMessage::Error(e.to_string()));
                    return;
                }
                if !reply(WorkerMessage::Ready) {
                    return;
                }
            }
            WorkerMessage::Step { dt, frame } => {
                let started = Instant::now();
                match worker.step(dt, frame, &mut writer) {
                    Ok(published) => {
                        let active_page = writer.swap_page();
                        {
                            let mut s = stats.lock();
                            s.steps_completed += 1;
                            s.last_step_micros =
                                u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
                        }
                        if !reply(WorkerMessage::SwapNotify { active_page })
                            || !reply(WorkerMessage::Result { frame, published })
                        {
                            return;
                        }
                    }
                    Err(e) => {
                        stats.lock().step_errors += 1;
                        if !reply(WorkerMessage::Error(e.to_string())) {
                            return;
                        }
                    }
                }
            }
            WorkerMessage::Terminate => return,
            _ => {}
        }
    }
}
