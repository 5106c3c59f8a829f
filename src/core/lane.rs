//! Serial processing lanes
//!
//! A lane is one worker thread draining a FIFO queue of jobs. The dispatcher
//! owns a single ordering lane whose state is the sink registry; every sink is
//! attached to a [`Lane`] whose state is the table of sinks living on it.
//! State never leaves its worker thread, so jobs mutate it without locking.

use super::{
    error::{LoggerError, Result},
    log_record::LogRecord,
    metrics::DispatcherMetrics,
    sink::{Sink, SinkId},
};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

thread_local! {
    static ON_LANE: Cell<bool> = const { Cell::new(false) };
}

/// Whether the calling thread is the worker of any lane
pub(crate) fn on_lane() -> bool {
    ON_LANE.with(Cell::get)
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

pub(crate) type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Job<S>),
    Stop,
}

/// Producer side of a worker thread that owns a value of type `S`
pub(crate) struct SerialQueue<S> {
    name: Arc<str>,
    sender: Sender<Message<S>>,
    worker: ThreadId,
}

impl<S> Clone for SerialQueue<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            sender: self.sender.clone(),
            worker: self.worker,
        }
    }
}

impl<S: Send + 'static> SerialQueue<S> {
    /// Spawn the worker. `capacity` bounds the queue; `None` is unbounded.
    pub(crate) fn spawn(
        name: &str,
        state: S,
        capacity: Option<usize>,
    ) -> Result<(Self, JoinHandle<()>)> {
        let (sender, receiver) = match capacity {
            Some(cap) => bounded(cap),
            None => unbounded(),
        };
        let name: Arc<str> = Arc::from(name);
        let worker_name = Arc::clone(&name);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || Self::run(&worker_name, state, receiver))
            .map_err(|e| LoggerError::io_operation("spawning lane", name.to_string(), e))?;

        let worker = handle.thread().id();
        Ok((
            Self {
                name,
                sender,
                worker,
            },
            handle,
        ))
    }

    fn run(name: &str, mut state: S, receiver: Receiver<Message<S>>) {
        ON_LANE.with(|flag| flag.set(true));

        while let Ok(message) = receiver.recv() {
            let job = match message {
                Message::Run(job) => job,
                Message::Stop => break,
            };

            // Jobs isolate their own panics; this only catches what escapes them
            if let Err(panic_info) = catch_unwind(AssertUnwindSafe(|| job(&mut state))) {
                eprintln!(
                    "[LOGGER CRITICAL] Job on lane '{}' panicked: {}. Lane continues.",
                    name,
                    panic_message(panic_info.as_ref())
                );
            }
        }

        // Discard jobs queued behind a stop request so their completions release
        while receiver.try_recv().is_ok() {}
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_current(&self) -> bool {
        thread::current().id() == self.worker
    }

    /// Queue a job; returns `true` when the caller had to wait for space.
    pub(crate) fn push(&self, job: Job<S>) -> Result<bool> {
        match self.sender.try_send(Message::Run(job)) {
            Ok(()) => Ok(false),
            Err(TrySendError::Full(message)) => self
                .sender
                .send(message)
                .map(|()| true)
                .map_err(|_| LoggerError::lane_closed(self.name())),
            Err(TrySendError::Disconnected(_)) => Err(LoggerError::lane_closed(self.name())),
        }
    }

    /// Ask the worker to exit once the jobs queued before this call have run
    pub(crate) fn stop(&self) {
        let _ = self.sender.send(Message::Stop);
    }
}

/// Join barrier for work fanned out across lanes.
///
/// Every clone of the [`Completion`] travels with one unit of work; the paired
/// [`Waiter`] unblocks once all clones have been dropped, whether the work ran,
/// panicked or was discarded with its queue.
#[derive(Clone)]
pub(crate) struct Completion {
    _guard: Sender<()>,
}

pub(crate) struct Waiter {
    receiver: Receiver<()>,
}

pub(crate) fn completion() -> (Completion, Waiter) {
    let (sender, receiver) = bounded(0);
    (Completion { _guard: sender }, Waiter { receiver })
}

impl Waiter {
    pub(crate) fn wait(self) {
        let _ = self.receiver.recv();
    }

    /// Returns `false` if the work was still outstanding after `timeout`
    pub(crate) fn wait_timeout(self, timeout: Duration) -> bool {
        !matches!(
            self.receiver.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

pub(crate) type SinkTable = HashMap<SinkId, Box<dyn Sink>>;

/// Serial lane that sinks are attached to.
///
/// Cloning shares the lane: sinks returning clones of the same lane from
/// [`Sink::lane`] never run concurrently with each other. The worker thread
/// exits once every clone and every sink attached to it are gone.
#[derive(Clone)]
pub struct Lane {
    queue: SerialQueue<SinkTable>,
}

impl Lane {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        // Detached: the worker drains its queue and exits when all senders drop
        let (queue, _handle) = SerialQueue::spawn(&name, SinkTable::new(), None)?;
        Ok(Self { queue })
    }

    pub fn name(&self) -> &str {
        self.queue.name()
    }

    /// Whether the calling thread is this lane's worker
    pub fn is_current(&self) -> bool {
        self.queue.is_current()
    }

    pub(crate) fn execute(&self, job: impl FnOnce(&mut SinkTable) + Send + 'static) -> Result<()> {
        self.queue.push(Box::new(job)).map(|_| ())
    }

    /// Install `sink` and run its attach hooks
    pub(crate) fn attach(&self, id: SinkId, mut sink: Box<dyn Sink>, metrics: Arc<DispatcherMetrics>) {
        let lane = self.name().to_string();
        let result = self.execute(move |table| {
            let hooks = catch_unwind(AssertUnwindSafe(|| {
                sink.on_attach();
                if let Some(formatter) = sink.formatter() {
                    formatter.did_attach(sink.name());
                }
            }));
            if let Err(panic_info) = hooks {
                metrics.record_sink_panic();
                eprintln!(
                    "[LOGGER CRITICAL] Sink '{}' panicked while attaching: {}",
                    sink.name(),
                    panic_message(panic_info.as_ref())
                );
            }
            table.insert(id, sink);
        });
        if let Err(e) = result {
            eprintln!("[LOGGER ERROR] Cannot attach sink {} to lane '{}': {}", id, lane, e);
        }
    }

    /// Hand `record` to one sink. `done` is released when processing ends.
    pub(crate) fn deliver(
        &self,
        id: SinkId,
        record: Arc<LogRecord>,
        done: Option<Completion>,
        metrics: &Arc<DispatcherMetrics>,
    ) {
        let metrics = Arc::clone(metrics);
        let result = self.execute(move |table| {
            let _done = done;
            let Some(sink) = table.get_mut(&id) else {
                return;
            };

            match catch_unwind(AssertUnwindSafe(|| sink.process(&record))) {
                Ok(Ok(())) => {
                    metrics.record_delivered();
                }
                Ok(Err(e)) => {
                    metrics.record_sink_error();
                    eprintln!("[LOGGER ERROR] Sink '{}' failed: {}", sink.name(), e);
                }
                Err(panic_info) => {
                    metrics.record_sink_panic();
                    eprintln!(
                        "[LOGGER CRITICAL] Sink '{}' panicked: {}. \
                         Other sinks continue to function.",
                        sink.name(),
                        panic_message(panic_info.as_ref())
                    );
                }
            }
        });
        if let Err(e) = result {
            eprintln!("[LOGGER ERROR] Dropping record for sink {}: {}", id, e);
        }
    }

    /// Flush one sink, reporting failures on `errors` when given
    pub(crate) fn flush(
        &self,
        id: SinkId,
        done: Completion,
        errors: Option<Sender<LoggerError>>,
        metrics: &Arc<DispatcherMetrics>,
    ) {
        let metrics = Arc::clone(metrics);
        let result = self.execute(move |table| {
            let _done = done;
            let Some(sink) = table.get_mut(&id) else {
                return;
            };

            let failure = match catch_unwind(AssertUnwindSafe(|| sink.flush())) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(panic_info) => {
                    metrics.record_sink_panic();
                    Some(LoggerError::sink(
                        sink.name(),
                        format!("panicked during flush: {}", panic_message(panic_info.as_ref())),
                    ))
                }
            };

            if let Some(e) = failure {
                metrics.record_sink_error();
                eprintln!("[LOGGER ERROR] Sink '{}' flush failed: {}", sink.name(), e);
                if let Some(errors) = errors {
                    let _ = errors.send(e);
                }
            }
        });
        if let Err(e) = result {
            eprintln!("[LOGGER ERROR] Cannot flush sink {}: {}", id, e);
        }
    }

    /// Remove the sink from the lane, running detach hooks before dropping it.
    ///
    /// `detached` receives the id once the sink is gone.
    pub(crate) fn detach(
        &self,
        id: SinkId,
        done: Option<Completion>,
        detached: Option<Sender<SinkId>>,
    ) {
        let result = self.execute(move |table| {
            let _done = done;
            if let Some(mut sink) = table.remove(&id) {
                let hooks = catch_unwind(AssertUnwindSafe(|| {
                    if let Some(formatter) = sink.formatter() {
                        formatter.will_detach(sink.name());
                    }
                    sink.on_detach();
                }));
                if let Err(panic_info) = hooks {
                    eprintln!(
                        "[LOGGER CRITICAL] Sink '{}' panicked while detaching: {}",
                        sink.name(),
                        panic_message(panic_info.as_ref())
                    );
                }
            }
            if let Some(detached) = detached {
                let _ = detached.send(id);
            }
        });
        if let Err(e) = result {
            eprintln!("[LOGGER ERROR] Cannot detach sink {}: {}", id, e);
        }
    }

    /// Release `done` once everything queued on the lane so far has run
    pub(crate) fn barrier(&self, done: Completion) {
        if let Err(e) = self.execute(move |_| drop(done)) {
            eprintln!("[LOGGER ERROR] Cannot queue barrier on lane '{}': {}", self.name(), e);
        }
    }
}

impl fmt::Debug for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lane").field("name", &self.name()).finish()
    }
}
