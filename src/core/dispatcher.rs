//! Record dispatcher
//!
//! Every operation (submit, add, remove, flush) becomes a job on one ordering
//! lane. That lane owns the sink registry and fans each record out to the
//! lanes of the sinks whose mask matches, so all sinks see records in the same
//! order while draining independently of each other.

use super::{
    config::DispatcherConfig,
    error::{LoggerError, Result},
    lane::{self, completion, Completion, Lane, SerialQueue},
    level_registry::LevelRegistry,
    log_level::{LogFlag, LogLevel},
    log_record::{LogRecord, Tag},
    metrics::DispatcherMetrics,
    sink::{Sink, SinkHandle, SinkId, SinkInfo},
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default shutdown timeout (5 seconds)
///
/// Used when the dispatcher is dropped without an explicit
/// [`Dispatcher::shutdown`].
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct SinkEntry {
    id: SinkId,
    name: Arc<str>,
    level: LogLevel,
    lane: Lane,
}

/// Settles one submission in the metrics: accepted when the ordering lane
/// fans it out, rejected if the job is dropped without running.
struct Admission {
    metrics: Arc<DispatcherMetrics>,
    settled: bool,
}

impl Admission {
    fn new(metrics: &Arc<DispatcherMetrics>) -> Self {
        Self {
            metrics: Arc::clone(metrics),
            settled: false,
        }
    }

    fn accept(mut self) {
        self.settled = true;
        self.metrics.record_submitted();
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if !self.settled {
            self.metrics.record_rejected();
        }
    }
}

/// Ordering-lane state. Only ever touched by ordering-lane jobs.
struct Registry {
    entries: Vec<SinkEntry>,
    /// Removed sinks whose detach job has not run on their lane yet
    detaching: Vec<(SinkId, Lane)>,
    detached_tx: Sender<SinkId>,
    detached_rx: Receiver<SinkId>,
    closed: bool,
    metrics: Arc<DispatcherMetrics>,
}

impl Registry {
    fn new(metrics: Arc<DispatcherMetrics>) -> Self {
        let (detached_tx, detached_rx) = unbounded();
        Self {
            entries: Vec::new(),
            detaching: Vec::new(),
            detached_tx,
            detached_rx,
            closed: false,
            metrics,
        }
    }

    fn fan_out(&self, record: &Arc<LogRecord>, done: Option<&Completion>, admission: Admission) {
        if self.closed {
            eprintln!(
                "[LOGGER WARNING] Record submitted during shutdown was discarded: {}",
                record.message
            );
            return;
        }
        admission.accept();

        for entry in &self.entries {
            if entry.level.allows(record.flag) {
                entry
                    .lane
                    .deliver(entry.id, Arc::clone(record), done.cloned(), &self.metrics);
            }
        }
    }

    fn attach(&mut self, entry: SinkEntry, sink: Box<dyn Sink>) {
        entry.lane.attach(entry.id, sink, Arc::clone(&self.metrics));
        self.entries.push(entry);
    }

    fn prune_detached(&mut self) {
        while let Ok(id) = self.detached_rx.try_recv() {
            self.detaching.retain(|(pending, _)| *pending != id);
        }
    }

    fn retire(&mut self, entry: SinkEntry, done: Option<&Completion>) {
        entry
            .lane
            .detach(entry.id, done.cloned(), Some(self.detached_tx.clone()));
        self.detaching.push((entry.id, entry.lane));
    }

    fn detach(&mut self, id: SinkId, done: Option<&Completion>) {
        self.prune_detached();
        if let Some(pos) = self.entries.iter().position(|entry| entry.id == id) {
            let entry = self.entries.remove(pos);
            self.retire(entry, done);
        }
    }

    fn detach_all(&mut self, done: Option<&Completion>) {
        self.prune_detached();
        let entries: Vec<_> = self.entries.drain(..).collect();
        for entry in entries {
            self.retire(entry, done);
        }
    }

    /// Stop accepting records; later fan-outs count as rejected
    fn close(&mut self) {
        self.closed = true;
    }

    /// Flush every registered sink, and wait out sinks still being removed
    /// since records routed to them before removal must finish too.
    fn flush_all(&mut self, done: &Completion, errors: Option<&Sender<LoggerError>>) {
        self.prune_detached();
        for entry in &self.entries {
            entry
                .lane
                .flush(entry.id, done.clone(), errors.cloned(), &self.metrics);
        }
        for (_, lane) in &self.detaching {
            lane.barrier(done.clone());
        }
    }

    fn snapshot(&self) -> Vec<SinkInfo> {
        self.entries
            .iter()
            .map(|entry| SinkInfo {
                id: entry.id,
                name: entry.name.to_string(),
                level: entry.level,
                lane: entry.lane.name().to_string(),
            })
            .collect()
    }
}

/// Fans log records out to registered sinks.
///
/// Create one per process at startup and share it (`Arc<Dispatcher>`) with the
/// code that logs. Dropping it flushes every sink.
///
/// # Example
///
/// ```
/// use rust_log_dispatch::prelude::*;
///
/// let dispatcher = Dispatcher::new().unwrap();
/// let memory = MemorySink::new("memory");
/// let lines = memory.lines();
/// dispatcher.add_sink(memory, LogLevel::ALL).unwrap();
///
/// dispatcher.submit(true, LogRecord::builder(LogFlag::INFO, "ready").build());
/// assert_eq!(lines.snapshot(), vec!["ready".to_string()]);
/// ```
pub struct Dispatcher {
    queue: SerialQueue<Registry>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    next_sink_id: AtomicU64,
    levels: Arc<LevelRegistry>,
    metrics: Arc<DispatcherMetrics>,
    shutdown_timeout: Duration,
}

impl Dispatcher {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    fn with_config(config: &DispatcherConfig, levels: Arc<LevelRegistry>) -> Result<Self> {
        config.validate()?;
        let metrics = Arc::new(DispatcherMetrics::new());
        let registry = Registry::new(Arc::clone(&metrics));
        let (queue, worker) =
            SerialQueue::spawn(&config.ordering_lane_name, registry, config.queue_capacity)?;

        for (identity, level) in &config.source_levels {
            levels.set_or_register(identity, *level);
        }

        Ok(Self {
            queue,
            worker: Mutex::new(Some(worker)),
            stopped: AtomicBool::new(false),
            next_sink_id: AtomicU64::new(1),
            levels,
            metrics,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    fn enqueue(&self, job: impl FnOnce(&mut Registry) + Send + 'static) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(LoggerError::DispatcherStopped);
        }
        match self.queue.push(Box::new(job)) {
            Ok(blocked) => {
                if blocked {
                    self.metrics.record_block();
                }
                Ok(())
            }
            Err(_) => Err(LoggerError::DispatcherStopped),
        }
    }

    /// Submit a record.
    ///
    /// Asynchronous submission returns once the record is queued on the
    /// ordering lane. Synchronous submission also waits until every matching
    /// sink has processed it. Called from a lane thread (from inside a sink),
    /// a synchronous submit degrades to asynchronous since waiting there could
    /// wait on itself.
    ///
    /// Submissions after shutdown are counted as rejected and discarded.
    pub fn submit(&self, synchronous: bool, record: LogRecord) {
        let record = Arc::new(record);
        let admission = Admission::new(&self.metrics);

        // A job that never runs drops its admission, which counts the rejection
        if synchronous && !lane::on_lane() {
            let (done, waiter) = completion();
            let queued = self.enqueue(move |registry| {
                registry.fan_out(&record, Some(&done), admission)
            });
            if queued.is_ok() {
                waiter.wait();
            }
        } else {
            let _ = self.enqueue(move |registry| registry.fan_out(&record, None, admission));
        }
    }

    /// Call-site entry point: build the record and submit it
    #[allow(clippy::too_many_arguments)]
    pub fn log(
        &self,
        synchronous: bool,
        level: LogLevel,
        flag: LogFlag,
        context: i32,
        file: &'static str,
        function: &'static str,
        line: u32,
        tag: Option<Tag>,
        args: fmt::Arguments<'_>,
    ) {
        let record = LogRecord::builder(flag, fmt::format(args))
            .level(level)
            .context(context)
            .location(file, function, line)
            .tag_opt(tag)
            .build();
        self.submit(synchronous, record);
    }

    /// Register a sink that receives every record whose flag intersects `level`.
    ///
    /// Returns as soon as the registration is queued. Records submitted before
    /// this call never reach the sink; records submitted after it always do.
    pub fn add_sink<S: Sink + 'static>(&self, sink: S, level: LogLevel) -> Result<SinkHandle> {
        self.add_boxed_sink(Box::new(sink), level)
    }

    pub fn add_boxed_sink(&self, sink: Box<dyn Sink>, level: LogLevel) -> Result<SinkHandle> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(LoggerError::DispatcherStopped);
        }

        let id = SinkId(self.next_sink_id.fetch_add(1, Ordering::Relaxed));
        let name: Arc<str> = Arc::from(sink.name());
        let lane = match sink.lane() {
            Some(lane) => lane,
            None => Lane::new(sink.lane_name())?,
        };

        let handle = SinkHandle::new(id, Arc::clone(&name), lane.clone(), Arc::clone(&self.metrics));
        let entry = SinkEntry {
            id,
            name,
            level,
            lane,
        };
        self.enqueue(move |registry| registry.attach(entry, sink))?;
        Ok(handle)
    }

    /// Unregister a sink.
    ///
    /// Records submitted after this call never reach it; records already fanned
    /// out to its lane are still processed before its detach hooks run.
    pub fn remove_sink(&self, handle: &SinkHandle) -> Result<()> {
        self.remove_sink_by_id(handle.id())
    }

    pub fn remove_sink_by_id(&self, id: SinkId) -> Result<()> {
        self.enqueue(move |registry| registry.detach(id, None))
    }

    pub fn remove_all_sinks(&self) -> Result<()> {
        self.enqueue(|registry| registry.detach_all(None))
    }

    /// Registered sinks in registration order.
    ///
    /// Reflects every add/remove queued before this call.
    pub fn list_sinks(&self) -> Result<Vec<SinkInfo>> {
        let (tx, rx) = bounded(1);
        self.enqueue(move |registry| {
            let _ = tx.send(registry.snapshot());
        })?;
        rx.recv().map_err(|_| LoggerError::DispatcherStopped)
    }

    /// Block until every record submitted before this call has been processed
    /// and every registered sink has flushed.
    ///
    /// Returns the first flush error reported by a sink. Fails with
    /// [`LoggerError::LaneReentrancy`] when called from a lane thread.
    pub fn flush(&self) -> Result<()> {
        self.flush_within(None)
    }

    /// [`Dispatcher::flush`] that gives up after `timeout`.
    ///
    /// On [`LoggerError::Timeout`] the barrier stays queued and the sinks
    /// still flush once they reach it.
    pub fn flush_timeout(&self, timeout: Duration) -> Result<()> {
        self.flush_within(Some(timeout))
    }

    fn flush_within(&self, timeout: Option<Duration>) -> Result<()> {
        if lane::on_lane() {
            return Err(LoggerError::reentrancy(self.queue.name(), "flush"));
        }

        let (done, waiter) = completion();
        let (errors_tx, errors_rx) = unbounded();
        self.enqueue(move |registry| registry.flush_all(&done, Some(&errors_tx)))?;
        match timeout {
            Some(timeout) => {
                if !waiter.wait_timeout(timeout) {
                    return Err(LoggerError::timeout("flush", timeout));
                }
            }
            None => waiter.wait(),
        }
        self.metrics.record_flush();

        match errors_rx.try_recv() {
            Ok(e) => Err(e),
            Err(_) => Ok(()),
        }
    }

    /// Flush and detach every sink, then stop the ordering lane.
    ///
    /// Returns `true` if the sinks finished within `timeout`. Later calls are
    /// no-ops returning `true`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return true;
        }

        let (done, waiter) = completion();
        let queued = self.queue.push(Box::new(move |registry: &mut Registry| {
            registry.flush_all(&done, None);
            registry.detach_all(Some(&done));
            registry.close();
        }));
        self.stopped.store(true, Ordering::Release);
        self.queue.stop();

        if queued.is_err() {
            return true;
        }
        if lane::on_lane() {
            eprintln!(
                "[LOGGER WARNING] Dispatcher shut down from a lane thread; \
                 not waiting for sinks to drain."
            );
            return false;
        }

        let drained = waiter.wait_timeout(timeout);
        if drained {
            if let Some(worker) = self.worker.lock().take() {
                if let Err(e) = worker.join() {
                    eprintln!("[LOGGER ERROR] Ordering lane panicked during shutdown: {:?}", e);
                    return false;
                }
            }
        } else {
            eprintln!(
                "[LOGGER WARNING] Sinks did not drain within {:?}. Some records may be lost.",
                timeout
            );
        }
        drained
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Registry of runtime-adjustable call-site thresholds
    pub fn levels(&self) -> &Arc<LevelRegistry> {
        &self.levels
    }

    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.metrics
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if !self.shutdown(self.shutdown_timeout) {
            eprintln!("[LOGGER WARNING] Dispatcher dropped before all sinks drained");
        }

        let failures = self.metrics.sink_errors() + self.metrics.sink_panics();
        if failures > 0 {
            eprintln!(
                "[LOGGER WARNING] Dispatcher shutting down with {} sink failures (failure rate: {:.2}%)",
                failures,
                self.metrics.failure_rate()
            );
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("ordering_lane", &self.queue.name())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Builder for constructing a [`Dispatcher`] with a fluent API
///
/// # Example
/// ```
/// use rust_log_dispatch::prelude::*;
/// use std::time::Duration;
///
/// let dispatcher = Dispatcher::builder()
///     .queue_capacity(4096)
///     .shutdown_timeout(Duration::from_secs(2))
///     .sink(MemorySink::new("memory"), LogLevel::INFO)
///     .build()
///     .unwrap();
///
/// assert_eq!(dispatcher.list_sinks().unwrap().len(), 1);
/// ```
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    levels: Option<Arc<LevelRegistry>>,
    sinks: Vec<(Box<dyn Sink>, LogLevel)>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
            levels: None,
            sinks: Vec::new(),
        }
    }

    /// Start from a loaded configuration; later builder calls override it
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound the ordering queue. A full queue blocks submitters.
    #[must_use = "builder methods return a new value"]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = Some(capacity);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn ordering_lane_name(mut self, name: impl Into<String>) -> Self {
        self.config.ordering_lane_name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Share an existing level registry instead of creating one
    #[must_use = "builder methods return a new value"]
    pub fn level_registry(mut self, levels: Arc<LevelRegistry>) -> Self {
        self.levels = Some(levels);
        self
    }

    /// Seed a call-site threshold in the level registry
    #[must_use = "builder methods return a new value"]
    pub fn source_level(mut self, identity: impl Into<String>, level: LogLevel) -> Self {
        self.config.source_levels.insert(identity.into(), level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S, level: LogLevel) -> Self {
        self.sinks.push((Box::new(sink), level));
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        let levels = self.levels.unwrap_or_default();
        let dispatcher = Dispatcher::with_config(&self.config, levels)?;
        for (sink, level) in self.sinks {
            dispatcher.add_boxed_sink(sink, level)?;
        }
        Ok(dispatcher)
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
