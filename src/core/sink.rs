//! Sink trait for log output destinations

use super::{
    error::{LoggerError, Result},
    formatter::Formatter,
    lane::{completion, Lane},
    log_level::LogLevel,
    log_record::LogRecord,
    metrics::DispatcherMetrics,
};
use crossbeam_channel::bounded;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SinkId(pub(crate) u64);

impl SinkId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Consumer of log records.
///
/// Every method runs on the sink's lane, one call at a time, so `&mut self`
/// state needs no locking. Optional capabilities have no-op defaults.
pub trait Sink: Send {
    fn process(&mut self, record: &LogRecord) -> Result<()>;

    fn name(&self) -> &str;

    fn on_attach(&mut self) {}

    fn on_detach(&mut self) {}

    /// Block until everything already written has reached its destination
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Lane to run on. `None` gets a dedicated lane named [`Sink::lane_name`].
    fn lane(&self) -> Option<Lane> {
        None
    }

    fn lane_name(&self) -> String {
        format!("sink.{}", self.name())
    }

    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        None
    }

    /// Replace the formatter. Only ever called on the sink's lane.
    fn set_formatter(&mut self, _formatter: Option<Arc<dyn Formatter>>) {}
}

/// Formatter storage for sink implementations.
///
/// Because the owning sink is only touched from its lane, the slot is a plain
/// field: reads in `process` are unsynchronized and [`FormatterSlot::set`]
/// fires the formatter hooks in place.
#[derive(Default, Clone)]
pub struct FormatterSlot {
    current: Option<Arc<dyn Formatter>>,
}

impl FormatterSlot {
    /// Slot holding `formatter`; hooks fire when the sink is attached.
    pub fn new(formatter: Option<Arc<dyn Formatter>>) -> Self {
        Self { current: formatter }
    }

    pub fn get(&self) -> Option<Arc<dyn Formatter>> {
        self.current.clone()
    }

    pub fn set(&mut self, formatter: Option<Arc<dyn Formatter>>, owner: &str) {
        if let Some(old) = self.current.take() {
            old.will_detach(owner);
        }
        if let Some(ref new) = formatter {
            new.did_attach(owner);
        }
        self.current = formatter;
    }

    /// Run the formatter, or pass the bare message through when there is none
    pub fn format(&self, record: &LogRecord) -> Option<String> {
        match self.current {
            Some(ref formatter) => formatter.format(record),
            None => Some(record.message.clone()),
        }
    }
}

impl fmt::Debug for FormatterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterSlot")
            .field("installed", &self.current.is_some())
            .finish()
    }
}

/// Registered sink as reported by [`crate::Dispatcher::list_sinks`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkInfo {
    pub id: SinkId,
    pub name: String,
    pub level: LogLevel,
    pub lane: String,
}

/// Caller-side handle to a registered sink.
///
/// Operations that touch sink state are marshalled onto the sink's lane.
#[derive(Clone)]
pub struct SinkHandle {
    id: SinkId,
    name: Arc<str>,
    lane: Lane,
    metrics: Arc<DispatcherMetrics>,
}

impl SinkHandle {
    pub(crate) fn new(id: SinkId, name: Arc<str>, lane: Lane, metrics: Arc<DispatcherMetrics>) -> Self {
        Self {
            id,
            name,
            lane,
            metrics,
        }
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lane(&self) -> &Lane {
        &self.lane
    }

    /// Replace the sink's formatter.
    ///
    /// Queued behind the records already routed to the sink; a no-op once the
    /// sink has been removed.
    pub fn set_formatter(&self, formatter: Option<Arc<dyn Formatter>>) -> Result<()> {
        let id = self.id;
        self.lane.execute(move |table| {
            if let Some(sink) = table.get_mut(&id) {
                sink.set_formatter(formatter);
            }
        })
    }

    /// Current formatter, read on the sink's lane.
    ///
    /// Fails with [`LoggerError::LaneReentrancy`] when called from the lane
    /// itself; code running there owns the sink and can read it directly.
    pub fn formatter(&self) -> Result<Option<Arc<dyn Formatter>>> {
        if self.lane.is_current() {
            return Err(LoggerError::reentrancy(self.lane.name(), "formatter"));
        }
        let (tx, rx) = bounded(1);
        let id = self.id;
        self.lane.execute(move |table| {
            let _ = tx.send(table.get(&id).and_then(|sink| sink.formatter()));
        })?;
        rx.recv().map_err(|_| LoggerError::lane_closed(self.lane.name()))
    }

    /// Flush this sink only, waiting for records already routed to it
    pub fn flush(&self) -> Result<()> {
        if self.lane.is_current() {
            return Err(LoggerError::reentrancy(self.lane.name(), "flush"));
        }
        let (done, waiter) = completion();
        let (errors_tx, errors_rx) = bounded(1);
        self.lane.flush(self.id, done, Some(errors_tx), &self.metrics);
        waiter.wait();
        match errors_rx.try_recv() {
            Ok(e) => Err(e),
            Err(_) => Ok(()),
        }
    }
}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("lane", &self.lane.name())
            .finish()
    }
}
