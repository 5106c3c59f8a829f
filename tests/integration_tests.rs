//! Integration tests for the dispatcher
//!
//! These tests verify:
//! - Per-sink ordering across sync and async submissions
//! - Level mask routing
//! - Add/remove boundaries and flush completeness
//! - Formatter suppression and formatter hooks
//! - Shared lanes, reentrancy and failure isolation
//! - File output and drop-time flushing

use parking_lot::Mutex;
use rust_log_dispatch::prelude::*;
use rust_log_dispatch::{log_error, log_info, log_warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

type Events = Arc<Mutex<Vec<String>>>;

/// Sink that records `message@thread` for every processed record
struct Recorder {
    name: String,
    events: Events,
    lane: Option<Lane>,
    delay: Option<Duration>,
    formatter: FormatterSlot,
}

impl Recorder {
    fn new(name: &str) -> (Self, Events) {
        let events = Events::default();
        let recorder = Self {
            name: name.to_string(),
            events: Arc::clone(&events),
            lane: None,
            delay: None,
            formatter: FormatterSlot::default(),
        };
        (recorder, events)
    }

    fn on(mut self, lane: &Lane) -> Self {
        self.lane = Some(lane.clone());
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Sink for Recorder {
    fn process(&mut self, record: &LogRecord) -> rust_log_dispatch::Result<()> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if let Some(line) = self.formatter.format(record) {
            let thread = thread::current().name().unwrap_or("?").to_string();
            self.events.lock().push(format!("{}@{}", line, thread));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn lane(&self) -> Option<Lane> {
        self.lane.clone()
    }

    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        self.formatter.get()
    }

    fn set_formatter(&mut self, formatter: Option<Arc<dyn Formatter>>) {
        self.formatter.set(formatter, &self.name);
    }
}

fn record(flag: LogFlag, message: &str) -> LogRecord {
    LogRecord::builder(flag, message).build()
}

fn messages(lines: &MemoryLines) -> Vec<String> {
    lines.snapshot()
}

#[test]
fn test_sync_and_async_submissions_keep_order() {
    let dispatcher = Dispatcher::new().unwrap();
    let sink = MemorySink::new("memory");
    let lines = sink.lines();
    dispatcher.add_sink(sink, LogLevel::ALL).unwrap();

    dispatcher.submit(false, record(LogFlag::INFO, "a"));
    dispatcher.submit(true, record(LogFlag::WARNING, "b"));
    dispatcher.submit(false, record(LogFlag::DEBUG, "c"));
    dispatcher.flush().unwrap();

    assert_eq!(messages(&lines), vec!["a", "b", "c"]);
}

#[test]
fn test_level_mask_routes_records() {
    let dispatcher = Dispatcher::new().unwrap();
    let errors = MemorySink::new("errors");
    let everything = MemorySink::new("everything");
    let audit = MemorySink::new("audit");
    let (error_lines, all_lines, audit_lines) = (errors.lines(), everything.lines(), audit.lines());

    dispatcher.add_sink(errors, LogLevel::ERROR).unwrap();
    dispatcher.add_sink(everything, LogLevel::ALL).unwrap();
    dispatcher
        .add_sink(audit, LogLevel::from(LogFlag::custom(8)))
        .unwrap();

    dispatcher.submit(false, record(LogFlag::INFO, "x"));
    dispatcher.submit(false, record(LogFlag::ERROR, "y"));
    dispatcher.submit(false, record(LogFlag::custom(8), "z"));
    dispatcher.flush().unwrap();

    assert_eq!(messages(&error_lines), vec!["y"]);
    assert_eq!(messages(&all_lines), vec!["x", "y", "z"]);
    assert_eq!(messages(&audit_lines), vec!["z"]);
}

#[test]
fn test_off_mask_receives_nothing() {
    let dispatcher = Dispatcher::new().unwrap();
    let sink = MemorySink::new("off");
    let lines = sink.lines();
    dispatcher.add_sink(sink, LogLevel::OFF).unwrap();

    dispatcher.submit(true, record(LogFlag::ERROR, "dropped"));
    dispatcher.flush().unwrap();

    assert!(lines.is_empty());
    assert_eq!(dispatcher.metrics().delivered(), 0);
}

#[test]
fn test_add_and_remove_are_ordered_with_submissions() {
    let dispatcher = Dispatcher::new().unwrap();
    let sink = MemorySink::new("memory");
    let lines = sink.lines();

    dispatcher.submit(false, record(LogFlag::INFO, "before add"));
    let handle = dispatcher.add_sink(sink, LogLevel::ALL).unwrap();
    dispatcher.submit(false, record(LogFlag::INFO, "while registered"));
    dispatcher.remove_sink(&handle).unwrap();
    dispatcher.submit(false, record(LogFlag::INFO, "after remove"));

    // The dispatcher flush puts the detach on the sink lane; the handle flush
    // then queues behind it.
    dispatcher.flush().unwrap();
    handle.flush().unwrap();

    assert_eq!(messages(&lines), vec!["while registered"]);
    assert!(dispatcher.list_sinks().unwrap().is_empty());
}

#[test]
fn test_flush_waits_for_removed_sink_backlog() {
    let dispatcher = Dispatcher::new().unwrap();
    let (slow, events) = Recorder::new("slow");
    let handle = dispatcher
        .add_sink(slow.slow(Duration::from_millis(150)), LogLevel::ALL)
        .unwrap();

    dispatcher.submit(false, record(LogFlag::INFO, "routed before removal"));
    dispatcher.remove_sink(&handle).unwrap();
    dispatcher.flush().unwrap();

    assert_eq!(
        *events.lock(),
        vec!["routed before removal@sink.slow".to_string()]
    );
}

#[test]
fn test_flush_waits_for_all_removed_sinks() {
    let dispatcher = Dispatcher::new().unwrap();
    let shared = Lane::new("shared.removed").unwrap();
    let (first, first_events) = Recorder::new("first");
    let (second, second_events) = Recorder::new("second");
    let (third, third_events) = Recorder::new("third");
    let delay = Duration::from_millis(40);
    dispatcher
        .add_sink(first.slow(delay).on(&shared), LogLevel::ALL)
        .unwrap();
    dispatcher
        .add_sink(second.slow(delay).on(&shared), LogLevel::ALL)
        .unwrap();
    dispatcher.add_sink(third.slow(delay), LogLevel::ERROR).unwrap();

    for i in 0..3 {
        dispatcher.submit(false, record(LogFlag::ERROR, &format!("e{}", i)));
    }
    dispatcher.remove_all_sinks().unwrap();
    dispatcher.submit(false, record(LogFlag::ERROR, "after removal"));
    dispatcher.flush().unwrap();

    for events in [&first_events, &second_events, &third_events] {
        let seen: Vec<String> = events
            .lock()
            .iter()
            .map(|line| line.split('@').next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(seen, vec!["e0", "e1", "e2"]);
    }
    assert!(dispatcher.list_sinks().unwrap().is_empty());
}

#[test]
fn test_repeated_remove_and_flush() {
    let dispatcher = Dispatcher::new().unwrap();
    for round in 0..5 {
        let (sink, events) = Recorder::new(&format!("round{}", round));
        let handle = dispatcher
            .add_sink(sink.slow(Duration::from_millis(10)), LogLevel::ALL)
            .unwrap();
        for i in 0..3 {
            dispatcher.submit(false, record(LogFlag::DEBUG, &format!("{}", i)));
        }
        dispatcher.remove_sink(&handle).unwrap();
        dispatcher.flush().unwrap();
        assert_eq!(events.lock().len(), 3, "round {}", round);
    }
}

#[test]
fn test_sync_submit_waits_for_every_sink() {
    let dispatcher = Dispatcher::new().unwrap();
    let (slow, slow_events) = Recorder::new("slow");
    let (fast, fast_events) = Recorder::new("fast");
    dispatcher
        .add_sink(slow.slow(Duration::from_millis(50)), LogLevel::ALL)
        .unwrap();
    dispatcher.add_sink(fast, LogLevel::ALL).unwrap();

    let started = Instant::now();
    dispatcher.submit(true, record(LogFlag::ERROR, "joined"));

    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(slow_events.lock().len(), 1);
    assert_eq!(fast_events.lock().len(), 1);
}

#[test]
fn test_flush_covers_all_prior_async_records() {
    let dispatcher = Dispatcher::new().unwrap();
    let (slow, events) = Recorder::new("slow");
    dispatcher
        .add_sink(slow.slow(Duration::from_micros(200)), LogLevel::ALL)
        .unwrap();

    for i in 0..100 {
        dispatcher.submit(false, record(LogFlag::INFO, &format!("m{}", i)));
    }
    dispatcher.flush().unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 100);
    assert!(events[99].starts_with("m99@"));
    assert_eq!(dispatcher.metrics().flushes(), 1);
}

#[test]
fn test_formatter_can_suppress_by_tag() {
    let dispatcher = Dispatcher::new().unwrap();
    let suppress = FnFormatter::new(|record: &LogRecord| {
        match record.tag_as::<&'static str>() {
            Some(&"suppressed") => None,
            _ => Some(record.message.clone()),
        }
    });
    let sink = MemorySink::new("memory").with_formatter(Arc::new(suppress));
    let (lines, records) = (sink.lines(), sink.records());
    dispatcher.add_sink(sink, LogLevel::ALL).unwrap();

    dispatcher.submit(
        false,
        LogRecord::builder(LogFlag::INFO, "hidden")
            .tag(Tag::new("suppressed"))
            .build(),
    );
    dispatcher.submit(false, record(LogFlag::INFO, "visible"));
    dispatcher.flush().unwrap();

    assert_eq!(messages(&lines), vec!["visible"]);
    // The sink still processed both; only the output was suppressed
    assert_eq!(records.lock().len(), 2);
}

#[test]
fn test_sinks_can_share_a_lane() {
    let dispatcher = Dispatcher::new().unwrap();
    let shared = Lane::new("shared.lane").unwrap();
    let (first, first_events) = Recorder::new("first");
    let (second, second_events) = Recorder::new("second");
    dispatcher.add_sink(first.on(&shared), LogLevel::ALL).unwrap();
    dispatcher.add_sink(second.on(&shared), LogLevel::ALL).unwrap();
    let (own, own_events) = Recorder::new("own");
    dispatcher.add_sink(own, LogLevel::ALL).unwrap();

    dispatcher.submit(true, record(LogFlag::INFO, "hello"));

    assert_eq!(*first_events.lock(), vec!["hello@shared.lane".to_string()]);
    assert_eq!(*second_events.lock(), vec!["hello@shared.lane".to_string()]);
    assert_eq!(*own_events.lock(), vec!["hello@sink.own".to_string()]);

    let lanes: Vec<_> = dispatcher
        .list_sinks()
        .unwrap()
        .into_iter()
        .map(|info| info.lane)
        .collect();
    assert_eq!(lanes, vec!["shared.lane", "shared.lane", "sink.own"]);
}

/// Records the thread its hooks run on
struct HookProbe {
    calls: Events,
}

impl Formatter for HookProbe {
    fn format(&self, record: &LogRecord) -> Option<String> {
        Some(format!("probe:{}", record.message))
    }

    fn did_attach(&self, sink: &str) {
        let thread = thread::current().name().unwrap_or("?").to_string();
        self.calls.lock().push(format!("attach {} on {}", sink, thread));
    }

    fn will_detach(&self, sink: &str) {
        let thread = thread::current().name().unwrap_or("?").to_string();
        self.calls.lock().push(format!("detach {} on {}", sink, thread));
    }
}

#[test]
fn test_formatter_hooks_run_on_sink_lane() {
    let dispatcher = Dispatcher::new().unwrap();
    let (sink, events) = Recorder::new("probed");
    let handle = dispatcher.add_sink(sink, LogLevel::ALL).unwrap();

    let calls = Events::default();
    let first: Arc<dyn Formatter> = Arc::new(HookProbe {
        calls: Arc::clone(&calls),
    });
    handle.set_formatter(Some(Arc::clone(&first))).unwrap();
    dispatcher.submit(true, record(LogFlag::INFO, "formatted"));
    handle.set_formatter(None).unwrap();
    dispatcher.submit(true, record(LogFlag::INFO, "plain"));

    assert_eq!(
        *calls.lock(),
        vec![
            "attach probed on sink.probed".to_string(),
            "detach probed on sink.probed".to_string(),
        ]
    );
    assert_eq!(
        *events.lock(),
        vec![
            "probe:formatted@sink.probed".to_string(),
            "plain@sink.probed".to_string(),
        ]
    );
    assert!(handle.formatter().unwrap().is_none());
}

#[test]
fn test_text_formatter_tracks_attached_sinks() {
    let dispatcher = Dispatcher::new().unwrap();
    let formatter = Arc::new(TextFormatter::new());
    let a = MemorySink::new("a").with_formatter(formatter.clone());
    let b = MemorySink::new("b").with_formatter(formatter.clone());

    let handle_a = dispatcher.add_sink(a, LogLevel::ALL).unwrap();
    dispatcher.add_sink(b, LogLevel::ALL).unwrap();
    dispatcher.flush().unwrap();
    assert_eq!(formatter.attached_sinks(), 2);

    dispatcher.remove_sink(&handle_a).unwrap();
    dispatcher.flush().unwrap();
    handle_a.flush().unwrap();
    assert_eq!(formatter.attached_sinks(), 1);

    let current = handle_a.formatter().unwrap();
    assert!(current.is_none(), "removed sink has no formatter to report");
}

type DispatcherSlot = Arc<Mutex<Option<Arc<Dispatcher>>>>;
type HandleSlot = Arc<Mutex<Option<SinkHandle>>>;

/// Calls back into the dispatcher and its own handle while processing
struct Reentrant {
    dispatcher: DispatcherSlot,
    handle: HandleSlot,
    outcomes: Events,
}

impl Sink for Reentrant {
    fn process(&mut self, record: &LogRecord) -> rust_log_dispatch::Result<()> {
        if record.message != "outer" {
            self.outcomes.lock().push(format!("saw {}", record.message));
            return Ok(());
        }

        let dispatcher = self.dispatcher.lock().clone();
        if let Some(dispatcher) = dispatcher {
            // Would deadlock if it waited for this very lane
            dispatcher.submit(true, LogRecord::builder(LogFlag::INFO, "inner").build());
            let flush = dispatcher.flush();
            self.outcomes.lock().push(format!(
                "flush reentrancy: {}",
                matches!(flush, Err(LoggerError::LaneReentrancy { .. }))
            ));
        }
        if let Some(ref handle) = *self.handle.lock() {
            let formatter = handle.formatter();
            self.outcomes.lock().push(format!(
                "formatter reentrancy: {}",
                matches!(formatter, Err(LoggerError::LaneReentrancy { .. }))
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "reentrant"
    }
}

#[test]
fn test_reentrant_calls_from_a_sink_do_not_deadlock() {
    let dispatcher = Arc::new(Dispatcher::new().unwrap());
    let dispatcher_slot = DispatcherSlot::default();
    let handle_slot = HandleSlot::default();
    let outcomes = Events::default();

    let handle = dispatcher
        .add_sink(
            Reentrant {
                dispatcher: Arc::clone(&dispatcher_slot),
                handle: Arc::clone(&handle_slot),
                outcomes: Arc::clone(&outcomes),
            },
            LogLevel::ALL,
        )
        .unwrap();
    *dispatcher_slot.lock() = Some(Arc::clone(&dispatcher));
    *handle_slot.lock() = Some(handle);

    dispatcher.submit(true, record(LogFlag::INFO, "outer"));
    dispatcher.flush().unwrap();

    // Break the cycle so the dispatcher can drop
    dispatcher_slot.lock().take();
    handle_slot.lock().take();

    assert_eq!(
        *outcomes.lock(),
        vec![
            "flush reentrancy: true".to_string(),
            "formatter reentrancy: true".to_string(),
            "saw inner".to_string(),
        ]
    );
}

struct Failing {
    panic: bool,
}

impl Sink for Failing {
    fn process(&mut self, record: &LogRecord) -> rust_log_dispatch::Result<()> {
        if self.panic {
            panic!("cannot handle {}", record.message);
        }
        Err(LoggerError::sink("failing", "backend unavailable"))
    }

    fn name(&self) -> &str {
        if self.panic {
            "panicking"
        } else {
            "failing"
        }
    }

    fn flush(&mut self) -> rust_log_dispatch::Result<()> {
        Err(LoggerError::sink(self.name(), "flush rejected"))
    }
}

#[test]
fn test_failing_sinks_do_not_affect_others() {
    let dispatcher = Dispatcher::new().unwrap();
    let healthy = MemorySink::new("healthy");
    let lines = healthy.lines();
    dispatcher.add_sink(Failing { panic: false }, LogLevel::ALL).unwrap();
    dispatcher.add_sink(Failing { panic: true }, LogLevel::ALL).unwrap();
    dispatcher.add_sink(healthy, LogLevel::ALL).unwrap();

    dispatcher.submit(true, record(LogFlag::ERROR, "one"));
    dispatcher.submit(false, record(LogFlag::INFO, "two"));
    let flushed = dispatcher.flush();

    assert!(matches!(flushed, Err(LoggerError::SinkError { .. })));
    assert_eq!(messages(&lines), vec!["one", "two"]);

    let metrics = dispatcher.metrics();
    assert_eq!(metrics.delivered(), 2);
    assert_eq!(metrics.sink_panics(), 2);
    // Two process failures plus two flush failures
    assert!(metrics.sink_errors() >= 4);
    assert!(metrics.failure_rate() > 0.0);
}

#[test]
fn test_file_sink_writes_one_line_per_record() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("dispatch.log");

    let dispatcher = Dispatcher::new().unwrap();
    let sink = FileSink::new(&path)
        .unwrap()
        .with_formatter(Arc::new(TextFormatter::new().with_thread(false)));
    // Just the two flags; cumulative INFO would also take errors
    dispatcher
        .add_sink(sink, LogFlag::INFO | LogFlag::WARNING)
        .unwrap();

    let level = LogLevel::ALL;
    log_info!(dispatcher, level, "user login\nERROR forged entry");
    log_warn!(dispatcher, level, "disk at {}%", 91);
    log_error!(dispatcher, level, "filtered by the sink mask");
    dispatcher.flush().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2, "unexpected output: {content}");
    assert!(lines[0].contains("[INFO ]"));
    assert!(lines[0].ends_with("user login\\nERROR forged entry"));
    assert!(lines[1].contains("[WARN ]"));
    assert!(lines[1].contains("integration_tests:"));
    assert!(lines[1].ends_with("disk at 91%"));
}

#[test]
fn test_drop_flushes_pending_records() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("drop.log");

    {
        let dispatcher = Dispatcher::builder()
            .sink(
                FileSink::new(&path)
                    .unwrap()
                    .with_formatter(Arc::new(JsonFormatter::new())),
                LogLevel::ALL,
            )
            .build()
            .unwrap();
        for i in 0..50 {
            dispatcher.submit(false, record(LogFlag::DEBUG, &format!("pending {}", i)));
        }
    }

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 50);
    let last: serde_json::Value = serde_json::from_str(lines[49]).unwrap();
    assert_eq!(last["message"], "pending 49");
}

#[test]
fn test_concurrent_producers_deliver_everything() {
    let dispatcher = Arc::new(Dispatcher::new().unwrap());
    let sink = MemorySink::new("memory");
    let records = sink.records();
    dispatcher.add_sink(sink, LogLevel::ALL).unwrap();

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for i in 0..250 {
                    let record = LogRecord::builder(LogFlag::INFO, format!("{}", i))
                        .context(producer)
                        .build();
                    dispatcher.submit(i % 10 == 0, record);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    dispatcher.flush().unwrap();

    let records = records.lock();
    assert_eq!(records.len(), 1000);
    // Each producer's records arrive in the order it submitted them
    for producer in 0..4 {
        let sequence: Vec<usize> = records
            .iter()
            .filter(|r| r.context == producer)
            .map(|r| r.message.parse().unwrap())
            .collect();
        assert_eq!(sequence, (0..250).collect::<Vec<_>>());
    }
    assert_eq!(dispatcher.metrics().submitted(), 1000);
}

#[test]
fn test_config_file_drives_dispatcher() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("dispatch.json");
    std::fs::write(
        &path,
        r#"{
            "queue_capacity": 64,
            "ordering_lane_name": "app.ordering",
            "source_levels": { "net": "DEBUG", "db": "0x3" }
        }"#,
    )
    .unwrap();

    let config = DispatcherConfig::from_file(&path).unwrap();
    let dispatcher = Dispatcher::builder().config(config).build().unwrap();

    assert_eq!(dispatcher.levels().get("net"), Some(LogLevel::DEBUG));
    assert_eq!(dispatcher.levels().get("db"), Some(LogLevel::WARNING));
    assert!(format!("{:?}", dispatcher).contains("app.ordering"));
}

#[test]
fn test_macros_follow_registry_levels() {
    let dispatcher = Dispatcher::builder()
        .source_level("payments", LogLevel::WARNING)
        .build()
        .unwrap();
    let sink = MemorySink::new("memory");
    let lines = sink.lines();
    dispatcher.add_sink(sink, LogLevel::ALL).unwrap();

    let level = dispatcher.levels().register("payments", LogLevel::VERBOSE);
    log_info!(dispatcher, level, "suppressed at WARNING");
    log_warn!(dispatcher, level, "refund {} queued", 42);

    dispatcher.levels().set("payments", LogLevel::INFO).unwrap();
    log_info!(dispatcher, level, "now visible");
    dispatcher.flush().unwrap();

    assert_eq!(messages(&lines), vec!["refund 42 queued", "now visible"]);
}

#[test]
fn test_shutdown_then_drop_is_quiet() {
    let dispatcher = Dispatcher::new().unwrap();
    let sink = MemorySink::new("memory");
    let lines = sink.lines();
    dispatcher.add_sink(sink, LogLevel::ALL).unwrap();
    dispatcher.submit(false, record(LogFlag::INFO, "last"));

    assert!(dispatcher.shutdown(Duration::from_secs(2)));
    assert_eq!(messages(&lines), vec!["last"]);

    dispatcher.submit(false, record(LogFlag::INFO, "too late"));
    assert_eq!(dispatcher.metrics().rejected(), 1);
    drop(dispatcher);
    assert_eq!(lines.len(), 1);
}
