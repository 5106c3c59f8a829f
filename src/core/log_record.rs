//! Immutable log record

use super::log_level::{LogFlag, LogLevel};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::ops::BitOr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}

fn current_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Controls whether the file and function strings are copied into the record.
///
/// `&'static str` literals are borrowed by default; everything else is always
/// owned. Setting a bit forces an owned copy even for literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyPolicy(u8);

impl CopyPolicy {
    pub const NONE: CopyPolicy = CopyPolicy(0);
    pub const COPY_FILE: CopyPolicy = CopyPolicy(1 << 0);
    pub const COPY_FUNCTION: CopyPolicy = CopyPolicy(1 << 1);

    pub const fn contains(self, other: CopyPolicy) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CopyPolicy {
    type Output = CopyPolicy;

    fn bitor(self, rhs: CopyPolicy) -> CopyPolicy {
        CopyPolicy(self.0 | rhs.0)
    }
}

fn apply_policy(value: Cow<'static, str>, force_copy: bool) -> Cow<'static, str> {
    match value {
        Cow::Borrowed(s) if force_copy => Cow::Owned(s.to_owned()),
        other => other,
    }
}

/// Opaque value attached to a record for third-party use.
///
/// Two tags are equal only when they point at the same allocation.
#[derive(Clone)]
pub struct Tag(Arc<dyn Any + Send + Sync>);

impl Tag {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Tag(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.downcast_ref::<&'static str>() {
            write!(f, "Tag({:?})", s)
        } else if let Some(s) = self.downcast_ref::<String>() {
            write!(f, "Tag({:?})", s)
        } else {
            f.write_str("Tag(..)")
        }
    }
}

/// One captured log event.
///
/// Every field is fixed at construction. Records travel between lanes as
/// `Arc<LogRecord>`; `clone` produces an independent, value-equal duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub flag: LogFlag,
    pub context: i32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub file: Cow<'static, str>,
    pub function: Cow<'static, str>,
    pub line: u32,
    pub thread_id: u64,
    pub thread_name: Option<String>,
    pub tag: Option<Tag>,
    pub copy_policy: CopyPolicy,
}

impl LogRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        message: impl Into<String>,
        level: LogLevel,
        flag: LogFlag,
        context: i32,
        file: impl Into<Cow<'static, str>>,
        function: impl Into<Cow<'static, str>>,
        line: u32,
        tag: Option<Tag>,
        copy_policy: CopyPolicy,
    ) -> Self {
        Self::builder(flag, message)
            .level(level)
            .context(context)
            .location(file, function, line)
            .tag_opt(tag)
            .copy_policy(copy_policy)
            .build()
    }

    /// Start a record for `flag`; the level defaults to the flag's own bit.
    pub fn builder(flag: LogFlag, message: impl Into<String>) -> LogRecordBuilder {
        LogRecordBuilder {
            level: LogLevel::from(flag),
            flag,
            context: 0,
            message: message.into(),
            timestamp: None,
            file: Cow::Borrowed(""),
            function: Cow::Borrowed(""),
            line: 0,
            tag: None,
            copy_policy: CopyPolicy::NONE,
        }
    }

    /// Thread id as lowercase hex
    pub fn thread_id_hex(&self) -> String {
        format!("{:x}", self.thread_id)
    }

    /// File name without directories or extension
    pub fn file_name(&self) -> &str {
        let base = self
            .file
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(self.file.as_ref());
        match base.rfind('.') {
            Some(0) | None => base,
            Some(dot) => &base[..dot],
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function
    }

    pub fn tag_as<T: Any>(&self) -> Option<&T> {
        self.tag.as_ref().and_then(Tag::downcast_ref::<T>)
    }

    /// Thread name if set, hex id otherwise
    pub fn thread_label(&self) -> Cow<'_, str> {
        match self.thread_name {
            Some(ref name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(self.thread_id_hex()),
        }
    }
}

#[must_use = "call build() to obtain the record"]
pub struct LogRecordBuilder {
    level: LogLevel,
    flag: LogFlag,
    context: i32,
    message: String,
    timestamp: Option<DateTime<Utc>>,
    file: Cow<'static, str>,
    function: Cow<'static, str>,
    line: u32,
    tag: Option<Tag>,
    copy_policy: CopyPolicy,
}

impl LogRecordBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn context(mut self, context: i32) -> Self {
        self.context = context;
        self
    }

    pub fn location(
        mut self,
        file: impl Into<Cow<'static, str>>,
        function: impl Into<Cow<'static, str>>,
        line: u32,
    ) -> Self {
        self.file = file.into();
        self.function = function.into();
        self.line = line;
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn tag_opt(mut self, tag: Option<Tag>) -> Self {
        self.tag = tag;
        self
    }

    /// Use a fixed capture time instead of "now"
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn copy_policy(mut self, policy: CopyPolicy) -> Self {
        self.copy_policy = policy;
        self
    }

    pub fn build(self) -> LogRecord {
        LogRecord {
            level: self.level,
            flag: self.flag,
            context: self.context,
            message: self.message,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            file: apply_policy(self.file, self.copy_policy.contains(CopyPolicy::COPY_FILE)),
            function: apply_policy(
                self.function,
                self.copy_policy.contains(CopyPolicy::COPY_FUNCTION),
            ),
            line: self.line,
            thread_id: current_thread_id(),
            thread_name: current_thread_name(),
            tag: self.tag,
            copy_policy: self.copy_policy,
        }
    }
}
