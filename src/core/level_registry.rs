//! Runtime-adjustable log levels keyed by source identity
//!
//! Call sites register a source (a module, a subsystem) once and keep the
//! returned [`DynamicLevel`]; checking it costs one relaxed atomic load. The
//! registry lets management code enumerate sources and change their thresholds
//! while the program runs. It never filters anything inside the dispatcher.

use super::{
    error::{LoggerError, Result},
    log_level::{LogFlag, LogLevel},
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Mutable threshold for one source
#[derive(Debug)]
pub struct DynamicLevel {
    identity: String,
    bits: AtomicU64,
}

impl DynamicLevel {
    pub fn new(identity: impl Into<String>, level: LogLevel) -> Self {
        Self {
            identity: identity.into(),
            bits: AtomicU64::new(level.bits()),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[inline]
    pub fn get(&self) -> LogLevel {
        LogLevel::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: LogLevel) {
        self.bits.store(level.bits(), Ordering::Relaxed);
    }
}

/// Anything a call site can test a flag against before building a record
pub trait LevelThreshold {
    fn threshold(&self) -> LogLevel;

    #[inline]
    fn allows(&self, flag: LogFlag) -> bool {
        self.threshold().allows(flag)
    }
}

impl LevelThreshold for LogLevel {
    #[inline]
    fn threshold(&self) -> LogLevel {
        *self
    }
}

impl LevelThreshold for DynamicLevel {
    #[inline]
    fn threshold(&self) -> LogLevel {
        self.get()
    }
}

impl<T: LevelThreshold + ?Sized> LevelThreshold for Arc<T> {
    #[inline]
    fn threshold(&self) -> LogLevel {
        (**self).threshold()
    }
}

impl<T: LevelThreshold + ?Sized> LevelThreshold for &T {
    #[inline]
    fn threshold(&self) -> LogLevel {
        (**self).threshold()
    }
}

#[derive(Debug, Default)]
pub struct LevelRegistry {
    sources: RwLock<BTreeMap<String, Arc<DynamicLevel>>>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identity`, or return the existing entry untouched.
    ///
    /// `default` only applies on first registration, so a level set by
    /// configuration before the source first logs is kept.
    pub fn register(&self, identity: &str, default: LogLevel) -> Arc<DynamicLevel> {
        if let Some(existing) = self.sources.read().get(identity) {
            return Arc::clone(existing);
        }
        let mut sources = self.sources.write();
        Arc::clone(
            sources
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(DynamicLevel::new(identity, default))),
        )
    }

    pub fn get(&self, identity: &str) -> Option<LogLevel> {
        self.sources.read().get(identity).map(|level| level.get())
    }

    pub fn set(&self, identity: &str, level: LogLevel) -> Result<()> {
        match self.sources.read().get(identity) {
            Some(entry) => {
                entry.set(level);
                Ok(())
            }
            None => Err(LoggerError::UnknownSource(identity.to_string())),
        }
    }

    /// Set the level, registering the source if needed
    pub fn set_or_register(&self, identity: &str, level: LogLevel) {
        self.register(identity, level).set(level);
    }

    pub fn is_registered(&self, identity: &str) -> bool {
        self.sources.read().contains_key(identity)
    }

    /// Registered identities in sorted order
    pub fn registered_sources(&self) -> Vec<String> {
        self.sources.read().keys().cloned().collect()
    }

    /// Drop the registry entry. Call sites holding the level keep working.
    pub fn unregister(&self, identity: &str) -> Option<Arc<DynamicLevel>> {
        self.sources.write().remove(identity)
    }
}
