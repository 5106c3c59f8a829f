//! Log flag and level mask definitions
//!
//! A [`LogFlag`] is the single bit a record is emitted with. A [`LogLevel`] is a
//! mask of flags: call sites compare their threshold against a flag before
//! building a record, and sinks are registered with a mask that decides which
//! records reach them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogFlag(u64);

impl LogFlag {
    pub const ERROR: LogFlag = LogFlag(1 << 0);
    pub const WARNING: LogFlag = LogFlag(1 << 1);
    pub const INFO: LogFlag = LogFlag(1 << 2);
    pub const DEBUG: LogFlag = LogFlag(1 << 3);
    pub const VERBOSE: LogFlag = LogFlag(1 << 4);

    /// Built-in flags, most severe first
    pub const STANDARD: [LogFlag; 5] = [
        LogFlag::ERROR,
        LogFlag::WARNING,
        LogFlag::INFO,
        LogFlag::DEBUG,
        LogFlag::VERBOSE,
    ];

    /// Custom flag for application-defined channels.
    ///
    /// Bits 0-4 are taken by the standard flags, so application channels use
    /// bits 5-63.
    ///
    /// # Panics
    ///
    /// Panics if `bit` is 64 or more.
    pub const fn custom(bit: u32) -> Self {
        assert!(bit < u64::BITS, "log flag bit must be below 64");
        LogFlag(1 << bit)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn to_str(&self) -> &'static str {
        match *self {
            LogFlag::ERROR => "ERROR",
            LogFlag::WARNING => "WARN",
            LogFlag::INFO => "INFO",
            LogFlag::DEBUG => "DEBUG",
            LogFlag::VERBOSE => "VERBOSE",
            _ => "CUSTOM",
        }
    }
}

impl fmt::Display for LogFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for LogFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ERROR" => Ok(LogFlag::ERROR),
            "WARN" | "WARNING" => Ok(LogFlag::WARNING),
            "INFO" => Ok(LogFlag::INFO),
            "DEBUG" => Ok(LogFlag::DEBUG),
            "VERBOSE" | "TRACE" => Ok(LogFlag::VERBOSE),
            _ => Err(format!("Invalid log flag: '{}'", s)),
        }
    }
}

impl BitOr for LogFlag {
    type Output = LogLevel;

    fn bitor(self, rhs: LogFlag) -> LogLevel {
        LogLevel(self.0 | rhs.0)
    }
}

/// Mask of [`LogFlag`] bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LogLevel(u64);

impl LogLevel {
    pub const OFF: LogLevel = LogLevel(0);
    pub const ERROR: LogLevel = LogLevel(LogFlag::ERROR.0);
    pub const WARNING: LogLevel = LogLevel(LogLevel::ERROR.0 | LogFlag::WARNING.0);
    pub const INFO: LogLevel = LogLevel(LogLevel::WARNING.0 | LogFlag::INFO.0);
    pub const DEBUG: LogLevel = LogLevel(LogLevel::INFO.0 | LogFlag::DEBUG.0);
    pub const VERBOSE: LogLevel = LogLevel(LogLevel::DEBUG.0 | LogFlag::VERBOSE.0);
    pub const ALL: LogLevel = LogLevel(u64::MAX);

    pub const fn from_bits(bits: u64) -> Self {
        LogLevel(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether a record carrying `flag` passes this mask
    #[inline]
    pub const fn allows(self, flag: LogFlag) -> bool {
        self.0 & flag.0 != 0
    }

    pub const fn is_off(self) -> bool {
        self.0 == 0
    }

    /// Name of a predefined level, `None` for ad hoc masks
    pub fn name(&self) -> Option<&'static str> {
        match *self {
            LogLevel::OFF => Some("OFF"),
            LogLevel::ERROR => Some("ERROR"),
            LogLevel::WARNING => Some("WARN"),
            LogLevel::INFO => Some("INFO"),
            LogLevel::DEBUG => Some("DEBUG"),
            LogLevel::VERBOSE => Some("VERBOSE"),
            LogLevel::ALL => Some("ALL"),
            _ => None,
        }
    }
}

impl From<LogFlag> for LogLevel {
    fn from(flag: LogFlag) -> Self {
        LogLevel(flag.0)
    }
}

impl BitOr<LogFlag> for LogLevel {
    type Output = LogLevel;

    fn bitor(self, rhs: LogFlag) -> LogLevel {
        LogLevel(self.0 | rhs.0)
    }
}

impl BitOr for LogLevel {
    type Output = LogLevel;

    fn bitor(self, rhs: LogLevel) -> LogLevel {
        LogLevel(self.0 | rhs.0)
    }
}

impl BitAnd for LogLevel {
    type Output = LogLevel;

    fn bitand(self, rhs: LogLevel) -> LogLevel {
        LogLevel(self.0 & rhs.0)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed.strip_prefix("0x") {
            return u64::from_str_radix(hex, 16)
                .map(LogLevel)
                .map_err(|_| format!("Invalid log level: '{}'", s));
        }
        match trimmed.to_uppercase().as_str() {
            "OFF" => Ok(LogLevel::OFF),
            "ERROR" => Ok(LogLevel::ERROR),
            "WARN" | "WARNING" => Ok(LogLevel::WARNING),
            "INFO" => Ok(LogLevel::INFO),
            "DEBUG" => Ok(LogLevel::DEBUG),
            "VERBOSE" | "TRACE" => Ok(LogLevel::VERBOSE),
            "ALL" => Ok(LogLevel::ALL),
            _ => Err(format!("Invalid log level: '{}'", s)),
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
