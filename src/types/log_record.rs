//! Log record types and utilities

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Extension fields attached to a record, kept in key order
pub type RecordFields = BTreeMap<String, serde_json::Value>;

/// Ordinal severity of a record.
///
/// Any value from 0 to 255 is valid so producers can define custom levels
/// between the named ones. On the wire a level is its number; configuration
/// may also spell the named levels out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogLevel(u8);

impl LogLevel {
    /// Detailed diagnostic information
    pub const DEBUG: LogLevel = LogLevel(10);
    /// Confirmation that things work as expected
    pub const INFO: LogLevel = LogLevel(20);
    /// Something unexpected happened, work continues
    pub const WARNING: LogLevel = LogLevel(30);
    /// A function could not be performed
    pub const ERROR: LogLevel = LogLevel(40);
    /// The program itself may be unable to continue
    pub const CRITICAL: LogLevel = LogLevel(50);

    /// Level with the given ordinal
    pub const fn new(value: u8) -> Self {
        LogLevel(value)
    }

    /// Ordinal severity of this level
    pub fn as_u8(self) -> u8 {
        self.0
    }

    fn name(self) -> Option<&'static str> {
        match self {
            LogLevel::DEBUG => Some("DEBUG"),
            LogLevel::INFO => Some("INFO"),
            LogLevel::WARNING => Some("WARNING"),
            LogLevel::ERROR => Some("ERROR"),
            LogLevel::CRITICAL => Some("CRITICAL"),
            _ => None,
        }
    }
}

impl From<u8> for LogLevel {
    fn from(value: u8) -> Self {
        LogLevel(value)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Level {}", self.0),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::DEBUG),
            "INFO" => Ok(LogLevel::INFO),
            "WARNING" | "WARN" => Ok(LogLevel::WARNING),
            "ERROR" => Ok(LogLevel::ERROR),
            "CRITICAL" => Ok(LogLevel::CRITICAL),
            other => other
                .parse::<u8>()
                .map(LogLevel)
                .map_err(|_| format!("unknown log level: {}", s)),
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Ordinal(u8),
    Name(String),
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match LevelRepr::deserialize(deserializer)? {
            LevelRepr::Ordinal(value) => Ok(LogLevel(value)),
            LevelRepr::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

/// A structured log record, the unit carried by one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unique identifier for this record, assigned on arrival if absent
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Dotted name of the logger that produced the record
    pub name: String,

    /// Severity level
    pub level: LogLevel,

    /// Rendered message or format template
    pub message: String,

    /// When the log call was made
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Open set of contextual fields (module, line, exception info, ...)
    #[serde(default)]
    pub fields: RecordFields,

    /// Process ID of the producer
    #[serde(default)]
    pub pid: Option<u32>,

    /// Hostname of the producer
    #[serde(default)]
    pub hostname: Option<String>,

    /// Name or id of the producing thread
    #[serde(default)]
    pub thread: Option<String>,
}

impl LogRecord {
    /// Create a new record stamped with the current time
    pub fn new(name: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            level,
            message: message.into(),
            timestamp: Utc::now(),
            fields: RecordFields::new(),
            pid: None,
            hostname: None,
            thread: None,
        }
    }

    /// Attach one extension field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up an extension field
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
