//! Core data types shared by the client and the collector

pub mod log_record;

pub use log_record::{LogLevel, LogRecord, RecordFields};
