//! Configuration management for LogRelay

pub mod settings;

pub use settings::{
    ClientConfig, FileSinkSettings, ServerConfig, ServerSettings, SinkSettings,
    TracingSinkSettings, DEFAULT_HOST, DEFAULT_PORT,
};
