//! CLI parsing, layered configuration loading, and blacklist catalog
//! parsing for the adaptive correlation controller.

pub mod args;
pub mod blacklist_xml;
pub mod loader;
pub mod settings;

pub use args::CliArgs;
pub use loader::{ConfigError, ConfigLoader};
pub use settings::{ChannelEndpoint, Config, OutputSink};
