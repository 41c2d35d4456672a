//! Configuration management.
//!
//! This module provides configuration loading through TOML files and
//! environment variable management via `.env` files.
//!
//! # Example
//!
//! ```no_run
//! use lorekeeper::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! let env = EnvironmentLoader::new(Some(Path::new(".env")));
//! let loader = ConfigurationLoader::new(Some(Path::new("config/lorekeeper.toml"))).unwrap();
//!
//! println!("Topology: {}", loader.config.graph.topology);
//! println!("Weaviate: {:?}", env.weaviate_url());
//! ```

pub mod config;
pub mod environment;

// Re-export main types for convenience
pub use self::config::{
    AgentConfig, CheckpointingConfig, Configuration, ConfigurationLoader, GraphConfig, LlmConfig,
    LoggingConfig, PromptsConfig, RetrieverConfig, TemperatureConfig, DEFAULT_CONFIG_PATH,
};
pub use self::environment::EnvironmentLoader;
