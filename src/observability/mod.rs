//! Observability: `tracing` setup and the markdown turn transcript.
//!
//! Runtime events (step entered, decisions, recovered failures) are emitted
//! with `tracing` macros throughout the crate. The binary installs a
//! subscriber with [`init_tracing`]; library users bring their own.
//!
//! # Example
//!
//! ```no_run
//! use lorekeeper::observability::{init_tracing, Logger};
//!
//! init_tracing("info");
//! let logger = Logger::new(None, Some("DEBUG")).unwrap();
//! logger.log_turn_start("conv-1", "Who is Dobby?", "graded_retry").unwrap();
//! ```

pub mod logger;

// Re-export main types for convenience
pub use logger::Logger;

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber. `RUST_LOG` takes precedence over `level`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lorekeeper={}", level.to_lowercase())));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
