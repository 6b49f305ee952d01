//! Observability utilities for agent runs.
//!
//! Diagnostics go through `tracing`; [`Logger`] additionally keeps a
//! markdown transcript of a run on disk.
//!
//! # Example
//!
//! ```no_run
//! use ark::observability::Logger;
//!
//! let logger = Logger::new(None, Some("DEBUG")).unwrap();
//! logger.log_run_start("req-1", "react", "Summarize the README").unwrap();
//! logger.log_completion("Task completed").unwrap();
//! ```

pub mod logger;

pub use logger::Logger;
