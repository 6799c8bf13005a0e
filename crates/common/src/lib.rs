//! Lessoncast Common Utilities
//!
//! Shared infrastructure for all Lessoncast crates:
//! - Error taxonomy and result alias
//! - Session clock and frame-rate control for the render loop
//! - Tracing/logging initialization

pub mod clock;
pub mod error;
pub mod logging;

pub use clock::*;
pub use error::*;
pub use logging::LoggingConfig;
