//! Configuration, errors, logging and string interning.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod string_intern;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder};
pub use error::{Result, TesseraError};
pub use logging::init_logging;
pub use string_intern::{InternedTag, StringInterner};
