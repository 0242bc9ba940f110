//! Tracing/logging setup shared by the procura binaries.

pub mod logging;

pub use logging::{LOG_FORMAT_ENV, LogFormat, ParseLogFormatError, init, init_with};
