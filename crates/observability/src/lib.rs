//! Process-wide logging setup shared by the binaries.

pub use crate::tracing::{LogFormat, UnknownLogFormat};

/// Initialize tracing using `EDUGATE_LOG_FORMAT` and `RUST_LOG`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize tracing with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init_with(format);
}

/// Subscriber configuration (filters, formatters).
pub mod tracing;
