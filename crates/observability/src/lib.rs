//! Tracing and logging (shared setup).

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    subscriber::init(subscriber::LogFormat::from_env());
}

/// Subscriber configuration (filters, output format).
pub mod subscriber;
