//! Process-wide logging setup shared by the atelier binaries.

/// Initialize tracing from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&tracing::LogConfig::from_env());
}

/// Subscriber configuration (format, filter).
pub mod tracing;
