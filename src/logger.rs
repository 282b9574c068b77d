//! Leveled log sink consumed by the rest of the crate (C7).
//!
//! The kernel itself never installs a logger implementation; it only emits through the
//! `log` facade. Binaries or tests that embed this crate are responsible for installing
//! a subscriber (`env_logger::init()` in tests here).
//!
//! spec.md names five severities: `debug, info, notice, warning, error`, default `notice`.
//! The `log` crate has no `Notice` level, so `notice`-level messages (coercion warnings)
//! are emitted at `Warn` to stay visible at the crate's default enabled level of `Info`.

pub(crate) use log::{debug, warn};

/// Emits a coercion warning (spec.md §4.3, §7's `CoercionWarning`). Non-fatal: the caller
/// continues the operation that produced it.
pub(crate) fn coercion_warning(message: impl AsRef<str>, path: Option<&str>) {
    match path {
        Some(p) => warn!("coercion: {} (at {p})", message.as_ref()),
        None => warn!("coercion: {}", message.as_ref()),
    }
}
