//! 日志初始化：基于 tracing-subscriber 的结构化日志输出。
//!
//! Every layer reports through `tracing` events with structured fields
//! (`invocation_id`, `model`, `attempt`, `key`, ...). Applications that already
//! install a subscriber need nothing from this module.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG`, or `default_directive` when unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let _ = init_tracing("ai_lib_layers=debug");
        assert!(!init_tracing("info"));
    }
}
