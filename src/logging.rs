//! Tracing subscriber setup for embedding hosts

use crate::config::BridgeConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(config: &BridgeConfig) -> bool {
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new("avatar_bridge=info"));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.is_ok()
}
