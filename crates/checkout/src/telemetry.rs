//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an `EnvFilter` and a fmt layer.
///
/// Defaults to info level for this crate if `RUST_LOG` is not set. When
/// `json` is true, events are emitted as structured JSON lines instead of
/// the human-readable format.
///
/// Call once at process startup; a second call panics inside
/// `tracing_subscriber`, so tests use their own per-test subscribers.
pub fn init(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "madrona_checkout=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
