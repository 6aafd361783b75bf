//! Shared tracing setup for tests.
//!
//! `RUST_LOG` selects the level (default `debug`). Thread pool and runtime
//! internals are muted so planner and driver events stay readable.

use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

static TEST_SETUP: Once = Once::new();

const NOISY_TARGETS: [&str; 3] = ["rayon_core", "tokio", "mio"];

/// Whether events from `target` are dropped by the test subscriber.
pub fn is_noisy(target: &str) -> bool {
    NOISY_TARGETS.iter().any(|name| target.starts_with(name))
}

/// Install the test subscriber once per process.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        setup_test_logging();
        info!("treeplanter test logging ready");
    });
}

fn setup_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(filter_fn(|metadata| !is_noisy(metadata.target())))
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("tracing subscriber already set");
    } else if let Err(e) = subscriber.try_init() {
        eprintln!("test logging not installed: {e}");
    }
}
