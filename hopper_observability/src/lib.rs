//! Tracing bootstrap shared by the hopper binaries.

use std::borrow::Cow;

use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, Layer, prelude::*, registry::LookupSpan};

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` selects the filter (default `info`); `RUST_LOG_FORMAT=json`
/// switches the stdout layer to JSON output.
pub fn init_observability(
    _package_name: impl Into<Cow<'static, str>>,
    _package_version: impl Into<Cow<'static, str>>,
) {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    let layers = vec![stdout()];

    tracing_subscriber::registry().with(layers).init();
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let log_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO"));

    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(log_env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_filter(log_env_filter)
            .boxed()
    }
}
