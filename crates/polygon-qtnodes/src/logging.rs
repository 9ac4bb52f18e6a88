/*!
Logging (and optional profiling) setup for the command-line tool.

Log lines go to stderr so stdout only carries addresses. `RUST_LOG` selects
the level, `info` when unset. With the `profiling` feature, setting
`ENABLE_PROFILING` also records a Chrome trace file (see `tracing-chrome`),
written when the returned guard is dropped.
*/

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(feature = "profiling")]
mod inner {
    use super::*;
    use tracing_chrome::{ChromeLayerBuilder, FlushGuard};

    pub type LoggingGuard = Option<FlushGuard>;

    pub fn setup_logging() -> LoggingGuard {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(env_filter());

        let (chrome_layer, guard) = if std::env::var("ENABLE_PROFILING").is_ok() {
            let (layer, guard) = ChromeLayerBuilder::new().build();
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };

        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(fmt_layer)
            .init();

        if guard.is_some() {
            tracing::info!("ENABLE_PROFILING set - recording Chrome trace");
        }
        guard
    }
}

#[cfg(not(feature = "profiling"))]
mod inner {
    use super::*;

    pub type LoggingGuard = ();

    pub fn setup_logging() -> LoggingGuard {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(env_filter()),
            )
            .init();
    }
}

pub use inner::{LoggingGuard, setup_logging};
