use color_eyre::Result;
use std::sync::Once;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INSTALL: Once = Once::new();

/// Installs color-eyre and the tracing subscriber. `RUST_LOG` wins over the
/// `info` default. Safe to call more than once; later calls are no-ops.
pub fn setup() -> Result<()> {
    let mut result = Ok(());
    INSTALL.call_once(|| {
        if std::env::var("RUST_LIB_BACKTRACE").is_err() {
            std::env::set_var("RUST_LIB_BACKTRACE", "0")
        }
        result = color_eyre::install();
        setup_logging_env();
    });
    result
}

fn setup_logging_env() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .try_init();
    if installed.is_err() {
        tracing::debug!("A global subscriber was already installed");
    }
}

