//! Logging setup and the crate-wide tracing prelude.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Under systemd (`JOURNAL_STREAM` set) events go to the journal with
/// their structured fields intact. Anywhere else they are printed to
/// stdout with a local wall-clock timestamp, which is what matters when
/// reading an alarm log.
pub fn init_journald_or_stdout() {
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(journald)
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("journald unavailable ({e}), logging to stdout");
            }
        }
    }

    init_stdout();
}

fn init_stdout() {
    let timer = fmt::time::LocalTime::new(time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_timer(timer).with_target(false))
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
