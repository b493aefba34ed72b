use tracing_subscriber::EnvFilter;

/// Events from this crate; everything else is held at `warn`.
const CRATE_TARGET: &str = "ink_notebook";

/// Initialise logging with this crate at `info`, or at `debug` when `debug`
/// is set. `RUST_LOG` is only honoured in debug mode.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(true))
    } else {
        // Ignore a stray RUST_LOG so tile traces don't flood normal runs.
        default_filter(false)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

fn default_filter(debug: bool) -> EnvFilter {
    let level = if debug { "debug" } else { "info" };
    EnvFilter::new(format!("warn,{CRATE_TARGET}={level}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn crate_level_follows_debug_flag() {
        assert_eq!(default_filter(false).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(default_filter(true).max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
