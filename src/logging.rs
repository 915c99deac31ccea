//! `tracing` subscriber setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides `logging.filter`.
pub const LOG_ENV_VAR: &str = "FEDSIGN_LOG";

/// Install a stderr `fmt` subscriber.
///
/// `FEDSIGN_LOG` wins over `config_filter`. Calling this twice is harmless.
pub fn init_logging(config_filter: &str) {
    let directive = filter_directive(std::env::var(LOG_ENV_VAR).ok(), config_filter);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!("warning: ignoring invalid log filter `{directive}`: {err}");
        EnvFilter::new("warn")
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn filter_directive(env_value: Option<String>, config_filter: &str) -> String {
    env_value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| config_filter.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_value_overrides_config_filter() {
        assert_eq!(
            filter_directive(Some("fedsign=debug".to_string()), "warn"),
            "fedsign=debug"
        );
    }

    #[test]
    fn blank_env_value_falls_back_to_config() {
        assert_eq!(filter_directive(Some("  ".to_string()), "info"), "info");
        assert_eq!(filter_directive(None, "info"), "info");
    }
}
