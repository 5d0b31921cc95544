//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level; the format is `pretty` or `json`.
pub fn init(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&logging.level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if logging.format == "json" {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = installed {
        // already installed, e.g. by a test harness
        eprintln!("Logging already initialised: {e}");
    }
}

fn default_directive(level: &str) -> String {
    format!("london_housing={level},tower_http={level},warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        for level in ["error", "warn", "info", "debug", "trace"] {
            let directive = default_directive(level);
            assert!(directive.starts_with(&format!("london_housing={level}")));
            assert!(EnvFilter::try_new(directive).is_ok());
        }
    }
}
