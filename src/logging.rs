//! Logging setup for the binary
//!
//! Logs go to stderr so that they never mix with rendered output. The
//! `LINETAG_LOG` environment variable takes an `EnvFilter` directive
//! string and overrides the config.

use std::io;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding filter directives
pub const LOG_ENV: &str = "LINETAG_LOG";

/// Filter directives to use when `LINETAG_LOG` is unset or empty
fn directives(trace: bool, env: Option<&str>) -> String {
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(env) => env.to_string(),
        None if trace => "warn,linetag=debug".to_string(),
        None => "warn".to_string(),
    }
}

/// Install the global subscriber; a second call does nothing
pub fn init(trace: bool) {
    let env = std::env::var(LOG_ENV).ok();
    let filter = EnvFilter::try_new(directives(trace, env.as_deref())).unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_layer = fmt::layer()
        .compact()
        .with_target(true)
        .without_time()
        .with_writer(io::stderr)
        .with_filter(filter);

    let _ = tracing_subscriber::registry().with(stderr_layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives() {
        assert_eq!(directives(false, None), "warn");
        assert_eq!(directives(true, None), "warn,linetag=debug");
        assert_eq!(directives(true, Some("  ")), "warn,linetag=debug");
        assert_eq!(directives(false, Some("linetag::driver=trace")), "linetag::driver=trace");
    }

    #[test]
    fn test_directives_parse() {
        for trace in [false, true] {
            assert!(EnvFilter::try_new(directives(trace, None)).is_ok());
        }
    }
}
