//! Tracing subscriber setup for the command line.
//!
//! `RUST_LOG` wins when set. Otherwise the crate logs warnings, or
//! everything down to `debug` with `--verbose`, and dependencies stay at
//! `warn` so reqwest and hyper don't drown the output.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "warn" };
    format!("warn,{CRATE_TARGET}={level}")
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

pub fn init_logging(verbose: bool) {
    let installed = tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time().with_writer(std::io::stderr))
        .with(filter(verbose))
        .try_init();
    if let Err(e) = installed {
        eprintln!("Logging already initialised: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives(false), "warn,stockdash=warn");
        assert_eq!(default_directives(true), "warn,stockdash=debug");
    }
}
