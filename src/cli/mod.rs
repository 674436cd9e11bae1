//! Command-line entry
//!
//! Argument parsing lives in [`args`]; the binary converts the parsed
//! [`Cli`] into [`Options`](crate::config::Options) and hands over to
//! [`crate::orchestrator::run`].

pub mod args;

pub use args::Cli;

/// Default log filter for the binary; `RUST_LOG` overrides it unless `--debug` is given
pub fn get_log_level(debug: bool) -> &'static str {
    if debug {
        "stagegate=debug"
    } else {
        "warn"
    }
}
