//! CLI argument structures
//!
//! [`Cli`] mirrors [`Options`] flag for flag; paired `--x`/`--no-x` flags
//! override each other, the last one given wins.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{Concurrency, Options};

/// Run linters and formatters against staged git files
#[derive(Parser, Debug)]
#[command(name = "stagegate")]
#[command(about = "stagegate - Run tasks against staged git files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Allow an empty commit when tasks revert all staged changes
    #[arg(long)]
    pub allow_empty: bool,

    /// Run tasks against all tracked files instead of the staged ones
    #[arg(long, conflicts_with_all = ["diff", "diff_filter"])]
    pub all: bool,

    /// Path to the configuration file
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of tasks to run concurrently, or `false` to run them serially
    #[arg(long, value_name = "BOOL|N", default_value = "true")]
    pub concurrent: Concurrency,

    /// Working directory to run all tasks in
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Print debug output
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Override the default `--staged` flag of `git diff` to get the list of files
    #[arg(long, value_name = "RANGE")]
    pub diff: Option<String>,

    /// Override the default `--diff-filter=ACMR` flag of `git diff`
    #[arg(long, value_name = "CHARS")]
    pub diff_filter: Option<String>,

    /// Maximum length of the command-line argument string
    #[arg(long, value_name = "N")]
    pub max_arg_length: Option<usize>,

    /// Enable the backup stash
    #[arg(long, overrides_with = "no_stash")]
    pub stash: bool,

    /// Disable the backup stash and don't revert in case of errors
    #[arg(long, overrides_with = "stash")]
    pub no_stash: bool,

    /// Hide unstaged changes from partially staged files
    #[arg(long, overrides_with = "no_hide_partially_staged")]
    pub hide_partially_staged: bool,

    /// Don't hide unstaged changes from partially staged files
    #[arg(long, overrides_with = "hide_partially_staged")]
    pub no_hide_partially_staged: bool,

    /// Disable stagegate's own console output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Pass file paths relative to the configuration directory to tasks
    #[arg(short = 'r', long)]
    pub relative: bool,

    /// Skip parsing of tasks for better shell support
    #[arg(short = 'x', long)]
    pub shell: bool,

    /// Show task output even when tasks succeed
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl Cli {
    pub fn into_options(self) -> Options {
        Options {
            allow_empty: self.allow_empty,
            all: self.all,
            concurrent: self.concurrent,
            config_path: self.config,
            config: None,
            cwd: self.cwd,
            debug: self.debug,
            diff: self.diff,
            diff_filter: self.diff_filter,
            max_arg_length: self.max_arg_length,
            quiet: self.quiet,
            relative: self.relative,
            shell: self.shell,
            stash: toggle(self.stash, self.no_stash),
            hide_partially_staged: toggle(
                self.hide_partially_staged,
                self.no_hide_partially_staged,
            ),
            verbose: self.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Options {
        let mut argv = vec!["stagegate"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().into_options()
    }

    #[test]
    fn test_defaults() {
        let options = parse(&[]);
        assert_eq!(options.concurrent, Concurrency::Parallel);
        assert_eq!(options.stash, None);
        assert_eq!(options.hide_partially_staged, None);
        assert!(options.stash_enabled());
    }

    #[test]
    fn test_flags_map_to_options() {
        let options = parse(&[
            "-c",
            "custom.json",
            "--concurrent",
            "2",
            "--diff",
            "main...HEAD",
            "--diff-filter",
            "AM",
            "--max-arg-length",
            "4096",
            "-q",
            "-r",
            "-x",
            "-v",
        ]);

        assert_eq!(options.config_path, Some(PathBuf::from("custom.json")));
        assert_eq!(options.concurrent, Concurrency::Limit(2));
        assert_eq!(options.diff.as_deref(), Some("main...HEAD"));
        assert_eq!(options.diff_filter.as_deref(), Some("AM"));
        assert_eq!(options.max_arg_length, Some(4096));
        assert!(options.quiet && options.relative && options.shell && options.verbose);
    }

    #[test]
    fn test_last_toggle_wins() {
        assert_eq!(parse(&["--no-stash"]).stash, Some(false));
        assert_eq!(parse(&["--no-stash", "--stash"]).stash, Some(true));
        assert_eq!(parse(&["--stash", "--no-stash"]).stash, Some(false));
        assert_eq!(
            parse(&["--no-hide-partially-staged"]).hide_partially_staged,
            Some(false)
        );
    }

    #[test]
    fn test_concurrent_false_is_sequential() {
        assert_eq!(parse(&["--concurrent", "false"]).concurrent, Concurrency::Sequential);
        assert!(Cli::try_parse_from(["stagegate", "--concurrent", "many"]).is_err());
    }

    #[test]
    fn test_all_conflicts_with_diff() {
        assert!(Cli::try_parse_from(["stagegate", "--all", "--diff", "HEAD~1"]).is_err());
        assert!(Cli::try_parse_from(["stagegate", "--all", "--diff-filter", "M"]).is_err());
        assert!(parse(&["--all"]).all);
    }
}
