use clap::Parser;
use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

use stagegate::cli::{get_log_level, Cli};
use stagegate::orchestrator;
use stagegate::report::Reporter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(get_log_level(true))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(get_log_level(false)))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(cli.debug)
        .init();

    debug!("stagegate started");
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let options = cli.into_options();
    let reporter = Reporter::stdout(options.quiet);

    if !orchestrator::run(&options, &reporter).await {
        std::process::exit(1);
    }
}
