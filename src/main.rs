//! Fleetcall - ad-hoc runs over an Ansible-compatible engine
//!
//! This is the main entry point for the Fleetcall CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use fleetcall::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    if cli.verbosity() >= 2 {
        eprintln!("fleetcall v{}", VERSION);
    }

    // Load configuration
    let config = Config::load(cli.config.as_ref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        Config::default()
    });

    let mut ctx = CommandContext::new(&cli, config);

    let outcome = match &cli.command {
        Commands::Adhoc(args) => args.execute(&mut ctx).await,
        Commands::Playbook(args) => args.execute(&mut ctx).await,
        Commands::ListHosts(args) => args.execute(&mut ctx).await,
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            e.downcast_ref::<fleetcall::Error>()
                .map(fleetcall::Error::exit_code)
                .unwrap_or(1)
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}
