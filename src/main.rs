//! playbook-bridge - run ansible-playbook and make sense of its output
//!
//! This is the main entry point for the playbook-bridge CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use playbook_bridge::config::Config;
use playbook_bridge::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; an explicitly named file must load
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            eprintln!("Error: Failed to load config: {}", e);
            std::process::exit(e.exit_code());
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}", e);
            Config::default()
        }
    };

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &config.logging.level);

    if cli.verbosity() >= 2 {
        eprintln!("playbook-bridge v{}", VERSION);
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let result = match &cli.command {
        Commands::Run(args) => args.execute(&mut ctx).await,
        Commands::Args(args) => args.execute(&mut ctx).await,
        Commands::Analyze(args) => args.execute(&mut ctx).await,
        Commands::Query(args) => args.execute(&mut ctx).await,
        Commands::Hash(args) => args.execute(&mut ctx).await,
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            e.downcast_ref::<Error>().map_or(1, Error::exit_code)
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, default_level: &str) {
    let filter = match verbosity {
        0 => default_level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}
