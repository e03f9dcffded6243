use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use xrefs::cli::{Cli, Commands};
use xrefs::commands::resolve::ResolveArgs;
use xrefs::config::Config;
use xrefs::logging::init_logging;
use xrefs::metrics;

#[tokio::main]
async fn main() -> Result<()> {
    let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let config = match Config::load(&root) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring unreadable configuration: {:#}", e);
            Config::default()
        }
    };

    // The guard must outlive every log call
    let _logging_guard = init_logging(&config.logging, &root)?;

    tracing::debug!("Loaded configuration from: {}", root.display());

    metrics::register_metrics()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            xrefs::commands::init::run(force).await?;
        }
        Commands::Resolve {
            fixture,
            repository,
            commit,
            path,
            line,
            character,
            limit,
            cursor,
            all,
            implementations,
            json,
            metrics,
        } => {
            let args = ResolveArgs {
                fixture,
                repository,
                commit,
                path,
                line,
                character,
                limit,
                cursor,
                all,
                implementations,
                json,
                metrics,
            };
            xrefs::commands::resolve::run(args, &config.resolver).await?;
        }
        Commands::Cursor { token } => {
            xrefs::commands::cursor::run(&token).await?;
        }
    }

    Ok(())
}
