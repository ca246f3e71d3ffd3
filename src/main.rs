mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xref_indexer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(&cli)?;

    match cli.command {
        Commands::Import { repos, concurrency } => {
            let report = cli::import(config, repos.as_deref(), concurrency).await?;
            if report.succeeded == 0 && report.failed > 0 {
                anyhow::bail!("every import failed");
            }
        }
        Commands::Refs { path, repo, commit } => {
            cli::refs(config, &path, &repo, commit).await?;
        }
        Commands::History { path, repo } => {
            cli::history(config, &path, &repo).await?;
        }
        Commands::Resolve {
            range,
            versions,
            first,
        } => {
            cli::resolve(&range, &versions, first)?;
        }
        Commands::Edges { repo } => {
            cli::edges(&config, &repo)?;
        }
        Commands::Usages { package, version } => {
            cli::usages(&config, &package, version.as_deref())?;
        }
    }

    Ok(())
}
