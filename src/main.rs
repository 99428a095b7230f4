use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use npm_dep_events::checkpoint::PendingRotation;
use npm_dep_events::collector::FeedConsumer;
use npm_dep_events::config::{self, CollectorConfig, DataPaths};
use npm_dep_events::events::rotate::{InProcessRotator, LogRotator};
use npm_dep_events::events::shards::active_log_number;
use npm_dep_events::feed::couch::CouchChangeFeed;
use npm_dep_events::logging;

#[derive(Parser)]
#[command(name = "npm-dep-events")]
#[command(
    version,
    about = "Collects dependency add/delete events from the npm registry change feed"
)]
struct Cli {
    /// Directory holding the checkpoint and event logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry replication endpoint
    #[arg(long)]
    registry: Option<String>,

    /// Stop before this feed sequence instead of the registry's current one
    #[arg(long)]
    end_sequence: Option<u64>,

    /// Number of change events prefetched ahead of processing
    #[arg(long)]
    concurrency: Option<usize>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Sort and shard an active event log left behind by a run that did not rotate it
    Rotate {
        /// Path to a dependency_events_<N>.csv file
        file: PathBuf,
    },
}

impl Cli {
    fn collector_config(&self) -> anyhow::Result<CollectorConfig> {
        let mut config = CollectorConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.registry {
            config.registry.url = url.clone();
        }
        if let Some(end) = self.end_sequence {
            config.end_sequence = Some(end);
        }
        if let Some(concurrency) = self.concurrency {
            config.registry.prefetch_concurrency = concurrency;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = DataPaths::new(cli.data_dir.clone().unwrap_or_else(config::data_dir));
    let _guard = logging::init(&paths.log_path(), cli.verbose)?;
    let config = cli.collector_config()?;

    match cli.command {
        Some(Command::Rotate { file }) => {
            let shards = InProcessRotator::new(&config.rotation).rotate(&file)?;
            info!("Rotated {:?} into {:?}", file, shards);
            let pending = PendingRotation::read(&paths)?;
            if pending.is_some_and(|p| active_log_number(&file) == Some(p.log_number)) {
                PendingRotation::clear(&paths)?;
            }
            Ok(())
        }
        None => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(collect(paths, config)),
    }
}

async fn collect(paths: DataPaths, config: CollectorConfig) -> anyhow::Result<()> {
    let feed = Arc::new(CouchChangeFeed::new(&config.registry.url)?);
    let rotator = Box::new(InProcessRotator::new(&config.rotation));

    let summary = FeedConsumer::new(feed, rotator, paths, &config).run().await?;
    info!(
        "Collected {} events through sequence {}",
        summary.stats.events, summary.sequence
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config_file() {
        let cli = Cli::parse_from([
            "npm-dep-events",
            "--registry",
            "http://localhost:5984/registry",
            "--end-sequence",
            "500",
            "--concurrency",
            "4",
        ]);

        let config = cli.collector_config().unwrap();

        assert_eq!(config.registry.url, "http://localhost:5984/registry");
        assert_eq!(config.end_sequence, Some(500));
        assert_eq!(config.registry.prefetch_concurrency, 4);
        assert_eq!(config.registry.batch_size, 100);
    }

    #[test]
    fn rotate_subcommand_takes_a_file() {
        let cli = Cli::parse_from([
            "npm-dep-events",
            "--data-dir",
            "/tmp/data",
            "rotate",
            "/tmp/data/events/dependency_events_3.csv",
        ]);

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/data")));
        assert!(matches!(
            cli.command,
            Some(Command::Rotate { file }) if file == PathBuf::from("/tmp/data/events/dependency_events_3.csv")
        ));
    }
}
