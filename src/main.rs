use clap::{Parser, Subcommand};
use shardcore::cluster::{self, ClusterContextManagerBuilder};
use shardcore::config::NodeConfig;
use shardcore::error::{ErrorCode, ErrorExt};
use shardcore::ShardError;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace};
use tracing_subscriber::EnvFilter;

/// Execution and cluster coordination node for sharded databases
#[derive(Parser)]
#[command(name = "shardcore")]
#[command(about = "Sharding middleware node: distributed execution and cluster coordination", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the cluster and run until interrupted
    Start {
        /// Path to the node configuration (toml, yaml or json)
        #[arg(short = 'c', long)]
        config: PathBuf,
    },
    /// Validate a configuration and print it fully resolved
    CheckConfig {
        /// Path to the node configuration (toml, yaml or json)
        #[arg(short = 'c', long)]
        config: PathBuf,
    },
}

impl Commands {
    fn config_path(&self) -> &Path {
        match self {
            Commands::Start { config } | Commands::CheckConfig { config } => config,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration problems surface after logging is up
    let loaded = load_config(cli.command.config_path());
    let default_level = loaded
        .as_ref()
        .map(|config| config.log.level.to_lowercase())
        .unwrap_or_else(|_| "info".to_string());

    let log_level = match cli.verbose {
        0 => default_level,
        1 => "debug".to_string(),
        2 => "trace".to_string(),
        _ => "trace,tokio=debug".to_string(), // -vvv shows everything including dependencies
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .init();

    debug!("shardcore started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match loaded {
        Ok(config) => match cli.command {
            Commands::Start { .. } => run_start(config).await,
            Commands::CheckConfig { .. } => run_check_config(&config),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("Fatal error: {}", e);
        eprintln!("Error: {}", e.user_message());
        std::process::exit(e.exit_code());
    }
}

fn load_config(path: &Path) -> Result<NodeConfig, ShardError> {
    let mut config = NodeConfig::load(path)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn run_check_config(config: &NodeConfig) -> Result<(), ShardError> {
    let rendered = serde_yaml::to_string(config)
        .to_config_error(ErrorCode::CONFIG_GENERIC, "failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

async fn run_start(config: NodeConfig) -> Result<(), ShardError> {
    let manager = ClusterContextManagerBuilder::new(config).build().await?;
    cluster::global::install_manager(&manager).await?;
    let instance = manager.instance_context().clone();

    info!(
        "Instance {} ({} {}) online with worker id {}",
        instance.id(),
        instance.instance().instance_type,
        instance.instance().attributes(),
        instance.worker_id()
    );
    info!(
        "Cluster state {}, {} peers, databases: {:?}",
        instance.cluster_state().await,
        instance.peers().await.len(),
        manager.metadata().database_names().await
    );

    let waited = tokio::signal::ctrl_c()
        .await
        .to_shard_error("failed to listen for shutdown signal");
    info!("Shutting down");

    cluster::global::teardown();
    let stopped = manager.shutdown().await;
    waited?;
    stopped?;
    Ok(())
}
