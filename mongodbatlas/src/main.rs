use clap::{Parser, Subcommand};
use mongodbatlas::refresh::{cluster_refresh, project_dependents_lister};
use mongodbatlas::{AtlasProvider, ClusterState, ProviderConfig};
use std::env;
use std::time::Duration;
use tfretry::{gate_conf, Context, DependentsGate, StateChangeConf};

#[derive(Parser)]
#[command(name = "mongodbatlas-wait")]
#[command(about = "Waits for MongoDB Atlas resources to settle", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wait until a cluster is IDLE
    Cluster {
        project_id: String,
        cluster_name: String,
        /// Give up after this many seconds
        #[arg(default_value_t = 3 * 60 * 60)]
        timeout_secs: u64,
    },
    /// Wait until no cluster of a project is DELETING
    Dependents {
        project_id: String,
        /// Give up after this many seconds
        #[arg(default_value_t = 30 * 60)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let level = if env::var_os("MONGODB_ATLAS_DEBUG").is_some() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = ProviderConfig::from_env()?;
    let mut provider = AtlasProvider::new();
    let data = provider.configure(&config)?;
    let ctx = Context::new();

    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling wait");
            interrupt.cancel();
        }
    });

    match cli.command {
        Command::Cluster {
            project_id,
            cluster_name,
            timeout_secs,
        } => {
            let conf = StateChangeConf::new(
                [
                    ClusterState::Creating,
                    ClusterState::Updating,
                    ClusterState::Repairing,
                    ClusterState::Repeating,
                    ClusterState::Pending,
                ],
                [ClusterState::Idle],
            )
            .timeout(Duration::from_secs(timeout_secs))
            .min_timeout(Duration::from_secs(30));

            let result = conf
                .wait_for_state(
                    &ctx,
                    data.clock.as_ref(),
                    cluster_refresh(&data.client, &project_id, &cluster_name),
                )
                .await?;
            tracing::info!("MongoDB cluster {} is {}", cluster_name, result.final_state);
        }
        Command::Dependents {
            project_id,
            timeout_secs,
        } => {
            let gate = DependentsGate::new(
                project_id.as_str(),
                project_dependents_lister(&data.client, &project_id),
            );
            let clusters = gate
                .wait(
                    &ctx,
                    data.clock.as_ref(),
                    gate_conf(Duration::from_secs(timeout_secs), Duration::from_secs(30)),
                )
                .await?;
            tracing::info!(
                "No cluster of project {} is deleting ({} listed)",
                project_id,
                clusters.len()
            );
        }
    }

    Ok(())
}
