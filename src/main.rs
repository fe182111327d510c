use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use stackctl::config::Config;
use stackctl::context::DeployContext;
use stackctl::deploy::{confirm, Deployer, Outcome};
use stackctl::ops::cluster::HelmClusterOps;
use stackctl::ops::datatier::HelmDataTierOps;
use stackctl::ops::infra::TerraformProvisioner;
use stackctl::progress::ConsoleReporter;
use stackctl::state::{DeploymentState, StateStore};
use stackctl::teardown::{Teardown, TeardownOptions};
use stackctl::{logging, plan};

#[derive(Parser)]
#[command(name = "stackctl")]
#[command(about = "Declarative deployment orchestrator for Kubernetes application stacks")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the stack described by the config file
    Deploy {
        /// Skip confirmation prompts and roll back failed steps automatically
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Tear down deployed components
    Destroy {
        /// Also destroy the cluster infrastructure
        #[arg(long)]
        cluster: bool,

        /// Skip confirmation prompts
        #[arg(short, long)]
        force: bool,
    },

    /// Show the persisted deployment state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;
    if let Some(ref path) = logging_handle.log_file_path {
        tracing::info!(path = %path.display(), "logging to file");
    }

    match cli.command {
        Commands::Deploy { yes } => cmd_deploy(config, yes).await,
        Commands::Destroy { cluster, force } => cmd_destroy(config, cluster, force).await,
        Commands::Status => cmd_status(&config),
    }
}

async fn cmd_deploy(config: Config, yes: bool) -> Result<()> {
    let store = StateStore::new(config.state_path());
    let state = match store.load()? {
        Some(state) => {
            if state.project != config.project {
                anyhow::bail!(
                    "state file belongs to project '{}', config says '{}': refusing to mix deployments",
                    state.project,
                    config.project
                );
            }
            tracing::info!(project = %state.project, "resuming from existing state");
            state
        }
        None => DeploymentState::new(&config.project),
    };

    let plan = plan::build_plan(&config, &state);
    let mut ctx = DeployContext::new(
        config,
        state,
        store,
        Arc::new(TerraformProvisioner),
        Arc::new(HelmClusterOps),
        Arc::new(HelmDataTierOps),
        Arc::new(ConsoleReporter),
    );

    // Ctrl-C stops the run between steps; the in-flight step finishes
    let cancel_flag = ctx.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            cancel_flag.store(true, Ordering::SeqCst);
        }
    });

    let mut deployer = Deployer::new(yes);
    match deployer.execute(&plan, &mut ctx).await? {
        Outcome::Completed | Outcome::Declined | Outcome::Cancelled => Ok(()),
    }
}

async fn cmd_destroy(config: Config, cluster: bool, force: bool) -> Result<()> {
    if !force {
        println!("This removes every deployed component of '{}'.", config.project);
        if cluster {
            println!("The cluster infrastructure will also be destroyed.");
        }
        if !confirm("Continue?")? {
            println!("Cancelled");
            return Ok(());
        }
    }

    let teardown = Teardown::new(
        Arc::new(HelmClusterOps),
        Arc::new(TerraformProvisioner),
        StateStore::new(config.state_path()),
        Arc::new(ConsoleReporter),
    );
    let options = TeardownOptions {
        destroy_cluster: cluster,
        force,
    };
    teardown.run(&config, options).await
}

fn cmd_status(config: &Config) -> Result<()> {
    let store = StateStore::new(config.state_path());
    let Some(state) = store.load()? else {
        println!("No deployment state found for '{}'", config.project);
        return Ok(());
    };

    println!("Project:      {}", state.project);
    println!("Deployment:   {}", state.deployment_id);
    println!("Created:      {}", state.created_at);
    println!("Last updated: {}", state.updated_at);
    println!();

    if state.infrastructure_ready() {
        let infra = &state.infrastructure;
        println!(
            "Infrastructure: {} ({}, {} nodes)",
            infra.cluster_name, infra.region, infra.node_count
        );
        println!("  Endpoint: {}", infra.endpoint);
    } else {
        println!("Infrastructure: not provisioned");
    }

    if state.database_ready() {
        println!(
            "Database: {} at {}:{}/{}",
            state.database.engine, state.database.host, state.database.port, state.database.name
        );
    } else {
        println!("Database: not deployed");
    }

    if state.app_deployed() {
        println!(
            "Application: v{} ({} replicas) {}",
            state.app.version, state.app.replicas, state.app.url
        );
    } else {
        println!("Application: not deployed");
    }

    if state.monitoring_ready() {
        println!("Monitoring: {}", state.monitoring.dashboard_url);
    }
    if let Some(ref endpoint) = state.endpoint {
        println!("Public endpoint: {endpoint}");
    }

    Ok(())
}
