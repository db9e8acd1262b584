//! # Command Line Interface
//!
//! Operator commands for inspecting the plan catalog, checking backends and
//! driving instance lifecycles by hand.

pub mod output;

use crate::config::BrokerConfig;
use crate::domain::instance::NewInstance;
use crate::observability::{init_logging, log_config_info};
use crate::startup;
use crate::utils::random_password;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "instance-broker")]
#[command(about = "Provision and bind logical database instances")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the plan catalog
    Plans,

    /// Connect to every shared backend and apply broker migrations
    Check,

    /// Create an instance
    Create {
        /// External instance id
        instance_id: String,

        /// Plan id to provision under
        #[arg(long)]
        plan: String,

        /// Organization the instance belongs to
        #[arg(long)]
        org: Option<String>,

        /// Space the instance belongs to
        #[arg(long)]
        space: Option<String>,
    },

    /// Print binding credentials for an instance as JSON
    Bind { instance_id: String },

    /// Delete an instance
    Delete { instance_id: String },

    /// Advance in-progress instances; all of them when no id is given
    Reconcile { instance_id: Option<String> },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Plans = cli.command {
        let catalog = startup::load_catalog()?;
        output::print_plans(catalog.plans());
        return Ok(());
    }

    let config = BrokerConfig::from_env()?;
    let mut observability = config.observability();
    if cli.verbose {
        observability.log_level = "debug".to_string();
    }
    init_logging(&observability)?;
    log_config_info(&config);

    match cli.command {
        Commands::Plans => {}

        Commands::Check => {
            let catalog = startup::load_catalog()?;
            let pool = startup::connect_backends(&catalog, &crate::storage::PgConnector).await?;
            startup::open_broker_database(&config, &catalog, &pool).await?;
            println!("Verified {} shared backend(s): {}", pool.len(), pool.plan_ids().join(", "));
            println!("Broker database is up to date");
        }

        Commands::Create { instance_id, plan, org, space } => {
            let service = startup::bootstrap(&config).await?;
            let mut request = NewInstance::new(instance_id, plan);
            request.org_guid = org;
            request.space_guid = space;

            let record = service.create_instance(request, &random_password()).await?;
            output::print_record(&record);
        }

        Commands::Bind { instance_id } => {
            let service = startup::bootstrap(&config).await?;
            let credentials = service.bind_instance(&instance_id).await?;
            println!("{}", serde_json::to_string_pretty(&credentials)?);
        }

        Commands::Delete { instance_id } => {
            let service = startup::bootstrap(&config).await?;
            let state = service.delete_instance(&instance_id).await?;
            println!("Instance '{}' is {}", instance_id, state);
        }

        Commands::Reconcile { instance_id: Some(instance_id) } => {
            let service = startup::bootstrap(&config).await?;
            let state = service.reconcile(&instance_id).await?;
            println!("Instance '{}' is {}", instance_id, state);
        }

        Commands::Reconcile { instance_id: None } => {
            let service = startup::bootstrap(&config).await?;
            let summary = service.reconcile_pending().await?;
            output::print_reconcile_summary(&summary);
        }
    }

    Ok(())
}
