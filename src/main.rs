//! Ingress Gateway
//!
//! Routes HTTP traffic according to Ingress resources of one ingress class.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌───────────────────────────── INGRESS GATEWAY ─────────────────────────────┐
//!   │                                                                           │
//!   │  ┌──────────┐   events   ┌────────────┐  get/done  ┌──────────────────┐   │
//!   │  │  watch   │──────────▶ │ work queue │──────────▶ │  reconciler × N  │   │
//!   │  │ (Ingress)│            └────────────┘            └────────┬─────────┘   │
//!   │  └────┬─────┘                 ▲  requeue w/ backoff         │ upsert /    │
//!   │       │ get_by_key            └─────────────────────────────┤ remove      │
//!   │       └─────────────────────────────────────────────────────┤             │
//!   │                                                             ▼             │
//!   │                                                    ┌────────────────┐     │
//!   │  Client ─────▶ http server ─────▶ dispatcher ────▶ │ routing table  │     │
//!   │                                       │            └────────────────┘     │
//!   │                                       ├── miss → 404 page                 │
//!   │                                       └── hit  → reverse proxy ──────────┼──▶ service.ns:port
//!   └───────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use ingress_gateway::config::loader::{read_config, ConfigError};
use ingress_gateway::config::validation::validate_config;
use ingress_gateway::lifecycle::startup;
use ingress_gateway::observability::logging;
use ingress_gateway::GatewayConfig;

const LONG_VERSION: &str = "0.1.0, exact host+path routing to service.namespace:port";
const SHORT_VERSION: &str = "0.1.0";

#[derive(Parser)]
#[command(name = "ingress-gateway")]
#[command(about = "Ingress controller and HTTP gateway for one ingress class", long_about = None)]
#[command(version = SHORT_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the ingress controller and HTTP gateway
    Ingress(IngressArgs),
    /// Print version information
    Version {
        /// Show long mode version information
        #[arg(long)]
        long: bool,
    },
}

#[derive(Args)]
struct IngressArgs {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the kubeconfig file
    #[arg(long)]
    kubeconfig_path: Option<String>,

    /// API server URL
    #[arg(long)]
    master: Option<String>,

    /// Ingress class this gateway serves
    #[arg(long)]
    ingress_class_name: Option<String>,

    /// Gateway listen address
    #[arg(long)]
    http_addr: Option<String>,

    /// Number of reconciler workers
    #[arg(long)]
    workers: Option<usize>,
}

impl IngressArgs {
    fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GatewayConfig::default(),
        };

        if let Some(path) = self.kubeconfig_path {
            config.kube.kubeconfig_path = Some(path);
        }
        if let Some(master) = self.master {
            config.kube.master = Some(master);
        }
        if let Some(class) = self.ingress_class_name {
            config.controller.ingress_class = class;
        }
        if let Some(addr) = self.http_addr {
            config.listener.bind_address = addr;
        }
        if let Some(workers) = self.workers {
            config.controller.workers = workers;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let args = match cli.command {
        Commands::Version { long } => {
            if long {
                println!("{}", LONG_VERSION);
            } else {
                println!("ingress-gateway version {}", SHORT_VERSION);
            }
            return Ok(());
        }
        Commands::Ingress(args) => args,
    };

    let config = args.into_config()?;
    logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        ingress_class = %config.controller.ingress_class,
        workers = config.controller.workers,
        "Configuration loaded"
    );

    startup::run(config).await?;
    Ok(())
}
