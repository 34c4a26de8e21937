//! Weft CLI - find out which items in a portal organization use which services
//!
//! ```bash
//! weft sign-in --token <TOKEN>
//! weft scan --access public
//! weft scan --related https://gis.example.com/arcgis/rest/services/Parcels/MapServer
//! weft serve
//! ```

use clap::{Args, Parser, Subcommand};
use tracing::error;
use weft_core::{Access, ServiceFilter};

mod commands;
mod config;

use commands::{CliResult, OutputFormat};
use config::WeftConfig;

/// Weft - service usage crawler for GIS portal organizations
#[derive(Parser)]
#[command(name = "weft")]
#[command(author = "Weft Team")]
#[command(version)]
#[command(about = "Maps which portal items consume which service URLs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Portal base URL (overrides WEFT_PORTAL_URL and weft.toml)
    #[arg(long, global = true)]
    portal: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a portal token and keep it for later runs
    SignIn {
        /// Token issued by the portal (defaults to WEFT_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },

    /// Forget the stored token
    SignOut,

    /// Show who the current credentials sign in as
    Whoami,

    /// Crawl the organization and print its services
    Scan {
        #[command(flatten)]
        filter: FilterArgs,

        /// Also list the items related to this service URL
        #[arg(long)]
        related: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Crawl in the background and browse results in the dashboard
    Serve {
        /// Dashboard port (overrides WEFT_DASHBOARD_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// At most one filter applies at a time
#[derive(Args)]
#[group(multiple = false)]
struct FilterArgs {
    /// Only services first seen on items with this access (public, org, shared, private)
    #[arg(long)]
    access: Option<Access>,

    /// Only services first seen on items owned by this user
    #[arg(long)]
    owner: Option<String>,

    /// Only services hosted on this origin, e.g. https://gis.example.com
    #[arg(long)]
    server: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> CliResult<ServiceFilter> {
        Ok(ServiceFilter::from_parts(self.access, self.owner, self.server)?)
    }
}

#[tokio::main]
async fn main() {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,weft_core=info,weft=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration (defaults + env + optional TOML overlay)
    let mut cfg = WeftConfig::load();
    if let Some(portal) = cli.portal {
        cfg.portal.portal_url = portal;
    }

    if let Err(e) = run(cli.command, cfg).await {
        error!(target: "weft", error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, mut cfg: WeftConfig) -> CliResult<()> {
    match command {
        Commands::SignIn { token } => commands::sign_in(&cfg, token).await,
        Commands::SignOut => commands::sign_out(&cfg),
        Commands::Whoami => commands::whoami(&cfg).await,
        Commands::Scan {
            filter,
            related,
            format,
        } => commands::scan(&cfg, filter.into_filter()?, related, format).await,
        Commands::Serve { port } => {
            if let Some(port) = port {
                cfg.dashboard.port = port;
            }
            commands::serve(&cfg).await
        }
    }
}
