use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use platform_obs::{ObsConfig, init_tracing, shutdown_tracing};
use products_portal::LocalStore;
use server::{
    config::{AppConfig, DEFAULT_DATA_DIR},
    http::{self, AppState, ServeConfig},
    seed,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "floortype-ops", version, about = "Floortype operations server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Load and validate configuration, then print a summary.
    #[command(name = "check-config")]
    CheckConfig,
    /// Write demo orders and quotes into the local store.
    Seed {
        #[arg(long, env = "LOCAL_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
        dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing(ObsConfig::from_env("floortype-ops"))?;
    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Serve(cmd) => run_server(cmd).await,
        Command::CheckConfig => check_config(),
        Command::Seed { dir } => run_seed(dir).await,
    };
    shutdown_tracing();
    outcome
}

async fn run_server(cmd: ServeCommand) -> Result<()> {
    let state = AppState::new(AppConfig::load()?)?;
    http::serve(cmd.into(), state).await
}

fn check_config() -> Result<()> {
    let config = AppConfig::load()?;
    match &config.backend {
        Some(backend) => println!("backend:          {}", backend.url),
        None => println!(
            "backend:          local store at {}",
            config.local_data_dir.display()
        ),
    }
    println!("email api:        {}", config.mail.api_url);
    println!("admin email:      {}", config.admin_email);
    println!("contact email:    {}", config.contact_email);
    println!("portal url:       {}", config.portal_url);
    println!("completion:       {}", config.completion_policy);
    println!("http timeout:     {}s", config.http_timeout.as_secs());
    if config.cors_allowed_origins.is_empty() {
        println!("cors origins:     any");
    } else {
        println!("cors origins:     {}", config.cors_allowed_origins.join(", "));
    }
    Ok(())
}

async fn run_seed(dir: PathBuf) -> Result<()> {
    let (orders, quotes) = seed::seed_local(LocalStore::open(&dir)).await?;
    info!(dir = %dir.display(), orders, quotes, "seed complete");
    Ok(())
}
