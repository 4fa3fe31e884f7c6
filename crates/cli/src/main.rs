use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wagate")]
#[command(about = "WhatsApp Cloud API webhook gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json (never overwrites).
    Init {
        /// Config file path (default: WAGATE_CONFIG_PATH or ~/.wagate/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the gateway: webhook verification and receipt, send endpoints, health.
    Gateway {
        /// Config file path (default: WAGATE_CONFIG_PATH or ~/.wagate/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from PORT, config, or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Report which WhatsApp credentials are loaded (secrets masked). Exits 1 when any is missing.
    CheckEnv {
        /// Config file path (default: WAGATE_CONFIG_PATH or ~/.wagate/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // .env is optional; real environment variables win.
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("wagate {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::CheckEnv { config }) => match run_check_env(config) {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                log::error!("check-env failed: {:#}", e);
                std::process::exit(1);
            }
        },
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(wagate::config::default_config_path);
    let dir = wagate::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = wagate::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = Some(p);
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port(),
        path.display()
    );
    wagate::gateway::run_gateway(config).await
}

/// Print the credential report. Ok(false) when a required value is missing.
fn run_check_env(config_path: Option<PathBuf>) -> anyhow::Result<bool> {
    let (config, path) = wagate::config::load_config(config_path)?;
    println!("config: {}", path.display());
    let report = wagate::config::credential_report(&config);
    for status in &report {
        match &status.display {
            Some(display) => println!("  {:<30} loaded   {} (length {})", status.name, display, status.len),
            None => println!("  {:<30} MISSING", status.name),
        }
    }
    println!(
        "  {:<30} {}",
        "WHATSAPP_APP_SECRET",
        if config.whatsapp.app_secret.is_some() {
            "loaded (signatures verified)"
        } else {
            "not set (signatures not verified)"
        }
    );
    println!("  {:<30} {}", "WHATSAPP_API_BASE_URL", config.whatsapp.api_base_url);

    let missing: Vec<&str> = report.iter().filter(|s| !s.loaded()).map(|s| s.name).collect();
    if missing.is_empty() {
        println!("all required credentials loaded");
        Ok(true)
    } else {
        println!("missing: {}", missing.join(", "));
        Ok(false)
    }
}
