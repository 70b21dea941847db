use std::net::SocketAddr;
use std::path::PathBuf;

use campusnav_server::ServerConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Campus navigation server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the bind address from the configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Overrides the floor-plan catalog path from the configuration
    #[arg(long)]
    floor_plans: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(floor_plans) = args.floor_plans {
        config.floor_plans = floor_plans;
    }

    campusnav_server::serve(config).await
}
