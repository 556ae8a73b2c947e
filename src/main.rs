use clap::{Parser, Subcommand};
use imagify::{serve, EnvConfig};
use mimalloc::MiMalloc;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(version, about, arg_required_else_help(true))]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Imagify API server
    Serve,

    /// Check if an Imagify server is running at localhost
    Ready,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::from_env("IMAGIFY_LOG"))
        .init();

    match Cli::parse().command {
        Some(Command::Serve) => {
            info!("Imagify v{VERSION}");
            serve().await?
        }
        Some(Command::Ready) => {
            let health_port = EnvConfig::load()?.health_port;

            reqwest::Client::new()
                .get(format!("http://localhost:{health_port}/health/readiness"))
                .send()
                .await?
                .error_for_status()?;
        }
        None => {}
    }

    Ok(())
}
