//! OS simulator server binary

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use ossim_core::{MemoryAlgorithm, MemoryConfig};
use ossim_runtime::{Controller, RuntimeConfig};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ossim-server", version, about = "Educational OS simulator server")]
struct Args {
    /// Address to bind
    #[arg(long, env = "OSSIM_BIND", default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "OSSIM_PORT", default_value_t = 8080)]
    port: u16,

    /// Milliseconds between automatic ticks
    #[arg(long, env = "OSSIM_TICK_MS", default_value_t = 1000)]
    tick_ms: u64,

    /// Seed for I/O probability rolls
    #[arg(long, env = "OSSIM_SEED")]
    seed: Option<u64>,

    /// Memory size to initialize at startup
    #[arg(long, env = "OSSIM_MEMORY")]
    memory: Option<u64>,

    /// Allocation unit; sizes are rounded up to a multiple of it
    #[arg(long, env = "OSSIM_GRANULARITY", default_value_t = 1)]
    granularity: u64,

    /// Default placement policy (FIRST_FIT, BEST_FIT, WORST_FIT, SEGMENTATION)
    #[arg(long, env = "OSSIM_MEMORY_ALGORITHM", default_value = "FIRST_FIT")]
    memory_algorithm: String,
}

impl Args {
    fn runtime_config(&self) -> Result<RuntimeConfig, ossim_core::SimError> {
        Ok(RuntimeConfig {
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            seed: self.seed,
            memory: MemoryConfig {
                granularity: self.granularity.max(1),
                default_algorithm: MemoryAlgorithm::parse(&self.memory_algorithm)?,
            },
            initial_memory: self.memory,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let config = args.runtime_config()?;
    let controller = Controller::new(config)?;
    let app = ossim_server::router(controller);

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("╔═══════════════════════════════════════════════════╗");
    info!("║               OS Simulator Server                 ║");
    info!("╠═══════════════════════════════════════════════════╣");
    info!("║  URL: http://{:<37}║", addr);
    info!("║  Press Ctrl+C to stop                             ║");
    info!("╚═══════════════════════════════════════════════════╝");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
