pub mod classifier;
pub mod cli;
pub mod dns;
pub mod error;
pub mod iface;
pub mod intelligent;
pub mod model;
pub mod orchestrator;
pub mod osadapt;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod render;
pub mod services;
pub mod util;
pub mod vendor;

use anyhow::Result;

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();
}

pub async fn run() -> Result<()> {
    init_logging();
    cli::run().await
}
