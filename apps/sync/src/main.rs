mod config;
mod credentials;
mod main_lib;

use config::Config;
use main_lib::{build_reconciler, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let reconciler = build_reconciler(&config)?;
    let started = std::time::Instant::now();

    match reconciler.run().await {
        Ok(summary) => {
            tracing::info!(
                "Sync finished in {:.1}s: {}",
                started.elapsed().as_secs_f64(),
                summary.summary()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Sync aborted: {}", e);
            Err(e.into())
        }
    }
}
