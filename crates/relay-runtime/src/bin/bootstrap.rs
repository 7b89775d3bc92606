//! Function runtime entry point.

use relay_runtime::{CommandLoader, EventLoop, RuntimeConfig, RuntimeError, RuntimeResult};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = start().await {
        error!(error = %e, error_type = e.error_type(), "runtime terminated");
        std::process::exit(e.exit_code());
    }
}

async fn start() -> RuntimeResult<()> {
    let config = RuntimeConfig::from_env()?;

    if let Some(cache_dir) = &config.cache_dir {
        if !cache_dir.is_dir() {
            return Err(RuntimeError::Config {
                message: format!("cache directory {} does not exist", cache_dir.display()),
            });
        }
        info!(cache_dir = %cache_dir.display(), "using relocated cache");
    }

    let loader = CommandLoader::new(config.task_root.clone());
    let event_loop = EventLoop::new(&config, loader)?;
    match event_loop.run().await? {}
}
