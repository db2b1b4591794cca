use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use throttle_proxy::config::Config;
use throttle_proxy::config_validator::ConfigValidator;
use throttle_proxy::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "throttle-proxy")]
#[command(about = "Reverse proxy with per-route request throttling")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "PROXY_CONFIG", default_value = "proxy.json")]
    config: PathBuf,

    /// Overrides the configured bind address
    #[arg(long, env = "PROXY_BIND")]
    bind: Option<SocketAddr>,

    /// Overrides the configured worker pool size
    #[arg(long, env = "PROXY_WORKERS")]
    workers: Option<usize>,

    /// Overrides the configured log level
    #[arg(long, env = "PROXY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(workers) = self.workers {
            config.worker_threads = workers;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::from_file(&args.config).map_err(|e| {
        anyhow::anyhow!("Failed to load configuration from {}: {}", args.config.display(), e)
    })?;
    args.apply(&mut config);
    ConfigValidator::validate(&config).map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("throttle_proxy={},tower_http=debug", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting throttle proxy");
    tracing::info!(
        "Configuration: bind_address={}, workers={}, routes={}",
        config.bind_address,
        config.worker_threads,
        config.routes.len()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .thread_name("proxy-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let server = Server::new(&config)
            .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

        server
            .run()
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))
    })
}
