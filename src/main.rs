use clap::Parser;
use cnxpool::config::Config;
use cnxpool::{CnxPoolError, ConnectionPool, Result, TcpDialer};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cnxpool")]
#[command(about = "Keep a pool of health-checked connections to an upstream", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Upstream address as host:port (overrides config)
    #[arg(long)]
    address: Option<String>,

    /// Idle pool capacity (overrides config)
    #[arg(long)]
    capacity: Option<usize>,

    /// Generate example configuration file
    #[arg(long, value_name = "FILE")]
    generate_config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds between pool reports
    #[arg(long, default_value_t = 5)]
    report_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle config generation
    if let Some(config_path) = args.generate_config {
        println!("Generating example configuration file: {:?}", config_path);
        Config::create_example(&config_path)?;
        println!("Example configuration file created successfully!");
        println!("Edit the file and run: cnxpool --config {:?}", config_path);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(address) = args.address {
        config.upstream.address = address;
    }
    if let Some(capacity) = args.capacity {
        config.pool.capacity = capacity;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config.logging.level, &config.logging.format)?;

    info!("cnxpool v{} starting", env!("CARGO_PKG_VERSION"));
    match &args.config {
        Some(path) => info!("Loaded configuration from: {:?}", path),
        None => info!("No configuration file specified, using defaults"),
    }

    let dialer =
        TcpDialer::resolve(&config.upstream.address, config.upstream.connect_timeout()).await?;
    info!(
        "Filling pool of {} connections to {}",
        config.pool.capacity,
        dialer.addr()
    );
    let pool = ConnectionPool::new(dialer, config.pool.clone()).await?;

    let report_every = Duration::from_secs(args.report_interval_secs.max(1));
    let mut ticker = tokio::time::interval(report_every);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutting down gracefully...");
                break;
            }
            _ = ticker.tick() => {
                // Cycle one connection so release and probing are exercised
                match pool.acquire().await {
                    Ok(conn) => conn.release(),
                    Err(e) => warn!("Acquire failed: {}", e),
                }

                let stats = pool.stats();
                info!(
                    idle = stats.idle,
                    capacity = stats.capacity,
                    dialed = stats.dialed,
                    reused = stats.reused,
                    probes_passed = stats.probes_passed,
                    probes_failed = stats.probes_failed,
                    discarded_full = stats.discarded_full,
                    "Pool report"
                );
            }
        }
    }

    pool.close().await;
    info!("Shutdown complete");

    Ok(())
}

fn init_logging(level: &str, format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(level)
        .map_err(|e| CnxPoolError::Config(format!("Invalid log level: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    Ok(())
}
