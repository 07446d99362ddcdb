//! Race control server
//!
//! Configuration comes from the environment; see `ServerConfig::from_env`.

use pitlane_transport::{serve, LogFormat, ServerConfig};
use tracing_subscriber::EnvFilter;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Logging is not set up yet
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    init_logging(config.log_format);

    if let Err(e) = serve(config).await {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}
