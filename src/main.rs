//! Entry point for the ELD planner binary.
//!
//! Running this binary starts an HTTP server that plans trips for the
//! route planner front end.  Configuration comes from `ELD_*`
//! environment variables (see [`eld_planner::config`]); log verbosity is
//! controlled with `RUST_LOG`.

use eld_planner::{api, config::Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    api::serve(config).await
}
