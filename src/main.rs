use argos::{api, AppState, Config, OfflineExecutor};
use clap::Parser;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A.R.G.O.S - Asynchronous Research & General Orchestration Server
#[derive(Parser, Debug)]
#[command(
    name = "argos-server",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "A.R.G.O.S - Asynchronous Research & General Orchestration Server",
    long_about = "Accepts research requests over HTTP, tracks their lifecycle, fans out\n\
                  batches, and hosts live interactive research sessions over WebSocket."
)]
struct Cli {
    /// Host address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug,hyper=info"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env()
        .map_err(|err| anyhow::anyhow!("invalid configuration: {err}"))?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, Arc::new(OfflineExecutor::new()));

    let app = api::routes::create_router()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "A.R.G.O.S listening");
    axum::serve(listener, app).await?;

    Ok(())
}
