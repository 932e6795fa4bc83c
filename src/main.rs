use clap::Parser;
use tracing::info;

use collab_rga::config::ServerConfig;
use collab_rga::server::{ServerContext, create_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::parse();
    let bind_addr = config.bind_addr.clone();
    let ctx = ServerContext::new(config);
    let app = create_router().with_state(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
