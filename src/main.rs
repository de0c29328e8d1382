use aof_redis::server::RedisServer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "aof_redis=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = RedisServer::new(std::env::args())?;
    server.run().await
}
