use anyhow::Result;
use bytekv::{Port, Server, ServerConfig};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "bytekv-server")]
#[command(about = "bytekv server - sharded in-memory key-value store")]
#[command(version)]
struct Args {
    /// Network interface to listen on ("*" for all interfaces)
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port number
    #[arg(long, default_value_t = 8001)]
    port: u16,

    /// Let the OS pick an ephemeral port instead of --port
    #[arg(long)]
    auto_port: bool,

    /// Number of buckets
    #[arg(long, default_value_t = 100)]
    buckets: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting bytekv {}", bytekv::BUILD_INFO);

    let config = ServerConfig {
        bind: args.bind,
        port: if args.auto_port {
            Port::Auto
        } else {
            Port::Fixed(args.port)
        },
        buckets: args.buckets,
    };

    let server = Server::bind(&config).await?;
    tracing::info!("bound to {}", server.local_addr());

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown.shutdown();
        }
    });

    server.serve().await?;
    Ok(())
}
