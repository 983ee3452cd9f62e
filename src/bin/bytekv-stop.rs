use anyhow::Result;
use bytekv::Client;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bytekv-stop")]
#[command(about = "Ask a running bytekv server to shut down")]
#[command(version)]
struct Args {
    /// Server hostname
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, default_value_t = 8001)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut client = Client::connect(format!("{}:{}", args.host, args.port)).await?;
    client.shutdown_server().await?;
    println!("server at {}:{} acknowledged stop", args.host, args.port);

    Ok(())
}
