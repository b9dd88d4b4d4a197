use central::{routes, CentralState};
use clap::Parser;
use log::info;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the HTTP listener to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Game-server membership list, comma separated
    #[arg(
        long,
        env = "GAME_SERVERS",
        value_delimiter = ',',
        default_value = "127.0.0.1:9000"
    )]
    servers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    info!("Central coordinator starting on {}", addr);
    info!("Game servers: {}", args.servers.join(", "));

    let state = Arc::new(CentralState::new(args.servers));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, routes::app(state)).await?;

    Ok(())
}
