use clap::Parser;
use log::info;
use server::network::GameServer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the UDP socket to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "9000")]
    port: u16,

    /// Endpoint advertised to the central and peers; defaults to the
    /// bound address, which is only useful when binding a concrete host
    #[arg(long)]
    public: Option<String>,

    /// Base URL of the central coordinator
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    central: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let server = GameServer::bind(&addr, args.public, &args.central).await?;
    info!("Central coordinator at {}", args.central);

    server.run().await?;
    Ok(())
}
