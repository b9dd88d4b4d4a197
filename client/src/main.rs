use clap::Parser;
use client::Session;
use log::{info, warn};
use shared::ChunkId;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the central coordinator
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    central: String,

    /// Player identifier
    #[arg(short, long, default_value = "player-1")]
    player_id: String,

    /// Seconds between wander ticks
    #[arg(short, long, default_value = "2")]
    tick: u64,
}

/// Wandering bot: joins, claims its spawn chunk, then walks diagonally
/// across the world, re-fetching whenever it crosses a chunk boundary and
/// polling for updates every third tick.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let mut session = Session::new(&args.central, &args.player_id)?;

    session.join().await?;
    session.get_data().await?;
    info!(
        "Player {} in chunk {} on {}",
        session.player.id, session.current_chunk, session.server_ip
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(args.tick));
    let mut frame: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down, deleting player {}", session.player.id);
                if let Err(err) = session.leave().await {
                    warn!("Cleanup failed: {}", err);
                }
                return Ok(());
            }

            _ = ticker.tick() => {
                frame += 1;

                let x = (session.player.pos_x + 1).clamp(0, 500);
                let y = (session.player.pos_y + 1).clamp(0, 500);

                // Crossing a chunk boundary means greeting the new
                // chunk's owner before reporting position there.
                if ChunkId::containing(x, y) != session.current_chunk {
                    session.player.pos_x = x;
                    session.player.pos_y = y;
                    match session.get_data().await {
                        Ok(_) => info!(
                            "Entered chunk {} on {}",
                            session.current_chunk, session.server_ip
                        ),
                        Err(err) => {
                            warn!("Chunk transition failed: {}", err);
                            continue;
                        }
                    }
                }

                if let Err(err) = session.move_to(x, y).await {
                    warn!("Move update failed: {}", err);
                    continue;
                }

                if frame % 3 == 0 {
                    match session.updates().await {
                        Ok(Some(chunk)) => info!(
                            "Chunk {} has {} players and {} cubes",
                            session.current_chunk,
                            chunk.player_count(),
                            chunk.cells.len()
                        ),
                        Ok(None) => {}
                        Err(err) => warn!("Update poll failed: {}", err),
                    }
                }

                info!(
                    "Player {} at ({}, {}) in chunk {}",
                    session.player.id, session.player.pos_x, session.player.pos_y,
                    session.current_chunk
                );
            }
        }
    }
}
