//! UDP request loop and protocol handlers for one game server.
//!
//! Each inbound datagram is decoded into a [`Request`] and handled on its
//! own task so a handler blocked on the central or a peer never stalls the
//! socket. Every datagram gets exactly one reply.

use crate::central::CentralClient;
use crate::store::{WriteOutcome, ZoneStore};
use log::{debug, error, info, warn};
use shared::{Chunk, ChunkId, Cube, Player, Request, Response, MAX_DATAGRAM, MERGE_DEADLINE};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Shared state every handler task works against.
pub struct ServerContext {
    pub store: ZoneStore,
    pub central: CentralClient,
}

impl ServerContext {
    pub fn new(store: ZoneStore, central: CentralClient) -> Self {
        Self { store, central }
    }
}

/// A bound game server ready to serve the chunk protocol.
pub struct GameServer {
    socket: Arc<UdpSocket>,
    ctx: Arc<ServerContext>,
}

impl GameServer {
    /// Binds the UDP endpoint and prepares the central client. `public`
    /// overrides the advertised endpoint when binding a wildcard address.
    pub async fn bind(
        bind_addr: &str,
        public: Option<String>,
        central_url: &str,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let socket = UdpSocket::bind(bind_addr).await?;
        let self_ip = match public {
            Some(endpoint) => endpoint,
            None => socket.local_addr()?.to_string(),
        };

        let ctx = ServerContext::new(ZoneStore::new(self_ip), CentralClient::new(central_url)?);

        Ok(Self {
            socket: Arc::new(socket),
            ctx: Arc::new(ctx),
        })
    }

    /// The endpoint advertised to the central, peers, and clients.
    pub fn endpoint(&self) -> String {
        self.ctx.store.self_ip().to_string()
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    /// Serves requests until the socket fails fatally.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            "Game server {} listening on {}",
            self.ctx.store.self_ip(),
            self.socket.local_addr()?
        );

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, addr) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    error!("Error receiving datagram: {}", err);
                    continue;
                }
            };

            let payload = buf[..len].to_vec();
            let ctx = Arc::clone(&self.ctx);
            let socket = Arc::clone(&self.socket);

            tokio::spawn(async move {
                let reply = match serde_json::from_slice::<Request>(&payload) {
                    Ok(request) => dispatch(&ctx, request).await,
                    Err(err) => {
                        warn!("Malformed request from {}: {}", addr, err);
                        Response::failure("malformed request")
                    }
                };
                send_reply(&socket, &reply, addr).await;
            });
        }
    }
}

async fn send_reply(socket: &UdpSocket, reply: &Response, addr: SocketAddr) {
    match serde_json::to_vec(reply) {
        Ok(payload) if payload.len() <= MAX_DATAGRAM => {
            if let Err(err) = socket.send_to(&payload, addr).await {
                error!("Failed to reply to {}: {}", addr, err);
            }
        }
        Ok(payload) => error!(
            "Reply of {} bytes to {} exceeds the datagram limit",
            payload.len(),
            addr
        ),
        Err(err) => error!("Failed to encode reply: {}", err),
    }
}

/// Routes one decoded request to its handler.
pub async fn dispatch(ctx: &ServerContext, request: Request) -> Response {
    match request {
        Request::GetData { player, chunk_id } => handle_get_data(ctx, player, chunk_id).await,
        Request::MovePlayer { player, .. } => handle_move_player(ctx, player).await,
        Request::GetUpdates { chunk_id, .. } => handle_get_updates(ctx, chunk_id).await,
        Request::DeletePlayer { player } => handle_delete_player(ctx, player).await,
        Request::AddCube { chunk_id, cube } => handle_add_cube(ctx, chunk_id, cube).await,
        Request::DeleteCube { chunk_id, cube_id } => {
            handle_delete_cube(ctx, chunk_id, &cube_id).await
        }
        Request::Merge { chunk_id, chunk } => handle_merge(ctx, chunk_id, chunk).await,
        Request::ReadOnly {
            chunk_id,
            is_chunk_new,
        } => handle_read_only(ctx, chunk_id, is_chunk_new).await,
        Request::FromCentral {
            chunk_id,
            caller_ip,
            player_count,
        } => handle_from_central(ctx, chunk_id, &caller_ip, player_count).await,
        Request::Unknown => Response::failure("Unknown request type"),
    }
}

/// The miss path of the chunk protocol.
///
/// Owned chunks are served directly. Otherwise the central is consulted:
/// first contact creates the chunk here, a foreign owner turns the reply
/// into a redirect (pushing any stale local state across first), and a
/// decision in our favor installs the chunk body the central relayed.
async fn handle_get_data(ctx: &ServerContext, player: Player, chunk_id: ChunkId) -> Response {
    let self_ip = ctx.store.self_ip().to_string();

    if ctx.store.claims_ownership(chunk_id).await {
        if let Some(chunk) = ctx.store.admit_player(chunk_id, player.clone()).await {
            return Response::ok(self_ip).with_chunk(chunk);
        }
    }

    let player_count = ctx.store.local_player_count(chunk_id).await;
    let central_reply = match ctx
        .central
        .query_owner(chunk_id, &self_ip, player_count)
        .await
    {
        Ok(reply) => reply,
        Err(err) => {
            error!("Central lookup for chunk {} failed: {}", chunk_id, err);
            return Response::failure("Failed to reach central");
        }
    };

    if !central_reply.success {
        // No prior owner; the registry now lists us.
        info!("Created chunk {} on first contact", chunk_id);
        let chunk = ctx.store.create_chunk(chunk_id, player).await;
        return Response::ok(self_ip).with_chunk(chunk);
    }

    let owner = central_reply.message.clone();
    if owner != self_ip {
        if let Some(stale) = ctx.store.yield_to(chunk_id, &owner).await {
            // Ownership moved away from us; hand our state over before
            // redirecting the player.
            push_merge(&owner, chunk_id, stale).await;
        } else {
            // Nothing held locally; ferry just this player across.
            let mut ferry = Chunk {
                idx: chunk_id.idx,
                idy: chunk_id.idy,
                ..Chunk::default()
            };
            ferry.player_list.push(player);
            push_merge(&owner, chunk_id, ferry).await;
        }
        return Response::ok(owner);
    }

    // The central kept (or made) us the owner.
    match ctx.store.admit_player(chunk_id, player.clone()).await {
        Some(chunk) => Response::ok(self_ip).with_chunk(chunk),
        None => {
            let chunk = ctx
                .store
                .adopt_chunk(chunk_id, central_reply.chunk, player)
                .await;
            Response::ok(self_ip).with_chunk(chunk)
        }
    }
}

/// Best-effort `MERGE` push; a failure is logged, never propagated. The
/// receiver converges through the central on its next request anyway.
async fn push_merge(owner: &str, chunk_id: ChunkId, chunk: Chunk) {
    let merge = Request::Merge { chunk_id, chunk };
    if let Err(err) = shared::net::request(owner, &merge, MERGE_DEADLINE).await {
        warn!("MERGE of chunk {} to {} failed: {}", chunk_id, owner, err);
    }
}

async fn handle_move_player(ctx: &ServerContext, player: Player) -> Response {
    let player_id = player.id.clone();
    let residence = ctx.store.move_player(player).await;
    debug!("Player {} now in chunk {}", player_id, residence);
    Response::ok("Player position updated")
}

async fn handle_get_updates(ctx: &ServerContext, chunk_id: ChunkId) -> Response {
    match ctx.store.lookup(chunk_id).await {
        Some(chunk) => Response {
            success: true,
            ..Response::default()
        }
        .with_game_data(chunk),
        None => Response::failure("chunk not held here"),
    }
}

async fn handle_delete_player(ctx: &ServerContext, player: Player) -> Response {
    ctx.store.remove_player(&player.id).await;
    info!("Player {} deleted", player.id);
    Response::ok("Player deleted")
}

async fn handle_add_cube(ctx: &ServerContext, chunk_id: ChunkId, cube: Cube) -> Response {
    match ctx.store.add_cube(chunk_id, cube).await {
        WriteOutcome::Applied => Response::ok("Added Cube"),
        WriteOutcome::DuplicateCube => Response::failure("duplicate cube id"),
        _ => Response::failure("chunk not held here"),
    }
}

async fn handle_delete_cube(ctx: &ServerContext, chunk_id: ChunkId, cube_id: &str) -> Response {
    match ctx.store.remove_cube(chunk_id, cube_id).await {
        WriteOutcome::Applied => Response::ok("Deleted Cube"),
        WriteOutcome::NoSuchCube => Response::failure("no such cube"),
        _ => Response::failure("chunk not held here"),
    }
}

async fn handle_merge(ctx: &ServerContext, chunk_id: ChunkId, chunk: Chunk) -> Response {
    ctx.store.merge(chunk_id, chunk).await;
    Response::ok("Merged Chunk")
}

async fn handle_read_only(ctx: &ServerContext, chunk_id: ChunkId, is_chunk_new: bool) -> Response {
    match ctx.store.read_snapshot(chunk_id, is_chunk_new).await {
        Some(chunk) => Response::ok("Sending the chunk").with_chunk(chunk),
        None => Response::failure("Use your local copy"),
    }
}

/// The owner side of a handoff. Never fails: an unknown chunk is simply a
/// zero-resident copy. Yield is strict (ties keep this server as owner)
/// and on yield the state is pushed to the caller before we reply, so the
/// central's registry rewrite happens after the new owner has the data.
async fn handle_from_central(
    ctx: &ServerContext,
    chunk_id: ChunkId,
    caller_ip: &str,
    caller_count: usize,
) -> Response {
    let my_count = ctx.store.local_player_count(chunk_id).await;

    if my_count < caller_count {
        info!(
            "Yielding chunk {} to {} ({} residents vs {})",
            chunk_id, caller_ip, my_count, caller_count
        );
        match ctx.store.yield_to(chunk_id, caller_ip).await {
            Some(stale) => {
                push_merge(caller_ip, chunk_id, stale.clone()).await;
                Response {
                    success: true,
                    ..Response::default()
                }
                .with_chunk(stale)
                .with_player_count(my_count)
            }
            None => Response {
                success: true,
                ..Response::default()
            }
            .with_player_count(my_count),
        }
    } else {
        let mut reply = Response {
            success: true,
            ..Response::default()
        }
        .with_player_count(my_count);
        if let Some(chunk) = ctx.store.lookup(chunk_id).await {
            reply = reply.with_chunk(chunk);
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ServerContext {
        ServerContext::new(
            ZoneStore::new("127.0.0.1:9000"),
            CentralClient::new("http://127.0.0.1:8080").unwrap(),
        )
    }

    fn player(id: &str, x: i32, y: i32) -> Player {
        Player {
            id: id.to_string(),
            pos_x: x,
            pos_y: y,
            ..Player::default()
        }
    }

    #[tokio::test]
    async fn test_unknown_request_type() {
        let ctx = context();
        let reply = dispatch(&ctx, Request::Unknown).await;
        assert!(!reply.success);
        assert_eq!(reply.message, "Unknown request type");
    }

    #[tokio::test]
    async fn test_owned_get_data_skips_central() {
        let ctx = context();
        let id = ChunkId::new(0, 0);
        ctx.store.create_chunk(id, player("p1", 0, 0)).await;

        // The central client points nowhere; an owned chunk must be
        // served without touching it.
        let reply = dispatch(
            &ctx,
            Request::GetData {
                player: player("p2", 1, 1),
                chunk_id: id,
            },
        )
        .await;

        assert!(reply.success);
        assert_eq!(reply.message, "127.0.0.1:9000");
        assert_eq!(reply.chunk.unwrap().player_count(), 2);
    }

    #[tokio::test]
    async fn test_from_central_keeps_chunk_on_tie() {
        let ctx = context();
        let id = ChunkId::new(0, 0);
        ctx.store.create_chunk(id, player("p1", 0, 0)).await;

        let reply = dispatch(
            &ctx,
            Request::FromCentral {
                chunk_id: id,
                caller_ip: "10.0.0.9:9000".to_string(),
                player_count: 1,
            },
        )
        .await;

        assert!(reply.success);
        assert_eq!(reply.player_count, Some(1));
        assert!(ctx.store.claims_ownership(id).await);
    }

    #[tokio::test]
    async fn test_from_central_reports_zero_for_unknown_chunk() {
        let ctx = context();

        let reply = dispatch(
            &ctx,
            Request::FromCentral {
                chunk_id: ChunkId::new(7, 7),
                caller_ip: "10.0.0.9:9000".to_string(),
                player_count: 0,
            },
        )
        .await;

        assert!(reply.success);
        assert_eq!(reply.player_count, Some(0));
        assert!(reply.chunk.is_none());
    }

    #[tokio::test]
    async fn test_merge_then_updates() {
        let ctx = context();
        let id = ChunkId::new(2, 2);
        let mut incoming = Chunk::new(id, "other:9000");
        incoming.place_cube(Cube {
            id: "k1".to_string(),
            x: 0,
            z: 0,
            height: 0,
            color: "#00ff00".to_string(),
        });

        let reply = dispatch(
            &ctx,
            Request::Merge {
                chunk_id: id,
                chunk: incoming,
            },
        )
        .await;
        assert!(reply.success);

        let updates = dispatch(
            &ctx,
            Request::GetUpdates {
                player: player("p1", 64, 64),
                chunk_id: id,
            },
        )
        .await;
        assert!(updates.success);
        assert_eq!(updates.game_data.unwrap().chunk.cells.len(), 1);
    }

    #[tokio::test]
    async fn test_updates_for_unknown_chunk_fail() {
        let ctx = context();
        let reply = dispatch(
            &ctx,
            Request::GetUpdates {
                player: player("p1", 0, 0),
                chunk_id: ChunkId::new(30, 30),
            },
        )
        .await;
        assert!(!reply.success);
    }

    #[tokio::test]
    async fn test_read_only_freshness() {
        let ctx = context();
        let id = ChunkId::new(0, 0);
        ctx.store.create_chunk(id, player("p1", 0, 0)).await;
        ctx.store.remove_player("p1").await;
        ctx.store
            .add_cube(
                id,
                Cube {
                    id: "k1".to_string(),
                    ..Cube::default()
                },
            )
            .await;

        let first = dispatch(
            &ctx,
            Request::ReadOnly {
                chunk_id: id,
                is_chunk_new: false,
            },
        )
        .await;
        assert!(first.success);
        assert!(first.chunk.is_some());

        let second = dispatch(
            &ctx,
            Request::ReadOnly {
                chunk_id: id,
                is_chunk_new: false,
            },
        )
        .await;
        assert!(!second.success);
        assert_eq!(second.message, "Use your local copy");
    }
}
