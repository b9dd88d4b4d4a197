//! A player's connection to the world: join bootstrap, the redirect loop,
//! and one method per game operation.

use log::{info, warn};
use shared::{
    Chunk, ChunkId, Cube, JoinRequest, Player, ProtocolError, Request, Response, CLIENT_DEADLINE,
    MAX_REDIRECTS,
};
use std::time::Duration;

/// One player's session against the cluster.
///
/// `server_ip` is the endpoint the session currently believes owns its
/// chunk; a successful reply whose message names a different endpoint
/// makes the session adopt it and re-issue the request. Redirects are
/// request-scoped: each request dials fresh, nothing long-lived is rewired
/// mid-flight.
pub struct Session {
    http: reqwest::Client,
    central_url: String,
    pub player: Player,
    pub server_ip: String,
    pub current_chunk: ChunkId,
}

impl Session {
    pub fn new(central_url: &str, player_id: &str) -> Result<Self, ProtocolError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| ProtocolError::Central(err.to_string()))?;

        Ok(Self {
            http,
            central_url: central_url.trim_end_matches('/').to_string(),
            player: Player {
                id: player_id.to_string(),
                ..Player::default()
            },
            server_ip: String::new(),
            current_chunk: ChunkId::default(),
        })
    }

    /// Asks the central for a game server and adopts it.
    pub async fn join(&mut self) -> Result<String, ProtocolError> {
        let body = JoinRequest {
            player_id: self.player.id.clone(),
            pos_x: self.player.pos_x,
            pos_y: self.player.pos_y,
        };
        let reply = self
            .http
            .post(format!("{}/join", self.central_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| ProtocolError::Central(err.to_string()))?
            .json::<Response>()
            .await
            .map_err(|err| ProtocolError::Central(err.to_string()))?;

        if !reply.success {
            return Err(ProtocolError::Central(reply.message));
        }

        info!("Player {} assigned to {}", self.player.id, reply.message);
        self.server_ip = reply.message.clone();
        self.player.server_ip = reply.message.clone();
        Ok(reply.message)
    }

    /// Sends one logical request, following at most [`MAX_REDIRECTS`]
    /// owner redirects before giving up.
    pub async fn request(&mut self, request: &Request) -> Result<Response, ProtocolError> {
        let mut hops = 0u32;
        loop {
            let reply = shared::net::request(&self.server_ip, request, CLIENT_DEADLINE).await?;
            match reply.redirect_target(&self.server_ip) {
                None => return Ok(reply),
                Some(_) if hops >= MAX_REDIRECTS => {
                    warn!(
                        "Giving up on request after {} redirects (last owner {})",
                        hops, reply.message
                    );
                    return Err(ProtocolError::RedirectChain(hops));
                }
                Some(next) => {
                    hops += 1;
                    info!("Redirected to {} (hop {})", next, hops);
                    self.server_ip = next.clone();
                    self.player.server_ip = next;
                }
            }
        }
    }

    /// Fetches the chunk under the player and registers with its owner.
    pub async fn get_data(&mut self) -> Result<Response, ProtocolError> {
        self.current_chunk = self.player.residence();
        self.player.chunk_id = self.current_chunk;
        let request = Request::GetData {
            player: self.player.clone(),
            chunk_id: self.current_chunk,
        };
        self.request(&request).await
    }

    /// Moves the player and reports the new position.
    pub async fn move_to(&mut self, x: i32, y: i32) -> Result<Response, ProtocolError> {
        self.player.pos_x = x;
        self.player.pos_y = y;
        self.player.chunk_id = self.player.residence();
        let request = Request::MovePlayer {
            player: self.player.clone(),
            chunk_id: self.player.chunk_id,
        };
        self.request(&request).await
    }

    /// Polls the current chunk for fresh state.
    pub async fn updates(&mut self) -> Result<Option<Chunk>, ProtocolError> {
        let request = Request::GetUpdates {
            player: self.player.clone(),
            chunk_id: self.current_chunk,
        };
        let reply = self.request(&request).await?;
        Ok(reply.game_data.map(|data| data.chunk))
    }

    /// Places a cube in the current chunk.
    pub async fn add_cube(&mut self, cube: Cube) -> Result<Response, ProtocolError> {
        let request = Request::AddCube {
            chunk_id: self.current_chunk,
            cube,
        };
        self.request(&request).await
    }

    /// Removes a cube from the current chunk.
    pub async fn delete_cube(&mut self, cube_id: &str) -> Result<Response, ProtocolError> {
        let request = Request::DeleteCube {
            chunk_id: self.current_chunk,
            cube_id: cube_id.to_string(),
        };
        self.request(&request).await
    }

    /// Tells the server this player is gone. Best effort.
    pub async fn leave(&mut self) -> Result<Response, ProtocolError> {
        let request = Request::DeletePlayer {
            player: self.player.clone(),
        };
        self.request(&request).await
    }
}
