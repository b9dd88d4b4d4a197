//! Wire protocol spoken between the client, the game servers, and the
//! central coordinator.
//!
//! Every UDP payload is a single JSON object carrying a `type`
//! discriminator; replies always use the [`Response`] envelope. The same
//! envelope is returned by the central's HTTP endpoints so a game server
//! can decode both transports with one type.

use crate::world::{Chunk, ChunkId, Cube, GameData, Player};
use serde::{Deserialize, Serialize};

/// A typed request datagram.
///
/// The discriminator set is closed: anything else deserializes to
/// [`Request::Unknown`] and is answered with a failure reply rather than
/// dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Fetch a chunk and register the player with its owner. Triggers the
    /// central lookup when the receiving server does not own the chunk.
    #[serde(rename = "GET_DATA")]
    GetData {
        #[serde(default)]
        player: Player,
        #[serde(default)]
        chunk_id: ChunkId,
    },

    /// Update a player's position. The caller is a trusted gateway; no
    /// ownership check is made.
    #[serde(rename = "MOVE_PLAYER")]
    MovePlayer {
        #[serde(default)]
        player: Player,
        #[serde(default)]
        chunk_id: ChunkId,
    },

    /// Poll the current chunk state for rendering.
    #[serde(rename = "GET_UPDATES")]
    GetUpdates {
        #[serde(default)]
        player: Player,
        #[serde(default)]
        chunk_id: ChunkId,
    },

    /// Forget a departing player.
    #[serde(rename = "DLT_PLAYER")]
    DeletePlayer {
        #[serde(default)]
        player: Player,
    },

    /// Place a cube in a chunk held by the receiving server.
    #[serde(rename = "ADD_CUBE")]
    AddCube {
        #[serde(default)]
        chunk_id: ChunkId,
        #[serde(default)]
        cube: Cube,
    },

    /// Remove a cube by id.
    #[serde(rename = "DLT_CUBE")]
    DeleteCube {
        #[serde(default)]
        chunk_id: ChunkId,
        #[serde(default)]
        cube_id: String,
    },

    /// One-shot state transfer during a handoff: install the chunk if
    /// absent, otherwise append its residents.
    #[serde(rename = "MERGE")]
    Merge {
        #[serde(default)]
        chunk_id: ChunkId,
        #[serde(default)]
        chunk: Chunk,
    },

    /// Freshness-only peer read: the owner returns the chunk when it is
    /// new to the caller, dirty, or populated.
    #[serde(rename = "READ_ONLY")]
    ReadOnly {
        #[serde(default)]
        chunk_id: ChunkId,
        #[serde(default)]
        is_chunk_new: bool,
    },

    /// The central asking the current owner whether to yield a chunk to a
    /// caller carrying `player_count` players.
    #[serde(rename = "FROM_CENTRAL")]
    FromCentral {
        #[serde(default)]
        chunk_id: ChunkId,
        #[serde(default)]
        caller_ip: String,
        #[serde(default)]
        player_count: usize,
    },

    /// Catch-all for unrecognized discriminators.
    #[serde(other)]
    Unknown,
}

/// The reply envelope used by every handler and both central endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<Chunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_data: Option<GameData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_count: Option<usize>,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_chunk(mut self, chunk: Chunk) -> Self {
        self.chunk = Some(chunk);
        self
    }

    pub fn with_game_data(mut self, chunk: Chunk) -> Self {
        self.game_data = Some(GameData { chunk });
        self
    }

    pub fn with_new_ip(mut self, new_ip: impl Into<String>) -> Self {
        self.new_ip = Some(new_ip.into());
        self
    }

    pub fn with_player_count(mut self, count: usize) -> Self {
        self.player_count = Some(count);
        self
    }

    /// The endpoint to re-issue the request to, when this reply redirects
    /// away from `current`. A redirect is a successful reply whose message
    /// is a `host:port` endpoint other than the server just contacted;
    /// plain status messages never qualify.
    pub fn redirect_target(&self, current: &str) -> Option<String> {
        if !self.success || self.message == current || !is_endpoint(&self.message) {
            return None;
        }
        Some(self.message.clone())
    }
}

/// True when `s` has the `host:port` shape of a server endpoint.
fn is_endpoint(s: &str) -> bool {
    match s.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// Body of the central's `POST /join`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinRequest {
    pub player_id: String,
    pub pos_x: i32,
    pub pos_y: i32,
}

/// Body of the central's `POST /chunk`: a game server reporting a miss and
/// its current load for the chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkQuery {
    #[serde(rename = "type")]
    pub kind: String,
    pub chunk_id: ChunkId,
    pub caller_ip: String,
    pub player_count: usize,
}

impl ChunkQuery {
    pub fn new(chunk_id: ChunkId, caller_ip: &str, player_count: usize) -> Self {
        Self {
            kind: "GET_CHUNK".to_string(),
            chunk_id,
            caller_ip: caller_ip.to_string(),
            player_count,
        }
    }
}
