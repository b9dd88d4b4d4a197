//! # Shared World-Server Library
//!
//! Data structures, wire protocol, and transport helpers used by the
//! central coordinator, the game servers, and the player client. It is the
//! single definition of the JSON contract spoken over UDP between servers
//! and over HTTP between a server and the central.
//!
//! ## Core Components
//!
//! - **World model**: [`ChunkId`], [`Cube`], [`Player`], [`Chunk`]: the
//!   in-memory representation of a sharded voxel world. A chunk is a fixed
//!   `CHUNK_SIZE`-sided square of the world owned by exactly one game
//!   server at a time.
//! - **Protocol**: [`Request`] (a tagged union over the `type`
//!   discriminator) and the [`Response`] envelope every handler replies
//!   with, plus the HTTP body types for the central's `/join` and `/chunk`
//!   endpoints.
//! - **Transport**: [`net::request`]: one-shot UDP request/reply with an
//!   explicit deadline, shared by every process that dials a peer.
//! - **Errors**: [`ProtocolError`], the closed set of failure kinds that
//!   may cross a component boundary.
//!
//! All wire payloads are single JSON objects. Datagrams above
//! [`MAX_DATAGRAM`] bytes are rejected rather than fragmented.

use std::time::Duration;

pub mod error;
pub mod net;
pub mod protocol;
pub mod world;

pub use error::ProtocolError;
pub use protocol::{ChunkQuery, JoinRequest, Request, Response};
pub use world::{Chunk, ChunkId, Cube, GameData, Player};

/// Side length of a chunk in world units. Player positions are mapped to
/// chunk coordinates by floor division with this constant.
pub const CHUNK_SIZE: i32 = 32;

/// Upper bound on a single wire payload. Larger payloads are rejected.
pub const MAX_DATAGRAM: usize = 64 * 1024;

/// Deadline for a client request to a game server.
pub const CLIENT_DEADLINE: Duration = Duration::from_secs(2);

/// Deadline for the central's `FROM_CENTRAL` exchange with a chunk owner.
pub const CENTRAL_PEER_DEADLINE: Duration = Duration::from_secs(3);

/// Deadline for a `MERGE` push between game servers during a handoff.
pub const MERGE_DEADLINE: Duration = Duration::from_secs(2);

/// Maximum owner redirects a client follows for one logical request.
pub const MAX_REDIRECTS: u32 = 3;
