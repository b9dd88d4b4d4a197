//! Mutex-guarded chunk and player state for one game server.
//!
//! All handler tasks share one [`ZoneStore`]; every operation takes the
//! single internal lock, mutates, and returns owned snapshots. The lock is
//! never held across network I/O: callers copy state out, talk to peers,
//! and write results back through another operation.

use log::{debug, info};
use shared::{Chunk, ChunkId, Cube, Player};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Result of a cube mutation.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The chunk is not held by this server.
    UnknownChunk,
    /// `ADD_CUBE` with an id already present in the chunk.
    DuplicateCube,
    /// `DLT_CUBE` for an id that does not exist.
    NoSuchCube,
}

#[derive(Default)]
struct ZoneState {
    zone_map: HashMap<ChunkId, Chunk>,
    players: HashMap<String, ChunkId>,
    player_map: HashMap<String, Player>,
}

/// The server's view of the world: chunks it owns or has cached, plus the
/// player residence index.
pub struct ZoneStore {
    self_ip: String,
    state: Mutex<ZoneState>,
}

impl ZoneStore {
    pub fn new(self_ip: impl Into<String>) -> Self {
        Self {
            self_ip: self_ip.into(),
            state: Mutex::new(ZoneState::default()),
        }
    }

    /// The endpoint this server advertises to peers and clients.
    pub fn self_ip(&self) -> &str {
        &self.self_ip
    }

    /// Snapshot of a chunk, owned or cached.
    pub async fn lookup(&self, id: ChunkId) -> Option<Chunk> {
        self.state.lock().await.zone_map.get(&id).cloned()
    }

    /// Snapshot of a chunk this server currently claims ownership of.
    pub async fn owned_snapshot(&self, id: ChunkId) -> Option<Chunk> {
        let state = self.state.lock().await;
        state
            .zone_map
            .get(&id)
            .filter(|chunk| chunk.server_ip == self.self_ip)
            .cloned()
    }

    /// True when this server believes it owns the chunk.
    pub async fn claims_ownership(&self, id: ChunkId) -> bool {
        self.owned_snapshot(id).await.is_some()
    }

    /// Resident count of the local copy; zero when the chunk is unknown.
    pub async fn local_player_count(&self, id: ChunkId) -> usize {
        let state = self.state.lock().await;
        state
            .zone_map
            .get(&id)
            .map(Chunk::player_count)
            .unwrap_or(0)
    }

    /// Registers `player` as resident in a chunk held locally and returns
    /// the updated snapshot. `None` when the chunk is not held.
    pub async fn admit_player(&self, id: ChunkId, mut player: Player) -> Option<Chunk> {
        let mut state = self.state.lock().await;
        if !state.zone_map.contains_key(&id) {
            return None;
        }

        player.chunk_id = id;
        player.server_ip = self.self_ip.clone();

        let previous = state.players.insert(player.id.clone(), id);
        if let Some(old) = previous.filter(|old| *old != id) {
            if let Some(old_chunk) = state.zone_map.get_mut(&old) {
                old_chunk.drop_player(&player.id);
            }
        }
        state.player_map.insert(player.id.clone(), player.clone());

        let chunk = state.zone_map.get_mut(&id).unwrap();
        chunk.upsert_player(player);
        Some(chunk.clone())
    }

    /// Creates a fresh empty chunk owned by this server with `player` as
    /// its first resident. Used on first contact for a chunk.
    pub async fn create_chunk(&self, id: ChunkId, mut player: Player) -> Chunk {
        let mut state = self.state.lock().await;

        player.chunk_id = id;
        player.server_ip = self.self_ip.clone();
        state.players.insert(player.id.clone(), id);
        state.player_map.insert(player.id.clone(), player.clone());

        let mut chunk = Chunk::new(id, &self.self_ip);
        chunk.player_list.push(player);
        state.zone_map.insert(id, chunk.clone());
        chunk
    }

    /// Installs a chunk body handed to us by the central after it decided
    /// we are the owner, registering `player` as resident.
    pub async fn adopt_chunk(&self, id: ChunkId, body: Option<Chunk>, mut player: Player) -> Chunk {
        let mut state = self.state.lock().await;

        player.chunk_id = id;
        player.server_ip = self.self_ip.clone();
        state.players.insert(player.id.clone(), id);
        state.player_map.insert(player.id.clone(), player.clone());

        let mut chunk = body.unwrap_or_else(|| Chunk::new(id, &self.self_ip));
        chunk.idx = id.idx;
        chunk.idy = id.idy;
        chunk.server_ip = self.self_ip.clone();
        chunk.is_dirty = true;
        chunk.upsert_player(player);
        state.zone_map.insert(id, chunk.clone());
        chunk
    }

    /// Applies a position update, shifting the player's residence between
    /// chunk lists when the position crosses a chunk boundary. Returns the
    /// chunk the player now resides in.
    pub async fn move_player(&self, mut player: Player) -> ChunkId {
        let residence = player.residence();
        player.chunk_id = residence;
        player.server_ip = self.self_ip.clone();

        let mut state = self.state.lock().await;
        let previous = state.players.insert(player.id.clone(), residence);
        if let Some(old) = previous.filter(|old| *old != residence) {
            if let Some(old_chunk) = state.zone_map.get_mut(&old) {
                old_chunk.drop_player(&player.id);
            }
            debug!("Player {} moved {} -> {}", player.id, old, residence);
        }
        if let Some(chunk) = state.zone_map.get_mut(&residence) {
            chunk.upsert_player(player.clone());
        }
        state.player_map.insert(player.id.clone(), player);
        residence
    }

    /// Forgets a player entirely: residence index, player record, and the
    /// resident list of its chunk.
    pub async fn remove_player(&self, player_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let residence = state.players.remove(player_id);
        state.player_map.remove(player_id);
        if let Some(chunk) = residence.and_then(|id| state.zone_map.get_mut(&id)) {
            chunk.drop_player(player_id);
        }
        residence.is_some()
    }

    /// Places a cube on top of its column in a locally held chunk.
    pub async fn add_cube(&self, id: ChunkId, cube: Cube) -> WriteOutcome {
        let mut state = self.state.lock().await;
        match state.zone_map.get_mut(&id) {
            Some(chunk) => {
                if chunk.place_cube(cube) {
                    WriteOutcome::Applied
                } else {
                    WriteOutcome::DuplicateCube
                }
            }
            None => WriteOutcome::UnknownChunk,
        }
    }

    /// Removes a cube by id from a locally held chunk.
    pub async fn remove_cube(&self, id: ChunkId, cube_id: &str) -> WriteOutcome {
        let mut state = self.state.lock().await;
        match state.zone_map.get_mut(&id) {
            Some(chunk) => {
                if chunk.remove_cube(cube_id) {
                    WriteOutcome::Applied
                } else {
                    WriteOutcome::NoSuchCube
                }
            }
            None => WriteOutcome::UnknownChunk,
        }
    }

    /// Accepts a `MERGE`: installs the chunk when absent (this server is
    /// its owner from now on), otherwise appends the incoming residents.
    pub async fn merge(&self, id: ChunkId, mut incoming: Chunk) {
        let mut state = self.state.lock().await;
        match state.zone_map.get_mut(&id) {
            Some(chunk) => {
                chunk.absorb(incoming);
                info!("Merged residents into chunk {}", id);
            }
            None => {
                incoming.idx = id.idx;
                incoming.idy = id.idy;
                incoming.server_ip = self.self_ip.clone();
                incoming.is_dirty = true;
                state.zone_map.insert(id, incoming);
                info!("Installed chunk {} from merge", id);
            }
        }
    }

    /// Gives the chunk up to `new_owner`: the local copy and its residents
    /// are pointed at the new owner and the copy becomes a stale cache.
    /// Returns the rewritten snapshot for the `MERGE` push, or `None` when
    /// nothing is held locally.
    pub async fn yield_to(&self, id: ChunkId, new_owner: &str) -> Option<Chunk> {
        let mut state = self.state.lock().await;
        let chunk = state.zone_map.get_mut(&id)?;
        chunk.reassign(new_owner);
        let snapshot = chunk.clone();
        for player in &snapshot.player_list {
            if let Some(record) = state.player_map.get_mut(&player.id) {
                record.server_ip = new_owner.to_string();
            }
        }
        info!("Yielded chunk {} to {}", id, new_owner);
        Some(snapshot)
    }

    /// Freshness-gated snapshot for a peer `READ_ONLY`: returns the chunk
    /// when it is new to the caller, dirty, or populated, clearing the
    /// dirty flag it consumed. `None` tells the caller its copy is fine.
    pub async fn read_snapshot(&self, id: ChunkId, is_chunk_new: bool) -> Option<Chunk> {
        let mut state = self.state.lock().await;
        let chunk = state.zone_map.get_mut(&id)?;
        if is_chunk_new || chunk.is_dirty || !chunk.player_list.is_empty() {
            let snapshot = chunk.clone();
            chunk.is_dirty = false;
            Some(snapshot)
        } else {
            None
        }
    }

    /// Chunks this server currently claims to own.
    pub async fn owned_chunks(&self) -> Vec<ChunkId> {
        let state = self.state.lock().await;
        state
            .zone_map
            .values()
            .filter(|chunk| chunk.server_ip == self.self_ip)
            .map(Chunk::id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELF: &str = "127.0.0.1:9000";

    fn store() -> ZoneStore {
        ZoneStore::new(SELF)
    }

    fn player(id: &str, x: i32, y: i32) -> Player {
        Player {
            id: id.to_string(),
            pos_x: x,
            pos_y: y,
            ..Player::default()
        }
    }

    fn cube(id: &str) -> Cube {
        Cube {
            id: id.to_string(),
            x: 3,
            z: 5,
            height: 0,
            color: "#ff0000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_chunk_registers_player() {
        let store = store();
        let id = ChunkId::new(0, 0);

        let chunk = store.create_chunk(id, player("p1", 0, 0)).await;

        assert_eq!(chunk.server_ip, SELF);
        assert_eq!(chunk.player_count(), 1);
        assert_eq!(chunk.player_list[0].server_ip, SELF);
        assert!(store.claims_ownership(id).await);
        assert_eq!(store.local_player_count(id).await, 1);
    }

    #[tokio::test]
    async fn test_admit_requires_local_chunk() {
        let store = store();
        assert!(store
            .admit_player(ChunkId::new(3, 3), player("p1", 100, 100))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_admit_replaces_existing_entry() {
        let store = store();
        let id = ChunkId::new(0, 0);
        store.create_chunk(id, player("p1", 0, 0)).await;

        let chunk = store.admit_player(id, player("p1", 5, 5)).await.unwrap();

        assert_eq!(chunk.player_count(), 1);
        assert_eq!(chunk.player_list[0].pos_x, 5);
    }

    #[tokio::test]
    async fn test_cube_lifecycle() {
        let store = store();
        let id = ChunkId::new(0, 0);
        store.create_chunk(id, player("p1", 0, 0)).await;

        assert_eq!(store.add_cube(id, cube("k1")).await, WriteOutcome::Applied);
        assert_eq!(
            store.add_cube(id, cube("k1")).await,
            WriteOutcome::DuplicateCube
        );
        assert_eq!(
            store.add_cube(ChunkId::new(9, 9), cube("k2")).await,
            WriteOutcome::UnknownChunk
        );

        let chunk = store.lookup(id).await.unwrap();
        assert!(chunk.is_dirty);
        assert_eq!(chunk.cells.len(), 1);

        assert_eq!(store.remove_cube(id, "k1").await, WriteOutcome::Applied);
        assert_eq!(store.remove_cube(id, "k1").await, WriteOutcome::NoSuchCube);
        assert!(store.lookup(id).await.unwrap().cells.is_empty());
    }

    #[tokio::test]
    async fn test_move_shifts_residence() {
        let store = store();
        let origin = ChunkId::new(0, 0);
        store.create_chunk(origin, player("p1", 0, 0)).await;

        let residence = store.move_player(player("p1", 400, 400)).await;

        assert_eq!(residence, ChunkId::new(12, 12));
        assert_eq!(store.local_player_count(origin).await, 0);
    }

    #[tokio::test]
    async fn test_move_within_chunk_updates_list() {
        let store = store();
        let origin = ChunkId::new(0, 0);
        store.create_chunk(origin, player("p1", 0, 0)).await;

        store.move_player(player("p1", 10, 10)).await;

        let chunk = store.lookup(origin).await.unwrap();
        assert_eq!(chunk.player_count(), 1);
        assert_eq!(chunk.player_list[0].pos_x, 10);
        assert_eq!(chunk.player_list[0].chunk_id, origin);
    }

    #[tokio::test]
    async fn test_remove_player_clears_residence() {
        let store = store();
        let id = ChunkId::new(0, 0);
        store.create_chunk(id, player("p1", 0, 0)).await;

        assert!(store.remove_player("p1").await);
        assert!(!store.remove_player("p1").await);
        assert_eq!(store.local_player_count(id).await, 0);
    }

    #[tokio::test]
    async fn test_merge_installs_when_absent() {
        let store = store();
        let id = ChunkId::new(4, 4);
        let mut incoming = Chunk::new(id, "other:9000");
        incoming.place_cube(cube("k1"));

        store.merge(id, incoming).await;

        let chunk = store.lookup(id).await.unwrap();
        assert_eq!(chunk.server_ip, SELF);
        assert!(chunk.is_dirty);
        assert_eq!(chunk.cells.len(), 1);
        assert!(store.claims_ownership(id).await);
    }

    #[tokio::test]
    async fn test_merge_appends_when_present() {
        let store = store();
        let id = ChunkId::new(0, 0);
        store.create_chunk(id, player("p1", 0, 0)).await;

        let mut incoming = Chunk::new(id, "other:9000");
        incoming.player_list.push(player("p2", 1, 1));

        store.merge(id, incoming).await;

        let chunk = store.lookup(id).await.unwrap();
        assert_eq!(chunk.player_count(), 2);
        // A second identical merge must not duplicate residents.
        let mut again = Chunk::new(id, "other:9000");
        again.player_list.push(player("p2", 1, 1));
        store.merge(id, again).await;
        assert_eq!(store.local_player_count(id).await, 2);
    }

    #[tokio::test]
    async fn test_yield_marks_copy_stale() {
        let store = store();
        let id = ChunkId::new(0, 0);
        store.create_chunk(id, player("p1", 0, 0)).await;

        let snapshot = store.yield_to(id, "other:9000").await.unwrap();

        assert_eq!(snapshot.server_ip, "other:9000");
        assert_eq!(snapshot.player_list[0].server_ip, "other:9000");
        assert!(snapshot.is_dirty);
        assert!(!store.claims_ownership(id).await);
        assert!(store.lookup(id).await.is_some());
        assert!(store
            .yield_to(ChunkId::new(9, 9), "other:9000")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_read_snapshot_consumes_dirty() {
        let store = store();
        let id = ChunkId::new(0, 0);
        store.create_chunk(id, player("p1", 0, 0)).await;
        store.add_cube(id, cube("k1")).await;
        store.remove_player("p1").await;

        // Dirty: served once, flag consumed.
        assert!(store.read_snapshot(id, false).await.is_some());
        // Clean and empty: the caller keeps its local copy.
        assert!(store.read_snapshot(id, false).await.is_none());
        // A caller seeing the chunk for the first time always gets it.
        assert!(store.read_snapshot(id, true).await.is_some());
    }
}
