//! World data model: chunks, cubes, and players.
//!
//! A [`Chunk`] is the unit of ownership: exactly one game server serves
//! writes for it at any instant, and `server_ip` records that owner. A
//! chunk also carries the players currently resident in it; the player to
//! chunk reference is a lookup maintained by the owning server, never a
//! serialized back-pointer.

use crate::CHUNK_SIZE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinates of a chunk in the world grid.
///
/// Derived from a world position by floor division with [`CHUNK_SIZE`], so
/// negative positions map to negative chunk coordinates without the bias
/// truncating division would introduce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    #[serde(rename = "id_x")]
    pub idx: i32,
    #[serde(rename = "id_y")]
    pub idy: i32,
}

impl ChunkId {
    pub fn new(idx: i32, idy: i32) -> Self {
        Self { idx, idy }
    }

    /// The chunk containing world position `(x, y)`.
    pub fn containing(x: i32, y: i32) -> Self {
        Self {
            idx: x.div_euclid(CHUNK_SIZE),
            idy: y.div_euclid(CHUNK_SIZE),
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.idx, self.idy)
    }
}

/// A stacked voxel inside a chunk.
///
/// `(x, z)` names a column; `height` is the cube's slot within it. Heights
/// in a column always form the dense prefix `0..k-1`: the owning server
/// assigns the height on placement and re-packs the column on removal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cube {
    #[serde(rename = "cube_id")]
    pub id: String,
    pub x: i32,
    pub z: i32,
    pub height: i32,
    pub color: String,
}

/// A connected player as tracked by the game servers.
///
/// `server_ip` is the endpoint the player is expected to talk to; it is
/// rewritten during a handoff so stale residents can be pointed at the new
/// owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub id: String,
    #[serde(rename = "posx")]
    pub pos_x: i32,
    #[serde(rename = "posy")]
    pub pos_y: i32,
    pub server_ip: String,
    pub aoi_radius: i32,
    pub chunk_id: ChunkId,
}

impl Player {
    /// The chunk this player's position falls into.
    pub fn residence(&self) -> ChunkId {
        ChunkId::containing(self.pos_x, self.pos_y)
    }
}

/// One chunk of world state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chunk {
    #[serde(rename = "id_x")]
    pub idx: i32,
    #[serde(rename = "id_y")]
    pub idy: i32,
    pub server_ip: String,
    pub data: String,
    pub player_list: Vec<Player>,
    pub is_dirty: bool,
    pub cells: Vec<Cube>,
}

impl Chunk {
    /// A freshly created chunk owned by `server_ip`, with no cubes and no
    /// residents.
    pub fn new(id: ChunkId, server_ip: &str) -> Self {
        Self {
            idx: id.idx,
            idy: id.idy,
            server_ip: server_ip.to_string(),
            data: "new chunk".to_string(),
            player_list: Vec::new(),
            is_dirty: false,
            cells: Vec::new(),
        }
    }

    pub fn id(&self) -> ChunkId {
        ChunkId::new(self.idx, self.idy)
    }

    /// Number of players currently resident in this chunk. This is the
    /// load figure compared during a handoff tiebreak.
    pub fn player_count(&self) -> usize {
        self.player_list.len()
    }

    /// Current stack height of column `(x, z)`.
    pub fn column_height(&self, x: i32, z: i32) -> i32 {
        self.cells.iter().filter(|c| c.x == x && c.z == z).count() as i32
    }

    /// Places a cube on top of its column, assigning the stacked height.
    /// Returns `false` without modifying the chunk when the cube id is
    /// already present.
    pub fn place_cube(&mut self, mut cube: Cube) -> bool {
        if self.cells.iter().any(|c| c.id == cube.id) {
            return false;
        }
        cube.height = self.column_height(cube.x, cube.z);
        self.cells.push(cube);
        self.is_dirty = true;
        true
    }

    /// Removes the cube with `cube_id`, letting any cubes above it in the
    /// same column settle down one slot. Returns `false` when no such cube
    /// exists.
    pub fn remove_cube(&mut self, cube_id: &str) -> bool {
        let Some(idx) = self.cells.iter().position(|c| c.id == cube_id) else {
            return false;
        };
        let removed = self.cells.swap_remove(idx);
        for cell in &mut self.cells {
            if cell.x == removed.x && cell.z == removed.z && cell.height > removed.height {
                cell.height -= 1;
            }
        }
        self.is_dirty = true;
        true
    }

    /// Inserts `player` into the resident list, replacing any previous
    /// entry with the same id.
    pub fn upsert_player(&mut self, player: Player) {
        match self.player_list.iter_mut().find(|p| p.id == player.id) {
            Some(slot) => *slot = player,
            None => self.player_list.push(player),
        }
    }

    /// Drops the resident with `player_id`, if present.
    pub fn drop_player(&mut self, player_id: &str) -> bool {
        let before = self.player_list.len();
        self.player_list.retain(|p| p.id != player_id);
        self.player_list.len() != before
    }

    /// Folds a merged copy of this chunk into the local one: residents not
    /// yet known are appended, duplicates by id are ignored.
    pub fn absorb(&mut self, incoming: Chunk) {
        for player in incoming.player_list {
            if !self.player_list.iter().any(|p| p.id == player.id) {
                self.player_list.push(player);
            }
        }
    }

    /// Points this chunk and every resident at `new_owner` and marks the
    /// copy stale. Called on the yielding side of a handoff.
    pub fn reassign(&mut self, new_owner: &str) {
        self.server_ip = new_owner.to_string();
        for player in &mut self.player_list {
            player.server_ip = new_owner.to_string();
        }
        self.is_dirty = true;
    }
}

/// Per-tick update payload returned by `GET_UPDATES`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameData {
    pub chunk: Chunk,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(id: &str, x: i32, z: i32) -> Cube {
        Cube {
            id: id.to_string(),
            x,
            z,
            height: 0,
            color: "#ff0000".to_string(),
        }
    }

    #[test]
    fn test_chunk_id_floor_division() {
        assert_eq!(ChunkId::containing(0, 0), ChunkId::new(0, 0));
        assert_eq!(ChunkId::containing(31, 31), ChunkId::new(0, 0));
        assert_eq!(ChunkId::containing(32, 0), ChunkId::new(1, 0));
        assert_eq!(ChunkId::containing(-1, -33), ChunkId::new(-1, -2));
    }

    #[test]
    fn test_player_residence() {
        let player = Player {
            id: "p1".to_string(),
            pos_x: 65,
            pos_y: -5,
            ..Player::default()
        };
        assert_eq!(player.residence(), ChunkId::new(2, -1));
    }

    #[test]
    fn test_place_cube_stacks_column() {
        let mut chunk = Chunk::new(ChunkId::new(0, 0), "a:9000");

        assert!(chunk.place_cube(cube("k1", 3, 5)));
        assert!(chunk.place_cube(cube("k2", 3, 5)));
        assert!(chunk.place_cube(cube("k3", 4, 5)));

        assert_eq!(chunk.cells[0].height, 0);
        assert_eq!(chunk.cells[1].height, 1);
        assert_eq!(chunk.cells[2].height, 0);
        assert!(chunk.is_dirty);
    }

    #[test]
    fn test_place_cube_rejects_duplicate_id() {
        let mut chunk = Chunk::new(ChunkId::new(0, 0), "a:9000");

        assert!(chunk.place_cube(cube("k1", 0, 0)));
        assert!(!chunk.place_cube(cube("k1", 7, 7)));
        assert_eq!(chunk.cells.len(), 1);
    }

    #[test]
    fn test_remove_cube_repacks_column() {
        let mut chunk = Chunk::new(ChunkId::new(0, 0), "a:9000");
        chunk.place_cube(cube("k1", 2, 2));
        chunk.place_cube(cube("k2", 2, 2));
        chunk.place_cube(cube("k3", 2, 2));

        assert!(chunk.remove_cube("k2"));
        assert!(!chunk.remove_cube("k2"));

        let mut heights: Vec<i32> = chunk
            .cells
            .iter()
            .filter(|c| c.x == 2 && c.z == 2)
            .map(|c| c.height)
            .collect();
        heights.sort_unstable();
        assert_eq!(heights, vec![0, 1]);
    }

    #[test]
    fn test_absorb_deduplicates_players() {
        let mut local = Chunk::new(ChunkId::new(0, 0), "a:9000");
        local.upsert_player(Player {
            id: "p1".to_string(),
            ..Player::default()
        });

        let mut incoming = Chunk::new(ChunkId::new(0, 0), "b:9000");
        incoming.upsert_player(Player {
            id: "p1".to_string(),
            ..Player::default()
        });
        incoming.upsert_player(Player {
            id: "p2".to_string(),
            ..Player::default()
        });

        local.absorb(incoming);
        assert_eq!(local.player_count(), 2);
    }

    #[test]
    fn test_reassign_rewrites_residents() {
        let mut chunk = Chunk::new(ChunkId::new(0, 0), "a:9000");
        chunk.upsert_player(Player {
            id: "p1".to_string(),
            server_ip: "a:9000".to_string(),
            ..Player::default()
        });

        chunk.reassign("b:9000");

        assert_eq!(chunk.server_ip, "b:9000");
        assert_eq!(chunk.player_list[0].server_ip, "b:9000");
        assert!(chunk.is_dirty);
    }
}
