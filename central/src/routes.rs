//! HTTP surface of the central coordinator.
//!
//! `POST /join` assigns a player to a game server; `POST /chunk` (and its
//! `/peer_chunk` alias) mediates chunk ownership on a miss; `GET /health`
//! reports liveness plus the degraded-handoff counter.

use crate::registry::{Claim, Registry};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::warn;
use shared::{ChunkQuery, JoinRequest, Request, Response, CENTRAL_PEER_DEADLINE};
use std::sync::Arc;

/// Shared state behind every route: the ownership registry and the static
/// game-server membership list.
pub struct CentralState {
    pub registry: Registry,
    pub servers: Vec<String>,
}

impl CentralState {
    pub fn new(servers: Vec<String>) -> Self {
        assert!(!servers.is_empty(), "membership list must not be empty");
        Self {
            registry: Registry::new(),
            servers,
        }
    }

    /// Deterministic player-to-server assignment. A reconnecting player
    /// lands on the same server as long as membership is unchanged.
    pub fn assign(&self, player_id: &str) -> String {
        let slot = stable_hash(player_id) % self.servers.len() as u64;
        self.servers[slot as usize].clone()
    }
}

/// FNV-1a. The std hasher is randomly seeded per process, which would
/// break assignment stability across central restarts.
fn stable_hash(id: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in id.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

pub fn app(state: Arc<CentralState>) -> Router {
    Router::new()
        .route("/join", post(join))
        .route("/chunk", post(peer_chunk))
        .route("/peer_chunk", post(peer_chunk))
        .route("/health", get(health))
        .with_state(state)
}

async fn join(
    State(state): State<Arc<CentralState>>,
    Json(req): Json<JoinRequest>,
) -> Json<Response> {
    let assigned = state.assign(&req.player_id);
    log::info!("Player {} joined, assigned to {}", req.player_id, assigned);
    Json(Response::ok(assigned))
}

/// Mediates ownership of a chunk a game server reported a miss for.
///
/// First contact installs the caller and replies `success=false` so the
/// caller knows there was no prior owner. Otherwise the recorded owner is
/// consulted over UDP with the registry lock released; its reply decides
/// whether the entry is rewritten (strict load comparison, ties keep the
/// owner), installed with a compare-and-swap so a concurrent handoff wins.
async fn peer_chunk(
    State(state): State<Arc<CentralState>>,
    Json(query): Json<ChunkQuery>,
) -> Json<Response> {
    let owner = match state
        .registry
        .claim_or_owner(query.chunk_id, &query.caller_ip)
        .await
    {
        Claim::Installed => return Json(Response::failure(query.caller_ip)),
        Claim::Owned(owner) => owner,
    };

    let consult = Request::FromCentral {
        chunk_id: query.chunk_id,
        caller_ip: query.caller_ip.clone(),
        player_count: query.player_count,
    };

    match shared::net::request(&owner, &consult, CENTRAL_PEER_DEADLINE).await {
        Ok(reply) => {
            let callee_count = reply.player_count.unwrap_or(0);
            let current = if callee_count < query.player_count {
                state
                    .registry
                    .reassign_if(query.chunk_id, &owner, &query.caller_ip)
                    .await
            } else {
                owner
            };

            let mut res = Response::ok(current.clone()).with_new_ip(current);
            if let Some(chunk) = reply.chunk {
                res = res.with_chunk(chunk);
            }
            Json(res)
        }
        Err(err) => {
            // The owner is unreachable; decide from the caller's load
            // alone. A long partition can split-brain here.
            let degraded = state.registry.note_degraded();
            warn!(
                "Owner {} unreachable for chunk {} ({}); degraded decision #{}",
                owner, query.chunk_id, err, degraded
            );

            let current = if query.player_count > 0 {
                state
                    .registry
                    .reassign_if(query.chunk_id, &owner, &query.caller_ip)
                    .await
            } else {
                owner
            };
            Json(Response::ok(current.clone()).with_new_ip(current))
        }
    }
}

async fn health(State(state): State<Arc<CentralState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "central is running",
        "data": {
            "chunks": state.registry.len().await,
            "degraded_handoffs": state.registry.degraded_count(),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_servers() -> CentralState {
        CentralState::new(vec!["a:9000".to_string(), "b:9000".to_string()])
    }

    #[test]
    fn test_assignment_is_stable() {
        let state = two_servers();
        let first = state.assign("p1");
        for _ in 0..10 {
            assert_eq!(state.assign("p1"), first);
        }
    }

    #[test]
    fn test_assignment_stays_in_membership() {
        let state = two_servers();
        for id in ["p1", "p2", "p3", "someone-else", ""] {
            let assigned = state.assign(id);
            assert!(state.servers.contains(&assigned));
        }
    }

    #[test]
    fn test_stable_hash_differs_between_ids() {
        assert_ne!(stable_hash("p1"), stable_hash("p2"));
    }
}
