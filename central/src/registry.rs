//! The chunk-to-owner registry.
//!
//! One mutex-guarded map is the single source of truth for ownership.
//! Handlers copy the owner out, perform any peer exchange with the lock
//! released, and install the outcome with a compare-and-swap so a
//! concurrent handoff is never clobbered.

use log::info;
use shared::ChunkId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Outcome of a server's first-touch claim on a chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum Claim {
    /// The chunk had never been requested; the caller is now its owner.
    Installed,
    /// The chunk already has an owner; the peer exchange decides.
    Owned(String),
}

/// Mutex-guarded `ChunkId → owner endpoint` map plus the counter of
/// degraded tiebreak decisions taken while an owner was unreachable.
#[derive(Default)]
pub struct Registry {
    zone: Mutex<HashMap<ChunkId, String>>,
    degraded: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn owner_of(&self, id: ChunkId) -> Option<String> {
        self.zone.lock().await.get(&id).cloned()
    }

    /// Installs `caller` as owner when the chunk is unassigned, otherwise
    /// returns the current owner untouched.
    pub async fn claim_or_owner(&self, id: ChunkId, caller: &str) -> Claim {
        let mut zone = self.zone.lock().await;
        match zone.get(&id) {
            Some(owner) => Claim::Owned(owner.clone()),
            None => {
                zone.insert(id, caller.to_string());
                info!("Assigned chunk {} to server {}", id, caller);
                Claim::Installed
            }
        }
    }

    /// Rewrites the entry to `new_owner` only if it still reads
    /// `expected`; a concurrent rewrite wins. Returns whichever owner is
    /// current after the attempt.
    pub async fn reassign_if(&self, id: ChunkId, expected: &str, new_owner: &str) -> String {
        let mut zone = self.zone.lock().await;
        match zone.get_mut(&id) {
            Some(owner) if owner == expected => {
                info!("Chunk {} handed off: {} -> {}", id, expected, new_owner);
                *owner = new_owner.to_string();
                new_owner.to_string()
            }
            Some(owner) => owner.clone(),
            None => {
                // Entries are never removed; treat a vanished one as a
                // fresh claim by the new owner.
                zone.insert(id, new_owner.to_string());
                new_owner.to_string()
            }
        }
    }

    /// Records one degraded tiebreak decision and returns the new total.
    pub fn note_degraded(&self) -> u64 {
        self.degraded.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn degraded_count(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.zone.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
