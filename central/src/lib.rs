//! # Central Coordinator Library
//!
//! The central holds the authoritative mapping from chunk coordinates to
//! the game server that owns them, assigns joining players to a server,
//! and mediates ownership when a server reports traffic for a chunk it
//! does not own.
//!
//! Mediation works peer-first: the central consults the recorded owner
//! over UDP, compares the two servers' resident counts, and only rewrites
//! the registry when the caller is strictly heavier. The moment the
//! registry entry is rewritten is the linearization point of a handoff;
//! everything else (the `MERGE` push, client redirects) follows from it.

pub mod registry;
pub mod routes;

pub use registry::Registry;
pub use routes::{app, CentralState};
