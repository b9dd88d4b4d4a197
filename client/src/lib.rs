//! # Player Client Library
//!
//! A headless client for the sharded world: joins through the central,
//! then talks UDP to whichever game server currently owns the chunk under
//! the player's feet, following owner redirects as chunks are handed off
//! between servers.

pub mod session;

pub use session::Session;
