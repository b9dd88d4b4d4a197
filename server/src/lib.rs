//! # Game Server Library
//!
//! One instance of the replicated game server: it holds in-memory state
//! for the chunks it owns, serves the typed UDP protocol for them, and
//! cooperates in ownership handoffs.
//!
//! A request for a chunk this server does not own triggers a lookup on the
//! central coordinator. Depending on the outcome the server either becomes
//! the owner (first contact, or the central decided the load balance in
//! its favor) or redirects the client to the real owner, pushing any
//! stale local state across with a `MERGE` first. The inverse side of the
//! same dance is the `FROM_CENTRAL` handler, where this server is the
//! owner being asked to yield.
//!
//! ## Module Organization
//!
//! - [`store`]: the mutex-guarded chunk map and player index.
//! - [`network`]: the UDP loop and one handler per request type.
//! - [`central`]: the HTTP client for the central's `/chunk` endpoint.

pub mod central;
pub mod network;
pub mod store;
