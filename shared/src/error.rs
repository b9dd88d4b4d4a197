//! Failure kinds that may cross a component boundary.

use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong between two processes of the system.
///
/// Handlers never let one of these escape across the wire: a failing step
/// is either logged and absorbed or turned into a `success=false` reply.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A socket operation failed outright.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),

    /// The peer did not reply before the deadline.
    #[error("no reply within {0:?}")]
    Deadline(Duration),

    /// An HTTP hop to the central failed.
    #[error("central unreachable: {0}")]
    Central(String),

    /// A payload was not the JSON object we expected.
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// An encoded payload would not fit in a single datagram.
    #[error("payload of {0} bytes exceeds the 64 KiB datagram limit")]
    Oversized(usize),

    /// The request carried a discriminator outside the protocol.
    #[error("unknown request type")]
    UnknownRequest,

    /// A redirect chain failed to converge on an owner.
    #[error("redirect chain did not converge after {0} hops")]
    RedirectChain(u32),
}
