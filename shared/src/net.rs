//! One-shot UDP request/reply with an explicit deadline.
//!
//! Every inter-process exchange in the system is a single request datagram
//! answered by a single reply datagram, so the one helper below serves the
//! client talking to a game server, a game server pushing a `MERGE` to a
//! peer, and the central consulting a chunk owner.

use crate::error::ProtocolError;
use crate::protocol::{Request, Response};
use crate::MAX_DATAGRAM;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Sends `req` to `peer` from an ephemeral socket and awaits one reply.
///
/// Fails with [`ProtocolError::Oversized`] instead of fragmenting, and
/// with [`ProtocolError::Deadline`] when no reply arrives in time.
pub async fn request(
    peer: &str,
    req: &Request,
    deadline: Duration,
) -> Result<Response, ProtocolError> {
    let payload = serde_json::to_vec(req)?;
    if payload.len() > MAX_DATAGRAM {
        return Err(ProtocolError::Oversized(payload.len()));
    }

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(peer).await?;
    socket.send(&payload).await?;

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let n = match timeout(deadline, socket.recv(&mut buf)).await {
        Ok(received) => received?,
        Err(_) => return Err(ProtocolError::Deadline(deadline)),
    };

    Ok(serde_json::from_slice(&buf[..n])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ChunkId;

    /// Minimal peer that answers one datagram with a canned reply.
    async fn one_shot_peer(reply: Response) -> String {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            let (_, from) = socket.recv_from(&mut buf).await.unwrap();
            let payload = serde_json::to_vec(&reply).unwrap();
            socket.send_to(&payload, from).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn test_request_roundtrip() {
        let peer = one_shot_peer(Response::ok("pong")).await;

        let res = request(
            &peer,
            &Request::ReadOnly {
                chunk_id: ChunkId::new(0, 0),
                is_chunk_new: true,
            },
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(res.success);
        assert_eq!(res.message, "pong");
    }

    #[tokio::test]
    async fn test_request_deadline() {
        // Bound but silent peer.
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = socket.local_addr().unwrap().to_string();

        let err = request(&peer, &Request::Unknown, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, ProtocolError::Deadline(_)));
    }
}
