//! HTTP client for the central coordinator.

use shared::{ChunkId, ChunkQuery, ProtocolError, Response, CENTRAL_PEER_DEADLINE};

/// Thin wrapper around a reqwest client pinned to the central's base URL,
/// with the miss-lookup deadline applied to every call.
pub struct CentralClient {
    http: reqwest::Client,
    base_url: String,
}

impl CentralClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(CENTRAL_PEER_DEADLINE)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Asks the central who owns `chunk_id`, reporting our own load so it
    /// can arbitrate a handoff. A `success=false` reply means the chunk
    /// had no owner and the registry now lists us.
    pub async fn query_owner(
        &self,
        chunk_id: ChunkId,
        caller_ip: &str,
        player_count: usize,
    ) -> Result<Response, ProtocolError> {
        let query = ChunkQuery::new(chunk_id, caller_ip, player_count);
        let reply = self
            .http
            .post(format!("{}/chunk", self.base_url))
            .json(&query)
            .send()
            .await
            .map_err(|err| ProtocolError::Central(err.to_string()))?
            .json::<Response>()
            .await
            .map_err(|err| ProtocolError::Central(err.to_string()))?;
        Ok(reply)
    }
}
