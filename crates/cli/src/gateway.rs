use archiver_core::{ChannelClient, ChannelMetadata, PeerAddress, RawMessage, RemoteError};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// `ChannelClient` backed by the JSON channel gateway.
pub struct HttpChannelClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpChannelClient {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("gateway URL {} cannot be used as a base", base_url);
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
        subject: &str,
    ) -> Result<T, RemoteError> {
        let mut request = self.client.get(url.clone()).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RemoteError::Transient(err.to_string()))?;
        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "gateway response");

        if !status.is_success() {
            return Err(status_error(status, subject));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| RemoteError::Transient(format!("invalid gateway response: {}", err)))
    }
}

fn status_error(status: StatusCode, subject: &str) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound(subject.to_string()),
        StatusCode::UNPROCESSABLE_ENTITY => RemoteError::WrongEntityKind(subject.to_string()),
        other => RemoteError::Transient(format!("gateway returned HTTP {}", other)),
    }
}

fn history_query(peer: &PeerAddress, cursor: Option<i64>, limit: i64) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("access_hash", peer.access_hash.to_string()),
        ("limit", limit.to_string()),
    ];
    if let Some(cursor) = cursor {
        query.push(("offset_id", cursor.to_string()));
    }
    query
}

#[derive(Deserialize)]
struct ResolveResponse {
    peer: PeerAddress,
    channel: ChannelMetadata,
}

#[derive(Deserialize)]
struct PeerResponse {
    peer: PeerAddress,
}

#[derive(Deserialize)]
struct ChannelResponse {
    channel: ChannelMetadata,
}

#[derive(Deserialize)]
struct FollowedResponse {
    #[serde(default)]
    channels: Vec<ChannelMetadata>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[async_trait]
impl ChannelClient for HttpChannelClient {
    async fn resolve_handle(
        &self,
        handle: &str,
    ) -> Result<(PeerAddress, ChannelMetadata), RemoteError> {
        let url = self.url(&["v1", "resolve", handle]);
        let body: ResolveResponse = self.get_json(url, &[], handle).await?;
        Ok((body.peer, body.channel))
    }

    async fn resolve_numeric_id(&self, id: i64) -> Result<PeerAddress, RemoteError> {
        let id = id.to_string();
        let url = self.url(&["v1", "channels", &id, "peer"]);
        let body: PeerResponse = self.get_json(url, &[], &id).await?;
        Ok(body.peer)
    }

    async fn channel_metadata(&self, peer: &PeerAddress) -> Result<ChannelMetadata, RemoteError> {
        let id = peer.channel_id.to_string();
        let url = self.url(&["v1", "channels", &id]);
        let query = [("access_hash", peer.access_hash.to_string())];
        let body: ChannelResponse = self.get_json(url, &query, &id).await?;
        Ok(body.channel)
    }

    async fn followed_channels(&self, limit: i64) -> Result<Vec<ChannelMetadata>, RemoteError> {
        let url = self.url(&["v1", "dialogs", "channels"]);
        let query = [("limit", limit.to_string())];
        let body: FollowedResponse = self.get_json(url, &query, "followed channels").await?;
        Ok(body.channels)
    }

    async fn fetch_history(
        &self,
        peer: &PeerAddress,
        cursor: Option<i64>,
        limit: i64,
    ) -> Result<Vec<RawMessage>, RemoteError> {
        let id = peer.channel_id.to_string();
        let url = self.url(&["v1", "channels", &id, "history"]);
        let query = history_query(peer, cursor, limit);
        let body: HistoryResponse = self.get_json(url, &query, &id).await?;
        Ok(body.messages)
    }
}
