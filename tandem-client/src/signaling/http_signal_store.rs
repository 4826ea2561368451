use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tandem_core::model::{MembershipRequest, RoomAssignment, SignalingMessage};
use tandem_core::traits::SignalStore;
use tracing::debug;

/// Signal store reached over HTTP, as served by `tandem-server`.
#[derive(Debug, Clone)]
pub struct HttpSignalStore {
    http: Client,
    base_url: Url,
}

impl HttpSignalStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid signal store url {base_url}"))?;
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("signal store url {base_url} cannot be a base"));
        }
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("cannot mutate signal store url path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_membership(
        &self,
        url: Url,
        user_id: Option<&str>,
    ) -> Result<reqwest::Response> {
        let body = MembershipRequest {
            user_id: user_id.map(str::to_owned),
        };
        self.http
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("POST {url}"))
    }
}

#[async_trait]
impl SignalStore for HttpSignalStore {
    async fn send_signal(&self, room_id: &str, message: &SignalingMessage) -> Result<()> {
        let url = self.endpoint(&["rooms", room_id, "signals"])?;
        self.http
            .post(url.clone())
            .json(message)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("POST {url}"))?;
        Ok(())
    }

    async fn get_signals(&self, room_id: &str, since: i64) -> Result<Vec<SignalingMessage>> {
        let mut url = self.endpoint(&["rooms", room_id, "signals"])?;
        url.query_pairs_mut()
            .append_pair("since", &since.to_string());
        let messages = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .json::<Vec<SignalingMessage>>()
            .await
            .with_context(|| format!("decoding signals from {url}"))?;
        debug!("Fetched {} signals from room {}", messages.len(), room_id);
        Ok(messages)
    }

    async fn create_room(&self, user_id: Option<&str>) -> Result<RoomAssignment> {
        let url = self.endpoint(&["rooms"])?;
        self.post_membership(url, user_id)
            .await?
            .json::<RoomAssignment>()
            .await
            .context("decoding room assignment")
    }

    async fn join_room(&self, room_id: &str, user_id: Option<&str>) -> Result<RoomAssignment> {
        let url = self.endpoint(&["rooms", room_id, "join"])?;
        self.post_membership(url, user_id)
            .await?
            .json::<RoomAssignment>()
            .await
            .context("decoding room assignment")
    }

    async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<()> {
        let url = self.endpoint(&["rooms", room_id, "leave"])?;
        self.post_membership(url, Some(user_id)).await?;
        Ok(())
    }
}
