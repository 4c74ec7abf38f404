//! Typed client for the item service HTTP API.

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Serialize)]
struct ItemPayload<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("{status}: {message}")]
    Api {
        status: StatusCode,
        message: String,
        /// `traceparent` of the failed request, for correlating with logs.
        traceparent: Option<String>,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }
}

pub struct ItemClient {
    client: Client,
    base_url: String,
}

impl ItemClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create(&self, name: &str) -> Result<Item, ClientError> {
        let resp = self
            .client
            .post(format!("{}/items", self.base_url))
            .json(&ItemPayload { name })
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn get(&self, id: u64) -> Result<Item, ClientError> {
        self.get_raw(&id.to_string()).await
    }

    /// Fetch with an arbitrary path segment, e.g. to send malformed ids.
    pub async fn get_raw(&self, id: &str) -> Result<Item, ClientError> {
        let resp = self
            .client
            .get(format!("{}/items/{}", self.base_url, id))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn list(&self) -> Result<Vec<Item>, ClientError> {
        let resp = self
            .client
            .get(format!("{}/items", self.base_url))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn update(&self, id: u64, name: &str) -> Result<Item, ClientError> {
        let resp = self
            .client
            .put(format!("{}/items/{}", self.base_url, id))
            .json(&ItemPayload { name })
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn delete(&self, id: u64) -> Result<(), ClientError> {
        let resp = self
            .client
            .delete(format!("{}/items/{}", self.base_url, id))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// POST to an arbitrary path with no body (debug routes).
    pub async fn post_empty(&self, path: &str) -> Result<Response, ClientError> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await?)
    }
}

async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let traceparent = resp
        .headers()
        .get("traceparent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
    };
    Err(ClientError::Api {
        status,
        message,
        traceparent,
    })
}
