//! Voice platform (Vapi) client: assistant CRUD and call lookups.
//!
//! Assistants are modelled loosely. Only `id`, `name`, `firstMessage` and `model` are read; every
//! other field is kept verbatim in `extra` so nothing is lost when a record passes through.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PlatformError;
use crate::http::join_url;

pub const VAPI_BASE_URL: &str = "https://api.vapi.ai";

// ---------------------------------------------------------------------------
// Remote records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assistant {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
    /// Model configuration, opaque apart from `messages`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Assistant {
    /// Content of the first `system` entry in `model.messages`.
    pub fn system_prompt(&self) -> Option<&str> {
        self.model
            .as_ref()?
            .get("messages")?
            .as_array()?
            .iter()
            .find(|m| m.get("role").and_then(Value::as_str) == Some("system"))?
            .get("content")?
            .as_str()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
}

/// Remote call object. Only the recording location matters here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCall {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<CallArtifact>,
}

impl RemoteCall {
    /// Top-level `recordingUrl`, else `artifact.recordingUrl`. Empty strings count as absent.
    pub fn recording_url(&self) -> Option<&str> {
        self.recording_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| {
                self.artifact
                    .as_ref()
                    .and_then(|a| a.recording_url.as_deref())
                    .filter(|u| !u.is_empty())
            })
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Operations the core needs from the voice platform.
#[async_trait]
pub trait VoicePlatform: Send + Sync {
    async fn create_assistant(&self, payload: &Value) -> Result<Assistant, PlatformError>;
    async fn get_assistant(&self, id: &str) -> Result<Assistant, PlatformError>;
    async fn update_assistant(&self, id: &str, patch: &Value) -> Result<Assistant, PlatformError>;
    async fn delete_assistant(&self, id: &str) -> Result<(), PlatformError>;
    async fn list_assistants(&self, limit: usize) -> Result<Vec<Assistant>, PlatformError>;
    async fn get_call(&self, id: &str) -> Result<RemoteCall, PlatformError>;
    async fn list_calls(&self, limit: usize) -> Result<Vec<RemoteCall>, PlatformError>;

    /// Lightweight credential check: list a single assistant.
    async fn verify_credential(&self) -> Result<(), PlatformError> {
        self.list_assistants(1).await.map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Bearer-authenticated REST client for the platform.
pub struct VapiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl VapiClient {
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: VAPI_BASE_URL.to_string(),
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, PlatformError> {
        let key = self.api_key.as_deref().ok_or(PlatformError::MissingKey)?;
        Ok(self.client.request(method, join_url(&self.base_url, path)).bearer_auth(key))
    }

    async fn send<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T, PlatformError> {
        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PlatformError::Upstream { status: status.as_u16(), body });
        }
        res.json::<T>().await.map_err(|e| PlatformError::Decode(e.to_string()))
    }
}

#[async_trait]
impl VoicePlatform for VapiClient {
    async fn create_assistant(&self, payload: &Value) -> Result<Assistant, PlatformError> {
        Self::send(self.request(reqwest::Method::POST, "assistant")?.json(payload)).await
    }

    async fn get_assistant(&self, id: &str) -> Result<Assistant, PlatformError> {
        Self::send(self.request(reqwest::Method::GET, &format!("assistant/{}", id))?).await
    }

    async fn update_assistant(&self, id: &str, patch: &Value) -> Result<Assistant, PlatformError> {
        Self::send(self.request(reqwest::Method::PATCH, &format!("assistant/{}", id))?.json(patch)).await
    }

    async fn delete_assistant(&self, id: &str) -> Result<(), PlatformError> {
        let res = self.request(reqwest::Method::DELETE, &format!("assistant/{}", id))?.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PlatformError::Upstream { status: status.as_u16(), body });
        }
        Ok(())
    }

    async fn list_assistants(&self, limit: usize) -> Result<Vec<Assistant>, PlatformError> {
        let req = self.request(reqwest::Method::GET, "assistant")?.query(&[("limit", limit)]);
        Self::send(req).await
    }

    async fn get_call(&self, id: &str) -> Result<RemoteCall, PlatformError> {
        Self::send(self.request(reqwest::Method::GET, &format!("call/{}", id))?).await
    }

    async fn list_calls(&self, limit: usize) -> Result<Vec<RemoteCall>, PlatformError> {
        let req = self.request(reqwest::Method::GET, "call")?.query(&[("limit", limit)]);
        Self::send(req).await
    }
}
