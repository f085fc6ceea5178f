//! Persistence backend: REST CRUD for agents and calls.
//!
//! The backend owns the schema. These traits cover only the calls the core makes, and
//! `RestBackend` implements both against the HTTP API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::agent::{Agent, AgentSave, AgentUpdate};
use crate::call::{Call, CallAnalysis, WebCallLog};
use crate::error::BackendError;
use crate::http::join_url;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Page size for call listings.
pub const CALL_LIST_LIMIT: usize = 100;

#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<Agent>, BackendError>;
    async fn save_agent(&self, agent: &AgentSave) -> Result<Agent, BackendError>;
    async fn get_agent(&self, id: &str) -> Result<Agent, BackendError>;
    async fn update_agent(&self, id: &str, update: &AgentUpdate) -> Result<Agent, BackendError>;
    async fn delete_agent(&self, id: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait CallStore: Send + Sync {
    async fn get_call(&self, id: &str) -> Result<Call, BackendError>;
    async fn list_calls(&self, limit: usize) -> Result<Vec<Call>, BackendError>;
    async fn save_recording(&self, id: &str, recording_url: &str) -> Result<(), BackendError>;
    async fn save_analysis(&self, id: &str, analysis: &CallAnalysis) -> Result<(), BackendError>;
    /// Store a finished browser call; returns the new call id.
    async fn log_web_call(&self, log: &WebCallLog) -> Result<String, BackendError>;
}

/// HTTP implementation of both stores.
pub struct RestBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct LoggedCall {
    id: String,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self { base_url: base_url.into(), client }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn check(res: reqwest::Response, what: &str) -> Result<reqwest::Response, BackendError> {
        let status = res.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(BackendError::Status { status: status.as_u16(), body });
        }
        Ok(res)
    }

    async fn decode<T: DeserializeOwned>(res: reqwest::Response, what: &str) -> Result<T, BackendError> {
        Self::check(res, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AgentStore for RestBackend {
    async fn list_agents(&self) -> Result<Vec<Agent>, BackendError> {
        let res = self.client.get(self.url("api/agents/")).send().await?;
        Self::decode(res, "agents").await
    }

    async fn save_agent(&self, agent: &AgentSave) -> Result<Agent, BackendError> {
        let res = self.client.post(self.url("api/agents/save")).json(agent).send().await?;
        Self::decode(res, "agents/save").await
    }

    async fn get_agent(&self, id: &str) -> Result<Agent, BackendError> {
        let res = self.client.get(self.url(&format!("api/agents/{}/info", id))).send().await?;
        Self::decode(res, id).await
    }

    async fn update_agent(&self, id: &str, update: &AgentUpdate) -> Result<Agent, BackendError> {
        let res = self.client.patch(self.url(&format!("api/agents/{}", id))).json(update).send().await?;
        Self::decode(res, id).await
    }

    async fn delete_agent(&self, id: &str) -> Result<(), BackendError> {
        let res = self.client.delete(self.url(&format!("api/agents/{}", id))).send().await?;
        Self::check(res, id).await.map(|_| ())
    }
}

#[async_trait]
impl CallStore for RestBackend {
    async fn get_call(&self, id: &str) -> Result<Call, BackendError> {
        let res = self.client.get(self.url(&format!("api/calls/{}", id))).send().await?;
        Self::decode(res, id).await
    }

    async fn list_calls(&self, limit: usize) -> Result<Vec<Call>, BackendError> {
        let res = self.client.get(self.url("api/calls/")).query(&[("limit", limit)]).send().await?;
        Self::decode(res, "calls").await
    }

    async fn save_recording(&self, id: &str, recording_url: &str) -> Result<(), BackendError> {
        let res = self
            .client
            .patch(self.url(&format!("api/calls/{}/recording", id)))
            .json(&json!({ "recording_url": recording_url }))
            .send()
            .await?;
        Self::check(res, id).await.map(|_| ())
    }

    async fn save_analysis(&self, id: &str, analysis: &CallAnalysis) -> Result<(), BackendError> {
        let res = self
            .client
            .patch(self.url(&format!("api/calls/{}/analysis", id)))
            .json(analysis)
            .send()
            .await?;
        Self::check(res, id).await.map(|_| ())
    }

    async fn log_web_call(&self, log: &WebCallLog) -> Result<String, BackendError> {
        let res = self.client.post(self.url("api/calls/log-web-call")).json(log).send().await?;
        let logged: LoggedCall = Self::decode(res, "calls/log-web-call").await?;
        Ok(logged.id)
    }
}
