//! HTTP error mapping. Every core error becomes a status code plus an `{error}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use leadline_core::{
    BackendError, ModelError, PlatformError, ProvisionError, RecordingError, ScoringError, SyncError,
};

pub const UNPARSEABLE_MESSAGE: &str = "Gemini returned unparseable JSON";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    raw: Option<String>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), raw: None }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Platform failure where the remote status is passed through. A missing key is a server
    /// misconfiguration; transport and decode failures are a bad gateway.
    pub fn platform(e: &PlatformError) -> Self {
        let status = match e {
            PlatformError::MissingKey => StatusCode::INTERNAL_SERVER_ERROR,
            PlatformError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            PlatformError::Request(_) | PlatformError::Decode(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string())
    }

    /// Platform failure where every remote problem reports as 502.
    pub fn platform_bad_gateway(e: &PlatformError) -> Self {
        match e {
            PlatformError::MissingKey => Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            _ => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("[GATEWAY] {} {}", self.status.as_u16(), self.message);
        } else {
            tracing::warn!("[GATEWAY] {} {}", self.status.as_u16(), self.message);
        }
        let body = match self.raw {
            Some(raw) => json!({ "error": self.message, "raw": raw }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PlatformError> for ApiError {
    fn from(e: PlatformError) -> Self {
        ApiError::platform(&e)
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound(what) => ApiError::new(StatusCode::NOT_FOUND, format!("Not found: {}", what)),
            other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl From<ProvisionError> for ApiError {
    fn from(e: ProvisionError) -> Self {
        match e {
            ProvisionError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, "Agent not found"),
            ProvisionError::Remote(p) => ApiError::platform(&p),
            other @ (ProvisionError::LocalSave { .. } | ProvisionError::Local(_)) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        let status = match &e {
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::MissingAssistant(_) => StatusCode::BAD_REQUEST,
            SyncError::RemoteFetch(PlatformError::MissingKey) => StatusCode::INTERNAL_SERVER_ERROR,
            SyncError::RemoteFetch(_) => StatusCode::BAD_GATEWAY,
            SyncError::LocalRead(_) | SyncError::LocalWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<ScoringError> for ApiError {
    fn from(e: ScoringError) -> Self {
        match e {
            ScoringError::Parse { raw, .. } => ApiError::new(StatusCode::BAD_GATEWAY, UNPARSEABLE_MESSAGE).with_raw(raw),
            ScoringError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, e.to_string()),
            ScoringError::Model(ModelError::MissingKey) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, ModelError::MissingKey.to_string())
            }
            ScoringError::Model(m) => ApiError::new(StatusCode::BAD_GATEWAY, m.to_string()),
            ScoringError::Lookup(_) | ScoringError::Persist(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl From<RecordingError> for ApiError {
    fn from(e: RecordingError) -> Self {
        match e {
            RecordingError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, e.to_string()),
            RecordingError::MissingProviderCallId(_) => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
            RecordingError::Lookup(_) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            RecordingError::Remote(p) => ApiError::platform(&p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_passes_through() {
        let err = ApiError::from(PlatformError::Upstream { status: 422, body: "bad voice".into() });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.message(), "Vapi error (422): bad voice");
        assert_eq!(ApiError::from(PlatformError::MissingKey).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_sync_error_statuses() {
        assert_eq!(ApiError::from(SyncError::NotFound("a".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(SyncError::MissingAssistant("a".into())).status(), StatusCode::BAD_REQUEST);
        let remote = SyncError::RemoteFetch(PlatformError::Upstream { status: 500, body: "x".into() });
        assert_eq!(ApiError::from(remote).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_parse_failure_keeps_raw() {
        let err = ApiError::from(ScoringError::Parse { reason: "eof".into(), raw: "not json".into() });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.raw.as_deref(), Some("not json"));
        assert_eq!(err.message(), UNPARSEABLE_MESSAGE);
    }
}
