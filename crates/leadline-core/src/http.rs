//! Shared reqwest client construction for the outbound collaborators.

use std::time::Duration;

/// Default per-request timeout for calls to the backend, the voice platform and the model.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Build the client every collaborator shares. Falls back to a default client if the builder
/// rejects the configuration.
pub fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    let timeout = if timeout_secs == 0 { DEFAULT_HTTP_TIMEOUT_SECS } else { timeout_secs };
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("[HTTP] client builder failed ({}), using defaults", e);
            reqwest::Client::new()
        })
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
