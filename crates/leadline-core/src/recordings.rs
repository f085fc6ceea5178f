//! Recording lookup: copy recording URLs from the voice platform onto local call records.

use std::collections::HashMap;

use futures_util::future::join_all;

use crate::backend::{CallStore, CALL_LIST_LIMIT};
use crate::error::{BackendError, RecordingError};
use crate::vapi::VoicePlatform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingLookup {
    /// Already on the local record.
    Cached(String),
    /// Found remotely during this lookup.
    Fetched(String),
    /// The platform has no recording for the call yet.
    NotReady,
}

impl RecordingLookup {
    pub fn url(&self) -> Option<&str> {
        match self {
            RecordingLookup::Cached(u) | RecordingLookup::Fetched(u) => Some(u),
            RecordingLookup::NotReady => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingSyncReport {
    pub updated: usize,
    /// Local calls that were missing a recording.
    pub checked: usize,
}

/// Recording URL for one call: the cached value, else a remote lookup that is saved when found.
pub async fn fetch_recording(
    calls: &dyn CallStore,
    platform: &dyn VoicePlatform,
    call_id: &str,
) -> Result<RecordingLookup, RecordingError> {
    let call = calls.get_call(call_id).await.map_err(|e| match e {
        BackendError::NotFound(_) => RecordingError::NotFound(call_id.to_string()),
        other => RecordingError::Lookup(other),
    })?;

    if let Some(url) = call.recording_url.as_deref().filter(|u| !u.is_empty()) {
        return Ok(RecordingLookup::Cached(url.to_string()));
    }

    let provider_call_id = call
        .provider_call_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RecordingError::MissingProviderCallId(call_id.to_string()))?;

    let remote = platform.get_call(provider_call_id).await?;
    let Some(url) = remote.recording_url() else {
        return Ok(RecordingLookup::NotReady);
    };

    if let Err(e) = calls.save_recording(call_id, url).await {
        tracing::warn!("[RECORDINGS] could not save recording for call {}: {}", call_id, e);
    }
    Ok(RecordingLookup::Fetched(url.to_string()))
}

/// Fill in missing recording URLs for the most recent local calls by matching them against the
/// platform's recent calls. Writes run concurrently and each failure is isolated.
pub async fn sync_recordings(
    calls: &dyn CallStore,
    platform: &dyn VoicePlatform,
) -> Result<RecordingSyncReport, RecordingError> {
    let local = calls.list_calls(CALL_LIST_LIMIT).await.map_err(RecordingError::Lookup)?;
    let missing: Vec<_> = local.into_iter().filter(|c| !c.has_recording()).collect();
    if missing.is_empty() {
        return Ok(RecordingSyncReport::default());
    }

    let remote = platform.list_calls(CALL_LIST_LIMIT).await?;
    let urls: HashMap<&str, &str> = remote
        .iter()
        .filter_map(|c| Some((c.id.as_str(), c.recording_url()?)))
        .collect();

    let writes = missing.iter().filter_map(|call| {
        let provider_id = call.provider_call_id.as_deref()?;
        let url = *urls.get(provider_id)?;
        Some(async move { (call.id.as_str(), calls.save_recording(&call.id, url).await) })
    });

    let mut updated = 0;
    for (id, result) in join_all(writes).await {
        match result {
            Ok(()) => updated += 1,
            Err(e) => tracing::warn!("[RECORDINGS] update for call {} failed: {}", id, e),
        }
    }

    tracing::info!("[RECORDINGS] synced {} of {} calls missing a recording", updated, missing.len());
    Ok(RecordingSyncReport { updated, checked: missing.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_call, FakePlatform, MemoryBackend};
    use crate::vapi::RemoteCall;

    fn remote(id: &str, url: Option<&str>) -> RemoteCall {
        RemoteCall { id: id.into(), recording_url: url.map(String::from), artifact: None }
    }

    #[tokio::test]
    async fn test_cached_url_skips_remote() {
        let backend = MemoryBackend::new();
        let mut call = sample_call("c1");
        call.recording_url = Some("https://r/c1.wav".into());
        backend.insert_call(call);
        let platform = FakePlatform::new();
        let got = fetch_recording(&backend, &platform, "c1").await.unwrap();
        assert_eq!(got, RecordingLookup::Cached("https://r/c1.wav".into()));
        assert!(platform.ops().is_empty());
    }

    #[tokio::test]
    async fn test_fetched_url_is_saved() {
        let backend = MemoryBackend::new();
        let mut call = sample_call("c1");
        call.provider_call_id = Some("v1".into());
        backend.insert_call(call);
        let platform = FakePlatform::new();
        platform.insert_call(remote("v1", Some("https://r/v1.wav")));
        let got = fetch_recording(&backend, &platform, "c1").await.unwrap();
        assert_eq!(got.url(), Some("https://r/v1.wav"));
        assert_eq!(backend.call("c1").unwrap().recording_url.as_deref(), Some("https://r/v1.wav"));
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let backend = MemoryBackend::new();
        backend.insert_call(sample_call("c1"));
        let platform = FakePlatform::new();
        assert!(matches!(
            fetch_recording(&backend, &platform, "c1").await,
            Err(RecordingError::MissingProviderCallId(_))
        ));
        assert!(matches!(fetch_recording(&backend, &platform, "zz").await, Err(RecordingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_not_ready_when_remote_has_no_url() {
        let backend = MemoryBackend::new();
        let mut call = sample_call("c1");
        call.provider_call_id = Some("v1".into());
        backend.insert_call(call);
        let platform = FakePlatform::new();
        platform.insert_call(remote("v1", None));
        assert_eq!(fetch_recording(&backend, &platform, "c1").await.unwrap(), RecordingLookup::NotReady);
    }

    #[tokio::test]
    async fn test_sync_recordings_isolates_failed_write() {
        let backend = MemoryBackend::new();
        for (id, provider) in [("c1", "v1"), ("c2", "v2"), ("c3", "v3")] {
            let mut call = sample_call(id);
            call.provider_call_id = Some(provider.into());
            backend.insert_call(call);
        }
        let mut done = sample_call("c4");
        done.recording_url = Some("https://r/old.wav".into());
        backend.insert_call(done);
        backend.fail_recording_for("c2");

        let platform = FakePlatform::new();
        platform.insert_call(remote("v1", Some("https://r/v1.wav")));
        platform.insert_call(remote("v2", Some("https://r/v2.wav")));
        platform.insert_call(remote("v3", None));

        let report = sync_recordings(&backend, &platform).await.unwrap();
        assert_eq!(report, RecordingSyncReport { updated: 1, checked: 3 });
        assert!(backend.call("c1").unwrap().has_recording());
        assert!(!backend.call("c2").unwrap().has_recording());
    }

    #[tokio::test]
    async fn test_sync_with_nothing_missing_does_not_call_remote() {
        let backend = MemoryBackend::new();
        let platform = FakePlatform::new();
        let report = sync_recordings(&backend, &platform).await.unwrap();
        assert_eq!(report.checked, 0);
        assert!(platform.ops().is_empty());
    }
}
