//! External analysis seam.
//!
//! The actual media and document processing lives outside this crate. The
//! resource manager only needs a result string or an error, so it talks to
//! an [`AnalysisBackend`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use slideai_core::{Error, FileRecord, Result, ServiceType};

/// Processes a stored upload and returns its result payload.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Analyze `data`, which is stored under `record`.
    async fn analyze(&self, service: ServiceType, record: &FileRecord, data: &[u8])
        -> Result<String>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Stand-in backend that returns canned results without inspecting content.
#[derive(Debug, Default, Clone)]
pub struct PlaceholderAnalysis;

impl PlaceholderAnalysis {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AnalysisBackend for PlaceholderAnalysis {
    async fn analyze(
        &self,
        service: ServiceType,
        record: &FileRecord,
        _data: &[u8],
    ) -> Result<String> {
        Ok(match service {
            ServiceType::VideoAbstract => format!(
                "AI summary of video {}: key scenes, dialogue and main storyline analyzed.",
                record.file_name
            ),
            ServiceType::PptToVideo => format!("Generated video: {}.mp4", Uuid::now_v7()),
        })
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

/// Scriptable backend for tests: fixed response, switchable failure and a
/// call counter.
#[derive(Debug, Default)]
pub struct MockAnalysis {
    response: String,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockAnalysis {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        let mock = Self::new("");
        mock.set_fail(true);
        mock
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisBackend for MockAnalysis {
    async fn analyze(
        &self,
        _service: ServiceType,
        record: &FileRecord,
        _data: &[u8],
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Analysis(format!(
                "mock analysis failed for {}",
                record.file_name
            )));
        }
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use slideai_core::FileState;

    fn record(name: &str) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: Uuid::now_v7(),
            user_id: 1,
            file_name: name.to_string(),
            file_path: "files/aa/bb/x.bin".to_string(),
            service_type: ServiceType::VideoAbstract,
            file_size: 3,
            status: FileState::Processing,
            created_at: now,
            expires_at: now + chrono::Duration::days(3),
            analysis_result: None,
        }
    }

    #[tokio::test]
    async fn test_placeholder_mentions_file_name() {
        let result = PlaceholderAnalysis::new()
            .analyze(ServiceType::VideoAbstract, &record("talk.mp4"), b"abc")
            .await
            .unwrap();
        assert!(result.contains("talk.mp4"));
    }

    #[tokio::test]
    async fn test_placeholder_slides_produce_video_name() {
        let result = PlaceholderAnalysis::new()
            .analyze(ServiceType::PptToVideo, &record("deck.pdf"), b"abc")
            .await
            .unwrap();
        assert!(result.starts_with("Generated video: "));
        assert!(result.ends_with(".mp4"));
    }

    #[tokio::test]
    async fn test_mock_failure_switch() {
        let mock = MockAnalysis::new("ok");
        assert_eq!(
            mock.analyze(ServiceType::VideoAbstract, &record("a"), b"")
                .await
                .unwrap(),
            "ok"
        );
        mock.set_fail(true);
        assert!(matches!(
            mock.analyze(ServiceType::VideoAbstract, &record("a"), b"").await,
            Err(Error::Analysis(_))
        ));
        assert_eq!(mock.call_count(), 2);
    }
}
