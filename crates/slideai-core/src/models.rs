//! Core data models for the SlideAI resource manager.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// IDENTITY TYPES
// =============================================================================

/// An authenticated caller as resolved from the external identity store.
///
/// The credential hash stays in the external store and is never loaded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Identifier assigned by the external store.
    pub id: i64,
    /// Lookup key (login e-mail / token subject).
    pub key: String,
    /// Privileged identities bypass the quota and leave no usage history.
    pub is_privileged: bool,
}

impl Identity {
    pub fn new(id: i64, key: impl Into<String>, is_privileged: bool) -> Self {
        Self {
            id,
            key: key.into(),
            is_privileged,
        }
    }
}

// =============================================================================
// SERVICE TYPES
// =============================================================================

/// Billable operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Summarize an uploaded video.
    VideoAbstract,
    /// Render an uploaded slide deck (PDF) into a narrated video.
    PptToVideo,
}

impl ServiceType {
    pub const ALL: [ServiceType; 2] = [ServiceType::VideoAbstract, ServiceType::PptToVideo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoAbstract => "video_abstract",
            Self::PptToVideo => "ppt_to_video",
        }
    }

    /// Whether a claimed MIME type is acceptable input for this service.
    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        let content_type = content_type.trim().to_ascii_lowercase();
        match self {
            Self::VideoAbstract => content_type.starts_with("video/"),
            Self::PptToVideo => content_type == "application/pdf",
        }
    }

    /// Human-readable description of the accepted input kind.
    pub fn accepted_kind(&self) -> &'static str {
        match self {
            Self::VideoAbstract => "video files",
            Self::PptToVideo => "PDF files",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video_abstract" => Ok(Self::VideoAbstract),
            "ppt_to_video" => Ok(Self::PptToVideo),
            _ => Err(format!("Invalid service type: {}", s)),
        }
    }
}

// =============================================================================
// USAGE TYPES
// =============================================================================

/// A single granted, non-privileged operation. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: Uuid,
    pub user_id: i64,
    pub service_type: ServiceType,
    pub usage_date: DateTime<Utc>,
}

/// Request for recording a usage event.
#[derive(Debug, Clone)]
pub struct NewUsageEvent {
    pub user_id: i64,
    pub service_type: ServiceType,
    pub usage_date: DateTime<Utc>,
}

/// Today's quota position for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStatus {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
    pub is_privileged: bool,
}

impl UsageStatus {
    /// Status for a non-privileged identity with `used` events today.
    pub fn from_count(used: i64, limit: i64) -> Self {
        Self {
            used,
            limit,
            remaining: (limit - used).max(0),
            is_privileged: false,
        }
    }

    /// Privileged identities never consume quota.
    pub fn privileged(limit: i64) -> Self {
        Self {
            used: 0,
            limit,
            remaining: limit,
            is_privileged: true,
        }
    }
}

/// Usage events split by service type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCounts {
    pub video_abstract: i64,
    pub ppt_to_video: i64,
}

impl ServiceCounts {
    pub fn record(&mut self, service: ServiceType) {
        match service {
            ServiceType::VideoAbstract => self.video_abstract += 1,
            ServiceType::PptToVideo => self.ppt_to_video += 1,
        }
    }

    pub fn total(&self) -> i64 {
        self.video_abstract + self.ppt_to_video
    }
}

impl std::ops::AddAssign for ServiceCounts {
    fn add_assign(&mut self, other: Self) {
        self.video_abstract += other.video_abstract;
        self.ppt_to_video += other.ppt_to_video;
    }
}

impl FromIterator<ServiceType> for ServiceCounts {
    fn from_iter<I: IntoIterator<Item = ServiceType>>(iter: I) -> Self {
        let mut counts = Self::default();
        for service in iter {
            counts.record(service);
        }
        counts
    }
}

// =============================================================================
// FILE LIFECYCLE TYPES
// =============================================================================

/// Lifecycle state of a stored file.
///
/// Only `Processing`, `Completed` and `Expired` are persisted. The other two
/// terminal states are reached by removing the record and its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    #[default]
    Processing,
    Completed,
    Expired,
    DeletedByOwner,
    FailedRollback,
}

impl FileState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::DeletedByOwner | Self::FailedRollback
        )
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Processing | Self::Completed | Self::Expired)
    }

    pub fn can_transition_to(&self, next: FileState) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Completed)
                | (Self::Processing, Self::FailedRollback)
                | (Self::Completed, Self::DeletedByOwner)
                | (Self::Completed, Self::Expired)
        )
    }

    /// Fail with `InvalidTransition` unless `self -> next` is defined.
    pub fn ensure_transition(&self, next: FileState) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Expired => write!(f, "expired"),
            Self::DeletedByOwner => write!(f, "deleted_by_owner"),
            Self::FailedRollback => write!(f, "failed_rollback"),
        }
    }
}

impl std::str::FromStr for FileState {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            "deleted_by_owner" => Ok(Self::DeletedByOwner),
            "failed_rollback" => Ok(Self::FailedRollback),
            _ => Err(format!("Invalid file state: {}", s)),
        }
    }
}

/// A stored artifact and its retention deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub file_name: String,
    /// Storage locator, unique across all records.
    pub file_path: String,
    pub service_type: ServiceType,
    pub file_size: i64,
    pub status: FileState,
    pub created_at: DateTime<Utc>,
    /// Fixed at creation; never updated.
    pub expires_at: DateTime<Utc>,
    pub analysis_result: Option<String>,
}

impl FileRecord {
    /// A record is past its deadline from `expires_at` onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the deadline falls inside `(now, now + window]`.
    pub fn is_expiring_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expires_at > now && self.expires_at <= now + window
    }

    /// Whole hours until expiry, zero once the deadline has passed.
    pub fn hours_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_hours().max(0)
    }
}

/// Request for creating a file record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub service_type: ServiceType,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewFileRecord {
    /// Build a request whose deadline is `created_at + retention`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        user_id: i64,
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        service_type: ServiceType,
        file_size: i64,
        created_at: DateTime<Utc>,
        retention: Duration,
    ) -> Self {
        Self {
            id,
            user_id,
            file_name: file_name.into(),
            file_path: file_path.into(),
            service_type,
            file_size,
            created_at,
            expires_at: created_at + retention,
        }
    }
}
