//! Core types for the memory store

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of memory a record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// A dated observation tied to events
    Episodic,
    /// Durable knowledge not bound to a point in time
    Semantic,
}

impl MemoryKind {
    /// Stable name used in payloads and the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
        }
    }

    /// Parse the stored name
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "episodic" => Some(Self::Episodic),
            "semantic" => Some(Self::Semantic),
            _ => None,
        }
    }
}

/// One persistent memory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    pub content: String,
    /// Unit-normalized embedding; the store normalizes at insert
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Importance in [0, 1]
    pub importance: f64,
    pub ttl_days: u32,
    pub created_at: DateTime<Utc>,
    /// Always `created_at + ttl_days`
    pub expires_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    /// Monotonically non-decreasing
    pub access_count: u32,
    /// Source references (article ids, URLs)
    pub refs: Vec<String>,
    pub user_id: Option<String>,
    pub tags: Vec<String>,
    /// Soft-delete marker; set records are invisible to recall
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Whether recall may return this record at `now`
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.deleted_at.is_none() && self.expires_at > now
    }

    /// Whether the record's TTL has lapsed without a soft delete
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deleted_at.is_none() && self.expires_at <= now
    }

    /// Compute the expiry timestamp for a creation time and TTL
    #[must_use]
    pub fn expiry_for(created_at: DateTime<Utc>, ttl_days: u32) -> DateTime<Utc> {
        created_at + Duration::days(i64::from(ttl_days))
    }
}
