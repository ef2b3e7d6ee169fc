// src/db/models.rs
// Entity structs for the tri-store data model (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStatus {
    Pending,
    Completed,
    Failed,
}

impl SynthesisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisStatus::Pending => "pending",
            SynthesisStatus::Completed => "completed",
            SynthesisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => SynthesisStatus::Completed,
            "failed" => SynthesisStatus::Failed,
            _ => SynthesisStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    Etw,
    Polling,
    UiAutomation,
    Ocr,
    PollingOcr,
}

impl CaptureSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureSource::Etw => "etw",
            CaptureSource::Polling => "polling",
            CaptureSource::UiAutomation => "ui_automation",
            CaptureSource::Ocr => "ocr",
            CaptureSource::PollingOcr => "polling_ocr",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "etw" => CaptureSource::Etw,
            "ui_automation" => CaptureSource::UiAutomation,
            "ocr" => CaptureSource::Ocr,
            "polling_ocr" => CaptureSource::PollingOcr,
            _ => CaptureSource::Polling,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub value: String,
    pub count: u32,
}

/// A Session: all activity metadata for one calendar date. `extracted_text` is
/// plaintext here — the Storage Engine is responsible for encrypting it before
/// it reaches the relational store and decrypting it on the way out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub date: String,
    pub custom_title: Option<String>,
    pub custom_summary: Option<String>,
    pub original_summary: Option<String>,
    pub extracted_text: String,
    pub entities_json: Vec<Entity>,
    pub synthesis_status: SynthesisStatus,
    pub ai_summary: Option<String>,
    pub ai_bullets: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new_for_date(date: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            date: date.into(),
            custom_title: None,
            custom_summary: None,
            original_summary: None,
            extracted_text: String::new(),
            entities_json: Vec::new(),
            synthesis_status: SynthesisStatus::Pending,
            ai_summary: None,
            ai_bullets: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppActivity {
    pub id: i64,
    pub session_id: i64,
    pub app_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityBlock {
    pub id: i64,
    pub app_activity_id: i64,
    pub block_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub ocr_text: String,
    pub micro_summary: Option<String>,
    pub capture_source: CaptureSource,
    pub structured_metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(crate::error::WaddleError::validation(format!(
                "invalid chat role: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub session_ref: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualNote {
    pub id: i64,
    pub session_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeCard {
    pub id: i64,
    pub session_id: i64,
    pub title: String,
    pub bullets: Vec<String>,
    pub entities: Vec<Entity>,
    pub status: SynthesisStatus,
}

/// Relational-store row shape for a Session: `extracted_text` is ciphertext.
/// The Storage Engine is the only layer allowed to cross between this and
/// [`Session`].
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: i64,
    pub date: String,
    pub custom_title: Option<String>,
    pub custom_summary: Option<String>,
    pub original_summary: Option<String>,
    pub extracted_text: Vec<u8>,
    pub entities_json: Vec<Entity>,
    pub synthesis_status: SynthesisStatus,
    pub ai_summary: Option<String>,
    pub ai_bullets: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Relational-store row shape for an ActivityBlock: `ocr_text` is ciphertext.
#[derive(Debug, Clone)]
pub struct ActivityBlockRow {
    pub id: i64,
    pub app_activity_id: i64,
    pub block_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub ocr_text: Vec<u8>,
    pub micro_summary: Option<String>,
    pub capture_source: CaptureSource,
    pub structured_metadata: serde_json::Value,
}

/// Relational-store row shape for a ChatMessage: `content` is ciphertext.
#[derive(Debug, Clone)]
pub struct ChatMessageRow {
    pub id: i64,
    pub session_id: i64,
    pub role: ChatRole,
    pub content: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub session: Session,
    pub score: f64,
    pub snippet: String,
    pub match_type: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}
