use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A source citation attached to an assistant reply. Passed through from the
/// service unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub nct_id: Option<String>,
}

/// One turn in a conversation. Messages are created once and never mutated;
/// the session appends them and never removes or reorders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<EvidenceItem>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            evidence: None,
            is_error: false,
        }
    }

    pub fn assistant(content: String, evidence: Vec<EvidenceItem>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            evidence: if evidence.is_empty() {
                None
            } else {
                Some(evidence)
            },
            is_error: false,
        }
    }

    /// Synthetic assistant message shown when a chat turn fails.
    pub fn failure_reply(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            evidence: None,
            is_error: true,
        }
    }
}

/// A clinical trial record from the catalog. The client treats this as an
/// opaque passthrough; fields are only ever displayed, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    #[serde(default)]
    pub nct_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub principal_investigator: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age_range: Option<String>,
    #[serde(default)]
    pub healthy_volunteers: Option<String>,
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(default)]
    pub interventions: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

/// `GET /api/health` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// `POST /api/chat` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
}

/// `GET /api/conversations/{id}` payload. `messages` stays optional so the
/// session manager can detect a malformed success response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationResponse {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

/// One entry in `GET /api/conversations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message_count: Option<u64>,
}

/// `GET /api/trials/search` payload. Both fields stay optional; the search
/// manager substitutes an empty page / zero total when they are missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Option<Vec<Trial>>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// `GET /api/trials/filters` payload. Unknown keys are collected so the
/// search manager can merge them into its option sets verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterOptionsResponse {
    #[serde(default)]
    pub phases: Vec<String>,
    #[serde(default)]
    pub statuses: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
