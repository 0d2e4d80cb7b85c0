use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    SuperUser,
    PaperSetter,
    PaperGetter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::SuperUser => "super_user",
            Role::PaperSetter => "paper_setter",
            Role::PaperGetter => "paper_getter",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub is_verified: bool,
    /// Caller-supplied fields outside the known shape are kept on the record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

// ========== PAPER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaperStatus {
    Pending,
    Evaluated,
    Rejected,
}

impl PaperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Pending => "pending",
            PaperStatus::Evaluated => "evaluated",
            PaperStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub requested_by: Option<String>,
    pub file_key: String,
    pub status: PaperStatus,
    pub submitted_date: DateTime<Utc>,
    #[serde(default)]
    pub exam_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaperRequest {
    pub paper_data: Map<String, Value>,
    pub file_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaperResponse {
    pub paper: Paper,
    pub upload_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EvaluatePaperRequest {
    pub rating: f64,
    pub feedback: String,
    pub status: PaperStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPaperResponse {
    pub download_url: String,
}

/// Optional equality filters accepted by the paper listing.
#[derive(Debug, Default, Clone)]
pub struct PaperQuery {
    pub status: Option<String>,
    pub submitted_by: Option<String>,
    pub requested_by: Option<String>,
}
