use rocket::serde::{Deserialize, Serialize};

use crate::models::{ClipSummary, Expiration, FeedItem};

/// Longest clip the API accepts, in characters.
pub const MAX_TEXT_LENGTH: usize = 10_000;

#[derive(Deserialize, Clone)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub expiration: Expiration,
}

#[derive(Serialize, Deserialize, Clone, Default)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct APIResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phrase_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl APIResponse {
    pub fn success() -> Self {
        APIResponse {
            success: true,
            ..Default::default()
        }
    }

    pub fn with_text(text: String) -> Self {
        APIResponse {
            success: true,
            text: Some(text),
            ..Default::default()
        }
    }

    pub fn error(message: &str) -> Self {
        APIResponse {
            success: false,
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Clone)]
#[serde(crate = "rocket::serde")]
pub struct FeedResponse {
    pub clips: Vec<FeedItem>,
}

#[derive(Serialize, Clone)]
#[serde(crate = "rocket::serde")]
pub struct AdminListResponse {
    pub clips: Vec<ClipSummary>,
}

#[derive(Serialize, Clone)]
#[serde(crate = "rocket::serde")]
pub struct Version {
    pub commit: Option<String>,
}
