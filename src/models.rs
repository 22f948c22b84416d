use serde::{Deserialize, Serialize};

/// Characters kept in a public feed preview.
pub const FEED_PREVIEW_CHARS: usize = 60;

/// Characters kept in an admin listing preview.
pub const ADMIN_PREVIEW_CHARS: usize = 50;

/// How long a clip lives, and whether reading it consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Expiration {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[default]
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "first")]
    FirstView,
}

impl Expiration {
    /// Store time-to-live in seconds. First-view clips never expire on their own.
    pub fn ttl_secs(self) -> Option<u64> {
        match self {
            Expiration::FiveMinutes => Some(300),
            Expiration::OneHour => Some(3600),
            Expiration::TwentyFourHours => Some(86400),
            Expiration::FirstView => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Expiration::FiveMinutes => "5m",
            Expiration::OneHour => "1h",
            Expiration::TwentyFourHours => "24h",
            Expiration::FirstView => "first",
        }
    }
}

// Unknown codes fall back to the one hour default.
impl From<&str> for Expiration {
    fn from(code: &str) -> Self {
        match code {
            "5m" => Expiration::FiveMinutes,
            "24h" => Expiration::TwentyFourHours,
            "first" => Expiration::FirstView,
            _ => Expiration::OneHour,
        }
    }
}

impl From<String> for Expiration {
    fn from(code: String) -> Self {
        Expiration::from(code.as_str())
    }
}

// A null code is treated like an unknown one.
impl From<Option<String>> for Expiration {
    fn from(code: Option<String>) -> Self {
        code.map(|code| Expiration::from(code.as_str()))
            .unwrap_or_default()
    }
}

/// A stored clip. The id is the store key and is not part of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub text: String,
    pub is_public: bool,
    pub expiration: Expiration,
    /// Epoch milliseconds
    pub created_at: i64,
}

/// Pointer from the public feed to a public clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub preview: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl FeedEntry {
    pub fn new(id: &str, text: &str, timestamp: i64) -> Self {
        FeedEntry {
            id: id.to_string(),
            preview: preview(text, FEED_PREVIEW_CHARS),
            timestamp,
        }
    }
}

/// A feed entry as handed to clients, with its age rendered as a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub preview: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipSummary {
    pub id: String,
    pub is_public: bool,
    pub expiration: Expiration,
    pub preview: String,
    pub created_at: i64,
}

/// First `max_chars` characters of `text`, with "..." appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Coarse age label for a timestamp, relative to `now`. Both in epoch milliseconds.
pub fn relative_time(now: i64, timestamp: i64) -> String {
    let seconds = (now - timestamp).max(0) / 1000;
    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3600 {
        format!("{} min ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hr ago", seconds / 3600)
    } else {
        format!("{} days ago", seconds / 86400)
    }
}
