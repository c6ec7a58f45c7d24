//! Normalized post models

use serde::{Deserialize, Serialize};

use super::reading_time::{self, ReadingTime};
use super::RichTextBlock;

/// A post as shown on the listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub uid: Option<String>,

    /// Publication timestamp as sent by the CMS
    pub first_publication_date: Option<String>,

    pub data: SummaryData,

    /// Untouched document fields (`id`, `type`, `tags`, ...)
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Listing fields, all plain text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// A post as shown on its own page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub uid: Option<String>,

    pub first_publication_date: Option<String>,

    pub data: PostData,

    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Detail fields: plain-text header plus structured body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostData {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub banner: PostBanner,

    pub author: String,

    #[serde(default)]
    pub content: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostBanner {
    pub url: String,
}

/// A body group introduced by a heading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub body: Vec<RichTextBlock>,
}

impl Post {
    /// Estimated reading time of the body at `words_per_minute`
    pub fn reading_time(&self, words_per_minute: usize) -> ReadingTime {
        reading_time::estimate(&self.data.content, words_per_minute)
    }
}
