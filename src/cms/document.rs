//! Wire types returned by the Prismic REST API

use serde::{Deserialize, Serialize};

use crate::content::{RichTextBlock, TextField};

/// A page of query results: `{ next_page, results }`
///
/// The same envelope is used for raw CMS documents and for normalized posts
/// served to the listing's "load more" script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsPage<T> {
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> ResultsPage<T> {
    pub fn new(next_page: Option<String>, results: Vec<T>) -> Self {
        Self { next_page, results }
    }
}

/// A CMS document
///
/// Only the fields the blog reads are typed; everything else (`id`, `type`,
/// `tags`, `lang`, ...) is carried in `rest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub uid: Option<String>,

    #[serde(default)]
    pub first_publication_date: Option<String>,

    #[serde(default)]
    pub data: DocumentData,

    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// The `data` bag of a post document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentData {
    #[serde(default)]
    pub title: Option<TextField>,

    #[serde(default)]
    pub subtitle: Option<TextField>,

    #[serde(default)]
    pub author: Option<TextField>,

    #[serde(default)]
    pub banner: Option<Banner>,

    #[serde(default)]
    pub content: Vec<RawSection>,

    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Image field; an empty image arrives as `{}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// One `content` group: a heading and its body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSection {
    #[serde(default)]
    pub heading: Option<TextField>,

    #[serde(default)]
    pub body: Vec<RichTextBlock>,
}

/// The API entry document (`GET <endpoint>`)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEntry {
    #[serde(default)]
    pub refs: Vec<ApiRef>,
}

impl ApiEntry {
    /// The ref that points at published content
    pub fn master_ref(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRef {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "isMasterRef", default)]
    pub is_master_ref: bool,
}
