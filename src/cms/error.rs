//! CMS error types

use thiserror::Error;

/// Errors raised while talking to the CMS
#[derive(Error, Debug)]
pub enum CmsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CMS returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode CMS response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("CMS API entry has no master ref")]
    NoMasterRef,

    #[error("No {doc_type} document with uid {uid:?}")]
    NotFound { doc_type: String, uid: String },

    #[error("Invalid CMS URL: {0}")]
    InvalidUrl(String),
}

impl CmsError {
    /// Whether the error means the document does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, CmsError::NotFound { .. })
    }
}
