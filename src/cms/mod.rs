//! Prismic content source: wire types, errors and the HTTP client

mod client;
mod document;
mod error;

pub use client::{PageSource, PrismicClient};
pub use document::{ApiEntry, ApiRef, Banner, Document, DocumentData, RawSection, ResultsPage};
pub use error::CmsError;
