//! Content module - post models, rich text and CMS normalization

pub mod normalize;
mod post;
pub mod reading_time;
pub mod richtext;

pub use normalize::{normalize_post, normalize_summaries, normalize_summary};
pub use post::{Post, PostBanner, PostData, PostSummary, Section, SummaryData};
pub use reading_time::ReadingTime;
pub use richtext::{RichTextBlock, Span, TextField};
