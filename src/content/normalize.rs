//! Map CMS documents to the post shapes the templates render
//!
//! Text fields may arrive as plain strings or as rich text; both end up as
//! plain strings here. Body blocks and fields the blog does not read are
//! copied through untouched.

use crate::cms::Document;

use super::{Post, PostBanner, PostData, PostSummary, Section, SummaryData, TextField};

fn text_of(field: Option<&TextField>) -> String {
    field.map(TextField::as_text).unwrap_or_default()
}

/// Normalize one document for the listing page
pub fn normalize_summary(doc: &Document) -> PostSummary {
    PostSummary {
        uid: doc.uid.clone(),
        first_publication_date: doc.first_publication_date.clone(),
        data: SummaryData {
            title: text_of(doc.data.title.as_ref()),
            subtitle: text_of(doc.data.subtitle.as_ref()),
            author: text_of(doc.data.author.as_ref()),
        },
        rest: doc.rest.clone(),
    }
}

/// Normalize a page of documents, keeping CMS order
pub fn normalize_summaries(docs: &[Document]) -> Vec<PostSummary> {
    docs.iter().map(normalize_summary).collect()
}

/// Normalize one document for its detail page
pub fn normalize_post(doc: &Document) -> Post {
    let data = &doc.data;

    Post {
        uid: doc.uid.clone(),
        first_publication_date: doc.first_publication_date.clone(),
        data: PostData {
            title: text_of(data.title.as_ref()),
            subtitle: data.subtitle.as_ref().map(TextField::as_text),
            banner: PostBanner {
                url: data
                    .banner
                    .as_ref()
                    .and_then(|b| b.url.clone())
                    .unwrap_or_default(),
            },
            author: text_of(data.author.as_ref()),
            content: data
                .content
                .iter()
                .map(|section| Section {
                    heading: text_of(section.heading.as_ref()),
                    body: section.body.clone(),
                })
                .collect(),
        },
        rest: doc.rest.clone(),
    }
}
