//! Generate static files

use anyhow::Result;
use std::sync::Arc;

use crate::cms::PrismicClient;
use crate::config::PrismicConfig;
use crate::content::{normalize_post, Post, PostSummary};
use crate::generator::Generator;
use crate::pagination::{LoadOutcome, PaginationClient, PaginationState};
use crate::Blog;

/// Everything fetched from the CMS for one build
pub struct SiteContent {
    /// First listing page, with the cursor of the second
    pub listing: PaginationState,
    /// Every later listing page, in CMS order
    pub more_pages: Vec<Vec<PostSummary>>,
    /// Every post, normalized for its detail page
    pub posts: Vec<Post>,
}

/// Fetch content from the CMS and generate the static site
pub async fn run(blog: &Blog) -> Result<()> {
    let start = std::time::Instant::now();

    let client = Arc::new(PrismicClient::from_config(&blog.config.prismic)?);
    let content = fetch_site(&client, &blog.config.prismic).await?;

    tracing::info!(
        "Fetched {} listing posts and {} post pages",
        content.listing.posts.len(),
        content.posts.len()
    );

    let generator = Generator::new(blog)?;
    generator.generate(&content.listing, &content.more_pages, &content.posts)?;

    let duration = start.elapsed();
    tracing::info!("Generated in {:.2}s", duration.as_secs_f64());

    Ok(())
}

/// Query the first listing page, then follow the cursor to every post
///
/// A failure part way through the walk is logged by the pagination client and
/// the posts found so far are still rendered. Posts that disappear between
/// the listing and the detail query are skipped.
pub async fn fetch_site(client: &Arc<PrismicClient>, prismic: &PrismicConfig) -> Result<SiteContent> {
    let first = client
        .query_by_type(&prismic.document_type, prismic.page_size)
        .await?;
    let listing = PaginationState::from_page(&first);

    let walker = PaginationClient::new(client.clone(), listing.clone());
    let mut page_sizes = Vec::new();
    while let LoadOutcome::Loaded { appended } = walker.load_next().await {
        page_sizes.push(appended);
    }
    let everything = walker.into_state();
    if everything.has_more() {
        tracing::warn!(
            "Stopped before the last page, rendering {} posts",
            everything.posts.len()
        );
    }

    let mut later = everything.posts[listing.posts.len()..].iter().cloned();
    let more_pages = page_sizes
        .iter()
        .map(|&size| later.by_ref().take(size).collect())
        .collect();

    let mut posts = Vec::with_capacity(everything.posts.len());
    for summary in &everything.posts {
        let Some(uid) = summary.uid.as_deref() else {
            tracing::warn!("Skipping document without uid");
            continue;
        };

        match client.get_by_uid(&prismic.document_type, uid).await {
            Ok(doc) => posts.push(normalize_post(&doc)),
            Err(e) if e.is_not_found() => tracing::warn!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(SiteContent {
        listing,
        more_pages,
        posts,
    })
}
