//! List posts from the CMS

use anyhow::Result;
use std::sync::Arc;

use crate::cms::PrismicClient;
use crate::config::SiteConfig;
use crate::content::PostSummary;
use crate::helpers::display_date;
use crate::pagination::{PaginationClient, PaginationState};
use crate::Blog;

/// Print the first listing page, or every page with `all`
pub async fn run(blog: &Blog, all: bool) -> Result<()> {
    let prismic = &blog.config.prismic;
    let client = Arc::new(PrismicClient::from_config(prismic)?);

    let first = client
        .query_by_type(&prismic.document_type, prismic.page_size)
        .await?;
    let pager = PaginationClient::new(client, PaginationState::from_page(&first));

    if all {
        pager.load_all().await;
    }

    let state = pager.snapshot().await;
    println!("Posts ({}):", state.posts.len());
    for post in &state.posts {
        println!("  {}", format_line(post, &blog.config));
    }
    if state.has_more() {
        println!("More posts available, run with --all to list them");
    }

    Ok(())
}

fn format_line(post: &PostSummary, config: &SiteConfig) -> String {
    let date = display_date(
        post.first_publication_date.as_deref(),
        &config.date_format,
        &config.language,
    );
    let date = if date.is_empty() { "(sem data)".to_string() } else { date };

    format!(
        "{} - {} by {} [{}]",
        date,
        post.data.title,
        post.data.author,
        post.uid.as_deref().unwrap_or("-")
    )
}
