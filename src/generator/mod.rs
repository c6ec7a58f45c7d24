//! Generator module - renders the listing and post pages into the public directory

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use tera::Context;
use walkdir::WalkDir;

use crate::cms::ResultsPage;
use crate::content::{Post, PostSummary};
use crate::helpers::{listing_page_path, post_path, url_for};
use crate::pagination::PaginationState;
use crate::templates::{ConfigData, PostCard, PostView, TemplateRenderer, DEFAULT_STYLESHEET};
use crate::Blog;

/// Static site generator using the embedded templates
pub struct Generator {
    blog: Blog,
    renderer: TemplateRenderer,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog) -> Result<Self> {
        Ok(Self {
            blog: blog.clone(),
            renderer: TemplateRenderer::new()?,
        })
    }

    /// Generate the entire site
    ///
    /// `listing` is the first page of the listing and `more_pages` the pages
    /// after it, written as static JSON for the "load more" control. `posts`
    /// are the detail pages to write.
    pub fn generate(
        &self,
        listing: &PaginationState,
        more_pages: &[Vec<PostSummary>],
        posts: &[Post],
    ) -> Result<()> {
        fs::create_dir_all(&self.blog.public_dir)?;

        // Copy source assets (images, stylesheets, etc.)
        self.copy_source_assets()?;
        self.write_default_stylesheet()?;

        if listing.has_more() && more_pages.is_empty() {
            tracing::warn!("Listing has more posts but none were fetched, omitting \"load more\"");
        }
        let next_page = (!more_pages.is_empty()).then(|| self.listing_page_url(2));
        self.write_index(&listing.posts, next_page.as_deref())?;
        self.write_listing_pages(more_pages)?;

        for post in posts {
            self.write_post(post)?;
        }

        self.write_not_found()?;

        tracing::info!("Generated listing and {} post pages", posts.len());
        Ok(())
    }

    /// Create a base context with common variables
    fn create_base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("config", &ConfigData::from_config(&self.blog.config));
        context.insert("description", &self.blog.config.description);
        context
    }

    /// Render the listing page
    ///
    /// `next_page` is the URL the "load more" control fetches; without it the
    /// control is left out.
    pub fn render_index(&self, posts: &[PostSummary], next_page: Option<&str>) -> Result<String> {
        let mut context = self.create_base_context();
        context.insert("posts", &self.cards(posts));
        context.insert("next_page", &next_page);

        self.renderer.render("index.html", &context)
    }

    /// Render a post page
    pub fn render_post(&self, post: &Post) -> Result<String> {
        let view = PostView::from_post(post, &self.blog.config);

        let mut context = self.create_base_context();
        if !view.subtitle.is_empty() {
            context.insert("description", &view.subtitle);
        }
        context.insert("post", &view);

        self.renderer.render("post.html", &context)
    }

    /// Render the page shown for unknown posts
    pub fn render_not_found(&self) -> Result<String> {
        self.renderer.render("404.html", &self.create_base_context())
    }

    fn cards(&self, posts: &[PostSummary]) -> Vec<PostCard> {
        posts
            .iter()
            .map(|p| PostCard::from_summary(p, &self.blog.config))
            .collect()
    }

    fn listing_page_url(&self, page: usize) -> String {
        url_for(&self.blog.config, &listing_page_path(page))
    }

    fn write_index(&self, posts: &[PostSummary], next_page: Option<&str>) -> Result<()> {
        let html = self.render_index(posts, next_page)?;
        let output_path = self.blog.public_dir.join("index.html");
        fs::write(&output_path, html)?;
        tracing::debug!("Generated: {:?}", output_path);
        Ok(())
    }

    /// Write the listing pages after the first as `{ next_page, results }`
    /// JSON, each `next_page` pointing at the following file
    fn write_listing_pages(&self, pages: &[Vec<PostSummary>]) -> Result<()> {
        for (i, posts) in pages.iter().enumerate() {
            let number = i + 2;
            let next_page = (i + 1 < pages.len()).then(|| self.listing_page_url(number + 1));
            let page = ResultsPage::new(next_page, self.cards(posts));

            let output_path = self.blog.public_dir.join(listing_page_path(number));
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&output_path, serde_json::to_string(&page)?)?;
            tracing::debug!("Generated listing page: {:?}", output_path);
        }
        Ok(())
    }

    /// Render a post and write it to `post/<uid>/index.html`
    pub fn write_post(&self, post: &Post) -> Result<PathBuf> {
        let uid = match post.uid.as_deref() {
            Some(uid) if !uid.trim().is_empty() => uid,
            _ => anyhow::bail!("Post without uid cannot be written"),
        };

        let html = self.render_post(post)?;
        let output_path = self.post_output_path(uid);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create dir {:?}: {}", parent, e))?;
        }
        fs::write(&output_path, &html)
            .map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", output_path, e))?;
        tracing::debug!("Generated post: {:?}", output_path);

        Ok(output_path)
    }

    /// Where the page for `uid` lives inside the public directory
    pub fn post_output_path(&self, uid: &str) -> PathBuf {
        self.blog
            .public_dir
            .join(post_path(uid))
            .join("index.html")
    }

    fn write_not_found(&self) -> Result<()> {
        let html = self.render_not_found()?;
        fs::write(self.blog.public_dir.join("404.html"), html)?;
        Ok(())
    }

    fn write_default_stylesheet(&self) -> Result<()> {
        let css_path = self.blog.public_dir.join("css").join("style.css");
        if !css_path.exists() {
            if let Some(parent) = css_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&css_path, DEFAULT_STYLESHEET)?;
        }
        Ok(())
    }

    /// Copy source assets to the public directory
    fn copy_source_assets(&self) -> Result<()> {
        let source_dir = &self.blog.source_dir;
        if !source_dir.exists() {
            return Ok(());
        }

        for entry in WalkDir::new(source_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() {
                copy_asset(source_dir, path, &self.blog.public_dir)?;
            }
        }

        Ok(())
    }
}

fn copy_asset(source_dir: &Path, path: &Path, public_dir: &Path) -> Result<()> {
    let relative = path.strip_prefix(source_dir)?;
    let dest = public_dir.join(relative);

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::copy(path, &dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{Document, ResultsPage};
    use crate::config::SiteConfig;
    use crate::content::normalize_post;
    use serde_json::json;

    fn blog(dir: &Path) -> Blog {
        Blog::with_config(dir, SiteConfig::default())
    }

    fn raw(uid: &str) -> Document {
        serde_json::from_value(json!({
            "uid": uid,
            "first_publication_date": "2021-03-25T19:25:28+0000",
            "data": {
                "title": format!("Título <{}>", uid),
                "subtitle": "Um subtítulo",
                "author": "Joseph Oliveira",
                "banner": { "url": "https://images.prismic.io/banner.png" },
                "content": [{
                    "heading": "Proin et varius",
                    "body": [{ "type": "paragraph", "text": "Lorem ipsum dolor sit amet", "spans": [] }]
                }]
            }
        }))
        .unwrap()
    }

    fn listing(cursor: Option<&str>) -> PaginationState {
        PaginationState::from_page(&ResultsPage::new(
            cursor.map(str::to_string),
            vec![raw("primeiro")],
        ))
    }

    #[test]
    fn test_index_offers_load_more_only_with_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new(&blog(dir.path())).unwrap();

        let first = listing(Some("https://blog.cdn.prismic.io/api/v2/documents/search?page=2"));
        let html = generator
            .render_index(&first.posts, Some("/api/posts/2.json"))
            .unwrap();
        assert!(html.contains("Carregar mais posts"));
        assert!(html.contains(r#"data-next="/api/posts/2.json""#));
        assert!(html.contains(r#"href="/post/primeiro/""#));
        assert!(html.contains("25 mar 2021"));
        assert!(html.contains("Título &lt;primeiro&gt;"));

        let html = generator.render_index(&listing(None).posts, None).unwrap();
        assert!(!html.contains("Carregar mais posts"));
        assert!(!html.contains("load-more"));
    }

    #[test]
    fn test_render_post() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new(&blog(dir.path())).unwrap();

        let html = generator.render_post(&normalize_post(&raw("hooks"))).unwrap();
        assert!(html.contains("<h1>Título &lt;hooks&gt;</h1>"));
        assert!(html.contains(r#"src="https:&#x2F;&#x2F;images.prismic.io&#x2F;banner.png""#));
        assert!(html.contains("1 min"));
        assert!(html.contains("<h2>Proin et varius</h2>"));
        assert!(html.contains("<p>Lorem ipsum dolor sit amet</p>"));
        assert!(html.contains("Joseph Oliveira"));
    }

    #[test]
    fn test_generate_writes_site() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        fs::create_dir_all(blog.source_dir.join("images")).unwrap();
        fs::write(blog.source_dir.join("images/logo.svg"), "<svg/>").unwrap();

        let generator = Generator::new(&blog).unwrap();
        let posts = vec![normalize_post(&raw("primeiro")), normalize_post(&raw("segundo"))];
        generator.generate(&listing(None), &[], &posts).unwrap();

        assert!(blog.public_dir.join("index.html").exists());
        assert!(blog.public_dir.join("post/primeiro/index.html").exists());
        assert!(blog.public_dir.join("post/segundo/index.html").exists());
        assert!(blog.public_dir.join("404.html").exists());
        assert!(blog.public_dir.join("css/style.css").exists());
        assert_eq!(
            fs::read_to_string(blog.public_dir.join("images/logo.svg")).unwrap(),
            "<svg/>"
        );
    }

    #[test]
    fn test_generate_chains_static_listing_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::default();
        config.root = "/blog/".to_string();
        let blog = Blog::with_config(dir.path(), config);
        let generator = Generator::new(&blog).unwrap();

        let first = listing(Some("https://blog.cdn.prismic.io/api/v2/documents/search?page=2"));
        let more_pages = vec![
            listing(None).posts,
            PaginationState::from_page(&ResultsPage::new(None, vec![raw("terceiro"), raw("quarto")]))
                .posts,
        ];
        generator.generate(&first, &more_pages, &[]).unwrap();

        let index = fs::read_to_string(blog.public_dir.join("index.html")).unwrap();
        assert!(index.contains(r#"data-next="/blog/api/posts/2.json""#));

        let read = |n: usize| -> serde_json::Value {
            let text = fs::read_to_string(blog.public_dir.join(listing_page_path(n))).unwrap();
            serde_json::from_str(&text).unwrap()
        };

        let page2 = read(2);
        assert_eq!(page2["next_page"], json!("/blog/api/posts/3.json"));
        assert_eq!(page2["results"][0]["uid"], json!("primeiro"));
        assert_eq!(page2["results"][0]["path"], json!("/blog/post/primeiro/"));

        let page3 = read(3);
        assert_eq!(page3["next_page"], json!(null));
        let uids: Vec<_> = page3["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|card| card["uid"].clone())
            .collect();
        assert_eq!(uids, vec![json!("terceiro"), json!("quarto")]);
        assert!(!blog.public_dir.join(listing_page_path(4)).exists());
    }

    #[test]
    fn test_no_listing_pages_without_more_posts() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        let generator = Generator::new(&blog).unwrap();

        generator.generate(&listing(None), &[], &[]).unwrap();

        let index = fs::read_to_string(blog.public_dir.join("index.html")).unwrap();
        assert!(!index.contains("load-more"));
        assert!(!blog.public_dir.join("api").exists());
    }

    #[test]
    fn test_post_without_uid_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new(&blog(dir.path())).unwrap();
        let mut post = normalize_post(&raw("x"));
        post.uid = None;
        assert!(generator.write_post(&post).is_err());
    }
}
