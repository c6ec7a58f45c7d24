//! Built-in spacetraveling templates using the Tera template engine
//!
//! Templates are embedded in the binary. Autoescaping is off: URLs built by
//! the generator are emitted as-is, CMS text is escaped explicitly with the
//! `escape` filter and rich text bodies arrive as pre-rendered HTML.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{richtext, Post, PostSummary};
use crate::helpers::{date_xml, display_date, parse_cms_date, post_path, url_for};

/// Stylesheet written to `css/style.css` unless the site provides its own
pub const DEFAULT_STYLESHEET: &str = include_str!("spacetraveling/style.css");

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("spacetraveling/layout.html")),
            ("index.html", include_str!("spacetraveling/index.html")),
            ("post.html", include_str!("spacetraveling/post.html")),
            ("404.html", include_str!("spacetraveling/404.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("spacetraveling/partials/header.html"),
            ),
            (
                "partials/load_more.html",
                include_str!("spacetraveling/partials/load_more.html"),
            ),
        ])?;

        tera.register_filter("truncate_chars", truncate_chars_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "...".to_string(),
    };

    if s.chars().count() <= length {
        Ok(tera::Value::String(s))
    } else {
        let truncated: String = s.chars().take(length).collect();
        Ok(tera::Value::String(format!(
            "{}{}",
            truncated.trim_end(),
            omission
        )))
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub root: String,
    pub url: String,
    pub lang: String,
}

impl ConfigData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            root: url_for(config, ""),
            url: config.url.clone(),
            lang: config.language.replace('_', "-"),
        }
    }
}

/// A listing entry, ready for display
///
/// Also the item type of the static listing pages and of the server's
/// `api/posts` response, so the "load more" script can build the same markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostCard {
    pub uid: String,
    pub path: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: String,
    pub datetime: String,
}

impl PostCard {
    pub fn from_summary(summary: &PostSummary, config: &SiteConfig) -> Self {
        let uid = summary.uid.clone().unwrap_or_default();
        let published = summary.first_publication_date.as_deref();
        Self {
            path: url_for(config, &post_path(&uid)),
            uid,
            title: summary.data.title.clone(),
            subtitle: summary.data.subtitle.clone(),
            author: summary.data.author.clone(),
            date: display_date(published, &config.date_format, &config.language),
            datetime: published
                .and_then(parse_cms_date)
                .map(|d| date_xml(&d))
                .unwrap_or_default(),
        }
    }
}

/// A post page, ready for display
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub banner: String,
    pub author: String,
    pub date: String,
    pub datetime: String,
    pub reading_time: String,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    pub heading: String,
    pub html: String,
}

impl PostView {
    pub fn from_post(post: &Post, config: &SiteConfig) -> Self {
        let published = post.first_publication_date.as_deref();
        Self {
            uid: post.uid.clone().unwrap_or_default(),
            title: post.data.title.clone(),
            subtitle: post.data.subtitle.clone().unwrap_or_default(),
            banner: post.data.banner.url.clone(),
            author: post.data.author.clone(),
            date: display_date(published, &config.date_format, &config.language),
            datetime: published
                .and_then(parse_cms_date)
                .map(|d| date_xml(&d))
                .unwrap_or_default(),
            reading_time: post.reading_time(config.words_per_minute).to_string(),
            sections: post
                .data
                .content
                .iter()
                .map(|s| SectionView {
                    heading: s.heading.clone(),
                    html: richtext::as_html(&s.body),
                })
                .collect(),
        }
    }
}
