//! URL helper functions

use crate::config::SiteConfig;

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/css/style.css") // -> "/blog/css/style.css"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let root = config.root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Path of a post page relative to the site root, e.g. `post/my-uid/`
pub fn post_path(uid: &str) -> String {
    format!("post/{}/", uid.trim_matches('/'))
}

/// Path of a static listing page relative to the site root, e.g. `api/posts/2.json`
///
/// Page 1 is the listing itself, so static pages start at 2.
pub fn listing_page_path(page: usize) -> String {
    format!("api/posts/{}.json", page)
}
