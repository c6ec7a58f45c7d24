//! Pagination client - grows the listing one CMS page at a time
//!
//! The client starts from the first page rendered at build time and follows
//! the CMS `next_page` cursor on demand. Only one load runs at a time: a
//! second request while one is in flight is turned away instead of racing.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cms::{Document, PageSource, ResultsPage};
use crate::content::{normalize_summaries, PostSummary};

/// Posts shown so far and the cursor of the next page
///
/// `posts` only ever grows at the end, in CMS order. `cursor` is `None`
/// exactly when there is nothing left to load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationState {
    pub cursor: Option<String>,
    pub posts: Vec<PostSummary>,
}

impl PaginationState {
    /// Seed the state from a raw CMS page
    pub fn from_page(page: &ResultsPage<Document>) -> Self {
        Self {
            cursor: page.next_page.clone(),
            posts: normalize_summaries(&page.results),
        }
    }

    /// Whether a "load more" control should be offered
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}

/// Result of a [`PaginationClient::load_next`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The next page was appended
    Loaded { appended: usize },
    /// No cursor left; nothing was requested
    Exhausted,
    /// Another load is in flight; nothing was requested
    Busy,
    /// The request or its decoding failed; state is unchanged
    Failed,
}

/// Resets the in-flight flag when a load finishes, however it finishes
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Incrementally loads listing pages through a [`PageSource`]
pub struct PaginationClient {
    source: Arc<dyn PageSource>,
    state: Mutex<PaginationState>,
    fetching: AtomicBool,
}

impl PaginationClient {
    /// Create a client over an existing state
    pub fn new(source: Arc<dyn PageSource>, initial: PaginationState) -> Self {
        Self {
            source,
            state: Mutex::new(initial),
            fetching: AtomicBool::new(false),
        }
    }

    /// Create a client that will continue from `cursor` with no posts yet
    pub fn resume(source: Arc<dyn PageSource>, cursor: String) -> Self {
        Self::new(
            source,
            PaginationState {
                cursor: Some(cursor),
                posts: Vec::new(),
            },
        )
    }

    /// A copy of the current state
    pub async fn snapshot(&self) -> PaginationState {
        self.state.lock().await.clone()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.has_more()
    }

    /// Whether a load is currently in flight
    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    /// Fetch the page behind the cursor and append it
    ///
    /// Issues at most one request. On failure the error is logged and the
    /// posts and cursor are left exactly as they were.
    pub async fn load_next(&self) -> LoadOutcome {
        if self
            .fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Load already in flight, ignoring request");
            return LoadOutcome::Busy;
        }
        let _in_flight = InFlight(&self.fetching);

        // The lock is not held across the request
        let cursor = match self.state.lock().await.cursor.clone() {
            Some(cursor) => cursor,
            None => return LoadOutcome::Exhausted,
        };

        let page = match self.source.fetch_page(&cursor).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Pagination failed for {}: {}", cursor, e);
                return LoadOutcome::Failed;
            }
        };

        let new_posts = normalize_summaries(&page.results);
        let appended = new_posts.len();

        let mut state = self.state.lock().await;
        state.posts.extend(new_posts);
        state.cursor = page.next_page;

        tracing::debug!(
            "Loaded {} posts ({} total, more: {})",
            appended,
            state.posts.len(),
            state.cursor.is_some()
        );

        LoadOutcome::Loaded { appended }
    }

    /// Keep loading until the cursor runs out or a load fails
    ///
    /// Returns the number of posts appended.
    pub async fn load_all(&self) -> usize {
        let mut total = 0;
        loop {
            match self.load_next().await {
                LoadOutcome::Loaded { appended } => total += appended,
                LoadOutcome::Exhausted | LoadOutcome::Failed | LoadOutcome::Busy => break,
            }
        }
        total
    }

    /// Consume the client and return its final state
    pub fn into_state(self) -> PaginationState {
        self.state.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::CmsError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn doc(uid: &str) -> Document {
        serde_json::from_value(json!({
            "uid": uid,
            "first_publication_date": "2021-03-25T19:25:28+0000",
            "data": {
                "title": [{ "type": "heading1", "text": format!("Post {}", uid), "spans": [] }],
                "subtitle": "subtitle",
                "author": "author"
            }
        }))
        .unwrap()
    }

    /// Serves canned pages by URL and counts requests
    #[derive(Default)]
    struct MapSource {
        pages: HashMap<String, ResultsPage<Document>>,
        calls: AtomicUsize,
    }

    impl MapSource {
        fn with(mut self, url: &str, next: Option<&str>, uids: &[&str]) -> Self {
            self.pages.insert(
                url.to_string(),
                ResultsPage::new(next.map(str::to_string), uids.iter().map(|u| doc(u)).collect()),
            );
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for MapSource {
        async fn fetch_page(&self, url: &str) -> Result<ResultsPage<Document>, CmsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or_else(|| CmsError::Status {
                status: 404,
                body: format!("no page at {}", url),
            })
        }
    }

    /// Blocks inside `fetch_page` until released
    struct GatedSource {
        entered: Notify,
        release: Notify,
        page: ResultsPage<Document>,
    }

    #[async_trait]
    impl PageSource for GatedSource {
        async fn fetch_page(&self, _url: &str) -> Result<ResultsPage<Document>, CmsError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(self.page.clone())
        }
    }

    fn initial(cursor: Option<&str>, uids: &[&str]) -> PaginationState {
        PaginationState::from_page(&ResultsPage::new(
            cursor.map(str::to_string),
            uids.iter().map(|u| doc(u)).collect(),
        ))
    }

    fn uids(state: &PaginationState) -> Vec<String> {
        state.posts.iter().filter_map(|p| p.uid.clone()).collect()
    }

    #[tokio::test]
    async fn test_load_last_page() {
        let source = Arc::new(MapSource::default().with("/page2", None, &["b"]));
        let client = PaginationClient::new(source.clone(), initial(Some("/page2"), &["a"]));
        assert!(client.has_more().await);

        assert_eq!(client.load_next().await, LoadOutcome::Loaded { appended: 1 });

        let state = client.snapshot().await;
        assert_eq!(uids(&state), vec!["a", "b"]);
        assert_eq!(state.posts[1].data.title, "Post b");
        assert!(state.cursor.is_none());
        assert!(!state.has_more());

        // Nothing left: no further request is made
        assert_eq!(client.load_next().await, LoadOutcome::Exhausted);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_append_keeps_existing_posts() {
        let source = Arc::new(
            MapSource::default()
                .with("/page2", Some("/page3"), &["c", "d"])
                .with("/page3", None, &["e"]),
        );
        let client = PaginationClient::new(source, initial(Some("/page2"), &["a", "b"]));

        let before = client.snapshot().await;
        client.load_next().await;
        let after = client.snapshot().await;

        assert_eq!(after.posts.len(), before.posts.len() + 2);
        assert_eq!(&after.posts[..before.posts.len()], &before.posts[..]);
        assert_eq!(after.cursor.as_deref(), Some("/page3"));

        assert_eq!(client.load_all().await, 1);
        assert_eq!(uids(&client.into_state()), vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_state_unchanged() {
        let source = Arc::new(MapSource::default());
        let client = PaginationClient::new(source.clone(), initial(Some("/missing"), &["a"]));

        let before = client.snapshot().await;
        assert_eq!(client.load_next().await, LoadOutcome::Failed);
        assert_eq!(client.snapshot().await, before);
        assert!(!client.is_fetching());

        // No retry happens on its own, but the caller may try again
        assert_eq!(client.load_next().await, LoadOutcome::Failed);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_second_load_while_in_flight_is_refused() {
        let source = Arc::new(GatedSource {
            entered: Notify::new(),
            release: Notify::new(),
            page: ResultsPage::new(Some("/page3".to_string()), vec![doc("b")]),
        });
        let client = Arc::new(PaginationClient::new(
            source.clone(),
            initial(Some("/page2"), &["a"]),
        ));

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.load_next().await }
        });

        source.entered.notified().await;
        assert!(client.is_fetching());
        assert_eq!(client.load_next().await, LoadOutcome::Busy);

        source.release.notify_one();
        assert_eq!(first.await.unwrap(), LoadOutcome::Loaded { appended: 1 });

        let state = client.snapshot().await;
        assert_eq!(uids(&state), vec!["a", "b"]);
        assert_eq!(state.cursor.as_deref(), Some("/page3"));
        assert!(!client.is_fetching());
    }

    #[tokio::test]
    async fn test_resume_from_cursor() {
        let source = Arc::new(MapSource::default().with("/page5", Some("/page6"), &["x"]));
        let client = PaginationClient::resume(source, "/page5".to_string());
        client.load_next().await;

        let state = client.into_state();
        assert_eq!(uids(&state), vec!["x"]);
        assert_eq!(state.cursor.as_deref(), Some("/page6"));
    }

    #[test]
    fn test_state_from_page() {
        let state = initial(None, &["only"]);
        assert!(!state.has_more());
        assert_eq!(state.posts[0].data.title, "Post only");
    }
}
