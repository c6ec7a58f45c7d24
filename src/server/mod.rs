//! Development / preview server
//!
//! Serves the generated site, answers the listing's "load more" requests,
//! renders post pages that were not generated yet, and rebuilds the site in
//! the background.

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{Request, StatusCode, Uri},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tower_http::services::ServeDir;

use crate::cms::{PrismicClient, ResultsPage};
use crate::content::normalize_post;
use crate::generator::Generator;
use crate::helpers::url_for;
use crate::pagination::{LoadOutcome, PaginationClient};
use crate::templates::PostCard;
use crate::Blog;

/// Live reload script injected into HTML pages
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
})();
</script>
</body>
"#;

/// What the server renders with, replaced as a whole when the config changes
struct Site {
    blog: Blog,
    client: Arc<PrismicClient>,
    generator: Generator,
}

impl Site {
    fn new(blog: Blog) -> Result<Self> {
        Ok(Self {
            client: Arc::new(PrismicClient::from_config(&blog.config.prismic)?),
            generator: Generator::new(&blog)?,
            blog,
        })
    }
}

/// Server state
struct ServerState {
    site: RwLock<Arc<Site>>,
    /// Held by anything writing into the public directory
    build_lock: Mutex<()>,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

impl ServerState {
    fn new(blog: Blog, live_reload: bool) -> Result<Self> {
        let (reload_tx, _) = broadcast::channel::<()>(16);
        Ok(Self {
            site: RwLock::new(Arc::new(Site::new(blog)?)),
            build_lock: Mutex::new(()),
            reload_tx,
            live_reload,
        })
    }

    async fn site(&self) -> Arc<Site> {
        self.site.read().await.clone()
    }
}

/// Start the server
pub async fn start(blog: &Blog, ip: &str, port: u16, watch: bool, open: bool) -> Result<()> {
    let state = Arc::new(ServerState::new(blog.clone(), watch)?);

    let app = router(state.clone());

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}{}", ip, port, url_for(&blog.config, ""));
    println!("Server running at {}", url);
    if watch {
        println!("Live reload enabled. Watching for changes...");
    }
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    if blog.config.revalidate > 0 {
        tokio::spawn(revalidate_loop(
            state.clone(),
            Duration::from_secs(blog.config.revalidate),
        ));
    }

    if watch {
        let base_dir = blog.base_dir.clone();
        let source_dir = blog.source_dir.clone();
        let handle = tokio::runtime::Handle::current();
        let state = state.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = watch_and_reload(base_dir, source_dir, handle, state) {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/__livereload", get(livereload_handler))
        .fallback(fallback_handler)
        .with_state(state)
}

/// Regenerate the site, one build at a time
///
/// With `reload_config` the config file is read again first and the new
/// settings replace the running ones once the build succeeds.
async fn rebuild(state: &ServerState, reload_config: bool) -> Result<()> {
    let _build = state.build_lock.lock().await;

    let current = state.site().await;
    let blog = if reload_config {
        Blog::new(&current.blog.base_dir)?
    } else {
        current.blog.clone()
    };

    blog.generate().await?;

    if reload_config {
        if blog.config.root != current.blog.config.root {
            tracing::info!("Site root is now {}", url_for(&blog.config, ""));
        }
        *state.site.write().await = Arc::new(Site::new(blog)?);
    }

    let _ = state.reload_tx.send(());
    Ok(())
}

/// Rebuild the whole site every `period`
async fn revalidate_loop(state: Arc<ServerState>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // The first tick fires immediately and the site was just generated
    interval.tick().await;

    loop {
        interval.tick().await;
        tracing::info!("Revalidating site...");
        if let Err(e) = rebuild(&state, false).await {
            tracing::error!("Revalidation failed: {}", e);
        }
    }
}

/// Watch the config file and static assets, regenerating on change
fn watch_and_reload(
    base_dir: PathBuf,
    source_dir: PathBuf,
    handle: tokio::runtime::Handle,
    state: Arc<ServerState>,
) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;

    let config_path = base_dir.join("_config.yml");
    if config_path.exists() {
        debouncer
            .watcher()
            .watch(&config_path, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching: {:?}", config_path);
    }

    if source_dir.exists() {
        debouncer
            .watcher()
            .watch(&source_dir, RecursiveMode::Recursive)?;
        tracing::debug!("Watching: {:?}", source_dir);
    }

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                for event in &events {
                    tracing::info!("File changed: {}", event.path.display());
                }

                // Reload so config edits take effect
                match handle.block_on(rebuild(&state, true)) {
                    Ok(_) => tracing::info!("Regenerated successfully"),
                    Err(e) => tracing::error!("Generation failed: {}", e),
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
            }
            Err(e) => {
                tracing::error!("Channel error: {:?}", e);
                break;
            }
        }
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct CursorQuery {
    cursor: String,
}

/// `GET <root>api/posts?cursor=<next_page>`: the next listing page, normalized
async fn next_page(site: &Site, uri: &Uri) -> Response {
    let query = match Query::<CursorQuery>::try_from_uri(uri) {
        Ok(Query(query)) => query,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    if !site.client.owns_url(&query.cursor) {
        tracing::warn!("Rejected cursor outside the CMS: {}", query.cursor);
        return (StatusCode::BAD_REQUEST, "Invalid cursor").into_response();
    }

    let pager = PaginationClient::resume(site.client.clone(), query.cursor);
    match pager.load_next().await {
        LoadOutcome::Loaded { .. } => {
            let page = pager.into_state();
            let cards: Vec<PostCard> = page
                .posts
                .iter()
                .map(|p| PostCard::from_summary(p, &site.blog.config))
                .collect();
            Json(ResultsPage::new(page.cursor, cards)).into_response()
        }
        LoadOutcome::Failed => (StatusCode::BAD_GATEWAY, "CMS request failed").into_response(),
        LoadOutcome::Exhausted | LoadOutcome::Busy => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Nothing to load").into_response()
        }
    }
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            result = reload_rx.recv() => {
                match result {
                    Ok(_) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Serve generated files, rendering missing post pages on demand
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    let site = state.site().await;
    let path = request.uri().path().to_string();
    let path = site_path(&path, &site.blog.config.root);

    if path == "/api/posts" {
        return next_page(&site, request.uri()).await;
    }

    let public_dir = &site.blog.public_dir;
    let file_path = resolve_file(public_dir, path);

    if !file_path.exists() {
        if let Some(uid) = post_uid_from_path(path) {
            return render_on_demand(&state, &site, uid).await;
        }
        return not_found(&state, &site);
    }

    let is_html = file_path
        .extension()
        .map(|ext| ext == "html" || ext == "htm")
        .unwrap_or(false);

    if is_html {
        match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => html_response(&state, StatusCode::OK, content),
            Err(_) => not_found(&state, &site),
        }
    } else {
        // ServeDir maps the path onto the public directory, so it gets the
        // path relative to the site root
        let (mut parts, body) = request.into_parts();
        match path.parse::<Uri>() {
            Ok(uri) => parts.uri = uri,
            Err(_) => return not_found(&state, &site),
        }

        let mut service = ServeDir::new(public_dir).append_index_html_on_directories(true);
        match service.try_call(Request::from_parts(parts, body)).await {
            Ok(response) => response.into_response(),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
        }
    }
}

/// Fetch, render and cache a post page that was not generated yet
async fn render_on_demand(state: &ServerState, site: &Site, uid: &str) -> Response {
    let doc_type = &site.blog.config.prismic.document_type;

    let doc = match site.client.get_by_uid(doc_type, uid).await {
        Ok(doc) => doc,
        Err(e) if e.is_not_found() => return not_found(state, site),
        Err(e) => {
            tracing::error!("Failed to fetch {}: {}", uid, e);
            return (StatusCode::BAD_GATEWAY, "CMS request failed").into_response();
        }
    };

    let post = normalize_post(&doc);
    let written = {
        let _build = state.build_lock.lock().await;
        site.generator.write_post(&post)
    };
    match written {
        Ok(path) => {
            tracing::info!("Rendered on demand: {:?}", path);
            match site.generator.render_post(&post) {
                Ok(html) => html_response(state, StatusCode::OK, html),
                Err(e) => {
                    tracing::error!("Failed to render {}: {}", uid, e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Render error").into_response()
                }
            }
        }
        Err(e) => {
            tracing::error!("Failed to write {}: {}", uid, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Render error").into_response()
        }
    }
}

fn not_found(state: &ServerState, site: &Site) -> Response {
    match site.generator.render_not_found() {
        Ok(html) => html_response(state, StatusCode::NOT_FOUND, html),
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn html_response(state: &ServerState, status: StatusCode, html: String) -> Response {
    let html = if state.live_reload {
        inject_live_reload(&html)
    } else {
        html
    };
    (status, Html(html)).into_response()
}

/// The request path relative to the site root, starting with `/`
///
/// Paths outside the root are left as they are.
fn site_path<'a>(path: &'a str, root: &str) -> &'a str {
    match path.strip_prefix(root.trim_end_matches('/')) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Map a request path onto a file in the public directory
fn resolve_file(public_dir: &Path, path: &str) -> PathBuf {
    let clean_path = path.trim_start_matches('/');
    if clean_path.is_empty() {
        return public_dir.join("index.html");
    }
    if clean_path.split('/').any(|part| part == "..") {
        return public_dir.join("__invalid__");
    }

    let candidate = public_dir.join(clean_path);
    if candidate.is_dir() {
        candidate.join("index.html")
    } else {
        candidate
    }
}

/// Extract the uid from `/post/<uid>/` style paths
fn post_uid_from_path(path: &str) -> Option<&str> {
    let rest = path.trim_start_matches('/').strip_prefix("post/")?;
    let uid = rest
        .strip_suffix("index.html")
        .unwrap_or(rest)
        .trim_end_matches('/');

    if uid.is_empty() || uid.contains('/') || uid.contains("..") {
        None
    } else {
        Some(uid)
    }
}

/// Inject live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    if html.contains("</body>") {
        html.replace("</body>", LIVE_RELOAD_SCRIPT)
    } else {
        format!("{}{}", html, LIVE_RELOAD_SCRIPT)
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
