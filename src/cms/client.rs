//! Prismic REST API client

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use super::{ApiEntry, CmsError, Document, ResultsPage};
use crate::config::PrismicConfig;

/// Anything that can resolve a pagination cursor into a page of documents
#[async_trait]
pub trait PageSource: Send + Sync {
    /// `GET <url>`, decoded as `{ next_page, results }`
    async fn fetch_page(&self, url: &str) -> Result<ResultsPage<Document>, CmsError>;
}

/// HTTP client for a Prismic repository
pub struct PrismicClient {
    http: Client,
    endpoint: String,
    access_token: Option<String>,
    master_ref: OnceCell<String>,
}

impl PrismicClient {
    /// Create a client for the given API v2 entry point
    pub fn new(endpoint: &str, access_token: Option<&str>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token: access_token.map(str::to_string),
            master_ref: OnceCell::new(),
        }
    }

    /// Create a client from the site configuration
    pub fn from_config(config: &PrismicConfig) -> Result<Self, CmsError> {
        if config.endpoint.trim().is_empty() {
            return Err(CmsError::InvalidUrl(
                "prismic.endpoint is not configured".to_string(),
            ));
        }
        Url::parse(&config.endpoint).map_err(|e| CmsError::InvalidUrl(e.to_string()))?;
        Ok(Self::new(&config.endpoint, config.access_token.as_deref()))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether `url` points at this repository (same scheme, host and port)
    pub fn owns_url(&self, url: &str) -> bool {
        match (Url::parse(&self.endpoint), Url::parse(url)) {
            (Ok(ours), Ok(theirs)) => ours.origin() == theirs.origin(),
            _ => false,
        }
    }

    /// Query one page of documents of the given type
    pub async fn query_by_type(
        &self,
        doc_type: &str,
        page_size: usize,
    ) -> Result<ResultsPage<Document>, CmsError> {
        let predicate = format!(r#"[[at(document.type,"{}")]]"#, doc_type);
        self.search(&predicate, page_size).await
    }

    /// Fetch a single document by type and uid
    pub async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Document, CmsError> {
        let predicate = format!(r#"[[at(my.{}.uid,"{}")]]"#, doc_type, uid);
        let page = self.search(&predicate, 1).await?;
        page.results
            .into_iter()
            .next()
            .ok_or_else(|| CmsError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
    }

    async fn search(
        &self,
        predicate: &str,
        page_size: usize,
    ) -> Result<ResultsPage<Document>, CmsError> {
        let master_ref = self.master_ref().await?;
        let url = format!("{}/documents/search", self.endpoint);

        let page_size = page_size.max(1).to_string();
        let mut query = vec![
            ("ref", master_ref),
            ("q", predicate),
            ("pageSize", page_size.as_str()),
        ];
        if let Some(token) = &self.access_token {
            query.push(("access_token", token.as_str()));
        }

        tracing::debug!("CMS search {} ({})", predicate, url);
        let request = self.http.get(&url).query(&query);
        self.send_json(request).await
    }

    /// The master ref, fetched from the API entry once and then reused
    async fn master_ref(&self) -> Result<&str, CmsError> {
        let reference = self
            .master_ref
            .get_or_try_init(|| async {
                let mut request = self.http.get(&self.endpoint);
                if let Some(token) = &self.access_token {
                    request = request.query(&[("access_token", token.as_str())]);
                }
                let entry: ApiEntry = self.send_json(request).await?;
                entry
                    .master_ref()
                    .map(str::to_string)
                    .ok_or(CmsError::NoMasterRef)
            })
            .await?;
        Ok(reference.as_str())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CmsError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CmsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PageSource for PrismicClient {
    async fn fetch_page(&self, url: &str) -> Result<ResultsPage<Document>, CmsError> {
        tracing::debug!("Fetching next page {}", url);
        self.send_json(self.http.get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_api_entry(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "refs": [{ "id": "master", "ref": "master-ref", "label": "Master", "isMasterRef": true }]
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    fn post_json(uid: &str) -> serde_json::Value {
        json!({
            "uid": uid,
            "type": "post",
            "first_publication_date": "2021-03-25T19:25:28+0000",
            "data": { "title": uid, "subtitle": "sub", "author": "author" }
        })
    }

    #[tokio::test]
    async fn test_query_by_type() {
        let server = MockServer::start().await;
        mount_api_entry(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("ref", "master-ref"))
            .and(query_param("q", r#"[[at(document.type,"post")]]"#))
            .and(query_param("pageSize", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next_page": format!("{}/api/v2/documents/search?page=2", server.uri()),
                "results": [post_json("first")]
            })))
            .mount(&server)
            .await;

        let client = PrismicClient::new(&format!("{}/api/v2", server.uri()), None);
        let page = client.query_by_type("post", 1).await.unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].uid.as_deref(), Some("first"));
        assert!(page.next_page.unwrap().ends_with("page=2"));

        // master ref is cached: the entry mock expects a single call
        client.query_by_type("post", 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_by_uid_not_found() {
        let server = MockServer::start().await;
        mount_api_entry(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("q", r#"[[at(my.post.uid,"missing")]]"#))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "next_page": null, "results": [] })),
            )
            .mount(&server)
            .await;

        let client = PrismicClient::new(&format!("{}/api/v2", server.uri()), None);
        let err = client.get_by_uid("post", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_access_token_is_sent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2"))
            .and(query_param("access_token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "refs": [{ "id": "master", "ref": "master-ref", "isMasterRef": true }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("access_token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next_page": null,
                "results": [post_json("private")]
            })))
            .mount(&server)
            .await;

        let client = PrismicClient::new(&format!("{}/api/v2", server.uri()), Some("secret"));
        let doc = client.get_by_uid("post", "private").await.unwrap();
        assert_eq!(doc.uid.as_deref(), Some("private"));
    }

    #[tokio::test]
    async fn test_fetch_page_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = PrismicClient::new(&format!("{}/api/v2", server.uri()), None);

        let err = client
            .fetch_page(&format!("{}/broken", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, CmsError::Status { status: 500, .. }));

        let err = client
            .fetch_page(&format!("{}/garbage", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, CmsError::Decode(_)));
    }

    #[tokio::test]
    async fn test_missing_master_ref() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "refs": [] })))
            .mount(&server)
            .await;

        let client = PrismicClient::new(&format!("{}/api/v2", server.uri()), None);
        let err = client.query_by_type("post", 1).await.unwrap_err();
        assert!(matches!(err, CmsError::NoMasterRef));
    }

    #[test]
    fn test_owns_url() {
        let client = PrismicClient::new("https://blog.cdn.prismic.io/api/v2", None);
        assert!(client.owns_url("https://blog.cdn.prismic.io/api/v2/documents/search?page=2"));
        assert!(!client.owns_url("https://evil.example.com/api/v2"));
        assert!(!client.owns_url("/page2"));
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let config = PrismicConfig::default();
        assert!(matches!(
            PrismicClient::from_config(&config),
            Err(CmsError::InvalidUrl(_))
        ));
    }
}
