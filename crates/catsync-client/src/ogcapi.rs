use std::collections::HashSet;

use async_trait::async_trait;
use catsync_core::config::HttpConfig;
use catsync_core::error::SyncError;
use catsync_core::models::Link;
use catsync_core::remote::{CatalogClient, Document};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Longest response body kept in a [`SyncError::RemoteRejected`].
const MAX_ERROR_BODY: usize = 512;

/// Upper bound on listing pages, in case a server keeps answering with a
/// `next` link.
const MAX_PAGES: usize = 10_000;

/// An `{ "id": ... }` record of a listing page.
///
/// Feature ids may be numbers; both forms are read as strings.
#[derive(Deserialize, Debug)]
struct IdRecord {
    id: Value,
}

impl IdRecord {
    fn into_id(self) -> Option<String> {
        match self.id {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One page of `GET /collections` or `GET /collections/{id}/items`.
///
/// ```json
/// { "collections": [{ "id": "a" }], "links": [{ "rel": "next", "href": "..." }] }
/// { "type": "FeatureCollection", "features": [{ "id": "x" }], "links": [] }
/// ```
#[derive(Deserialize, Debug, Default)]
struct ListingPage {
    #[serde(default)]
    collections: Vec<IdRecord>,
    #[serde(default)]
    features: Vec<IdRecord>,
    #[serde(default)]
    links: Vec<Link>,
}

impl ListingPage {
    /// Splits the page into its identifiers and the href of its `next` link.
    fn into_parts(self) -> (Vec<String>, Option<String>) {
        let next = self
            .links
            .into_iter()
            .find(|link| link.rel == "next")
            .map(|link| link.href);
        let ids = self
            .collections
            .into_iter()
            .chain(self.features)
            .filter_map(IdRecord::into_id)
            .collect();
        (ids, next)
    }
}

/// HTTP client for an OGC API Features / STAC transactions endpoint.
///
/// # Examples
///
/// ```no_run
/// use catsync_client::OgcApiClient;
/// use catsync_core::config::HttpConfig;
/// use catsync_core::remote::CatalogClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OgcApiClient::new("https://example.com/stac", &HttpConfig::default())?
///     .with_basic_auth("editor", Some("secret".to_string()));
/// let ids = client.list_collection_ids().await?;
/// println!("Found {} collections", ids.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OgcApiClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
    credentials: Option<(String, Option<String>)>,
}

impl OgcApiClient {
    /// Creates a client for the service rooted at `base_url_str`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidUrl` if the URL is malformed or cannot
    /// carry path segments.
    /// Returns `SyncError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url_str: &str, http: &HttpConfig) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url_str)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", base_url_str, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(format!(
                "{}: not a base URL",
                base_url_str
            )));
        }

        let client = Client::builder()
            .user_agent(http.user_agent.as_str())
            .timeout(http.timeout())
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout_secs: http.timeout_secs,
            credentials: None,
        })
    }

    /// Sends HTTP basic credentials with every request.
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some((user.into(), password));
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `<base>/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_deref()),
            None => builder,
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Document>,
    ) -> Result<Response, SyncError> {
        debug!(%method, %url, "Sending request");
        let mut builder = self.request(method, url.clone());
        if let Some(doc) = body {
            builder = builder.json(doc);
        }
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout(self.timeout_secs)
            } else {
                SyncError::Transport(e.to_string())
            }
        })
    }

    async fn rejected(method: &Method, url: &Url, resp: Response) -> SyncError {
        let status = resp.status().as_u16();
        let mut body = resp.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        SyncError::RemoteRejected {
            method: method.to_string(),
            url: url.to_string(),
            status,
            body,
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, SyncError> {
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_document(&self, url: Url) -> Result<Option<Document>, SyncError> {
        let resp = self.send(Method::GET, &url, None).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(Self::read_json(resp).await?)),
            _ => Err(Self::rejected(&Method::GET, &url, resp).await),
        }
    }

    async fn write_document(
        &self,
        method: Method,
        url: Url,
        doc: &Document,
    ) -> Result<(), SyncError> {
        let resp = self.send(method.clone(), &url, Some(doc)).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejected(&method, &url, resp).await)
        }
    }

    /// Collects ids from a listing endpoint, following `next` links.
    async fn list_ids(&self, first: Url) -> Result<Vec<String>, SyncError> {
        let mut ids = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) || visited.len() > MAX_PAGES {
                debug!(%url, "Stopping pagination");
                break;
            }
            let resp = self.send(Method::GET, &url, None).await?;
            if !resp.status().is_success() {
                return Err(Self::rejected(&Method::GET, &url, resp).await);
            }
            let page: ListingPage = Self::read_json(resp).await?;
            let (page_ids, next_href) = page.into_parts();
            ids.extend(page_ids);
            next = match next_href {
                Some(href) => Some(
                    url.join(&href)
                        .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", href, e)))?,
                ),
                None => None,
            };
        }

        Ok(ids)
    }
}

#[async_trait]
impl CatalogClient for OgcApiClient {
    async fn get_collection(&self, id: &str) -> Result<Option<Document>, SyncError> {
        self.get_document(self.endpoint(&["collections", id])?).await
    }

    async fn create_collection(&self, doc: &Document) -> Result<(), SyncError> {
        self.write_document(Method::POST, self.endpoint(&["collections"])?, doc)
            .await
    }

    async fn replace_collection(&self, id: &str, doc: &Document) -> Result<(), SyncError> {
        self.write_document(Method::PUT, self.endpoint(&["collections", id])?, doc)
            .await
    }

    async fn get_item(&self, collection: &str, id: &str) -> Result<Option<Document>, SyncError> {
        self.get_document(self.endpoint(&["collections", collection, "items", id])?)
            .await
    }

    async fn create_item(&self, collection: &str, doc: &Document) -> Result<(), SyncError> {
        let url = self.endpoint(&["collections", collection, "items"])?;
        self.write_document(Method::POST, url, doc).await
    }

    async fn replace_item(
        &self,
        collection: &str,
        id: &str,
        doc: &Document,
    ) -> Result<(), SyncError> {
        let url = self.endpoint(&["collections", collection, "items", id])?;
        self.write_document(Method::PUT, url, doc).await
    }

    async fn list_collection_ids(&self) -> Result<Vec<String>, SyncError> {
        self.list_ids(self.endpoint(&["collections"])?).await
    }

    async fn list_item_ids(&self, collection: &str) -> Result<Vec<String>, SyncError> {
        self.list_ids(self.endpoint(&["collections", collection, "items"])?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> OgcApiClient {
        OgcApiClient::new(base, &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_new_with_valid_url() {
        let client = client("https://example.com/stac");
        assert_eq!(client.base_url().as_str(), "https://example.com/stac");
        assert!(client.credentials.is_none());
    }

    #[test]
    fn test_new_with_invalid_url() {
        match OgcApiClient::new("not-a-valid-url", &HttpConfig::default()) {
            Err(SyncError::InvalidUrl(msg)) => assert!(msg.contains("not-a-valid-url")),
            other => panic!("expected InvalidUrl, got {:?}", other.map(|_| ())),
        }
        assert!(OgcApiClient::new("mailto:someone@example.com", &HttpConfig::default()).is_err());
    }

    #[test]
    fn test_endpoint_with_and_without_trailing_slash() {
        for base in ["https://example.com/stac", "https://example.com/stac/"] {
            let url = client(base).endpoint(&["collections", "a"]).unwrap();
            assert_eq!(url.as_str(), "https://example.com/stac/collections/a");
        }
        let url = client("https://example.com").endpoint(&["collections"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/collections");
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let url = client("https://example.com/")
            .endpoint(&["collections", "a b", "items", "x/y"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/collections/a%20b/items/x%2Fy"
        );
    }

    #[test]
    fn test_with_basic_auth() {
        let client = client("https://example.com").with_basic_auth("editor", None);
        assert_eq!(client.credentials, Some(("editor".to_string(), None)));
    }

    #[test]
    fn test_collections_page() {
        let json = r#"{
            "collections": [{"id": "a", "title": "A"}, {"id": "b"}],
            "links": [
                {"rel": "self", "href": "https://example.com/collections"},
                {"rel": "next", "href": "/collections?token=2"}
            ]
        }"#;
        let page: ListingPage = serde_json::from_str(json).unwrap();
        let (ids, next) = page.into_parts();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(next.as_deref(), Some("/collections?token=2"));
    }

    #[test]
    fn test_feature_collection_page() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "x", "geometry": null},
                {"type": "Feature", "id": 7},
                {"type": "Feature", "id": null}
            ]
        }"#;
        let page: ListingPage = serde_json::from_str(json).unwrap();
        let (ids, next) = page.into_parts();
        assert_eq!(ids, vec!["x", "7"]);
        assert!(next.is_none());
    }

    #[test]
    fn test_next_link_resolution() {
        let current = Url::parse("https://example.com/stac/collections/a/items").unwrap();
        assert_eq!(
            current.join("items?token=2").unwrap().as_str(),
            "https://example.com/stac/collections/a/items?token=2"
        );
        assert_eq!(
            current
                .join("https://other.example.com/page/2")
                .unwrap()
                .as_str(),
            "https://other.example.com/page/2"
        );
    }
}
