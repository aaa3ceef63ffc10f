//! Elasticsearch REST client
//!
//! Thin wrapper over the document and index APIs the gateway needs. One
//! client is shared by every request; `reqwest` pools connections.

use crate::error::{EsError, Result};
use crate::metrics::RequestTimer;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;
use userdex::store::is_valid_index_name;

/// How requests authenticate against the cluster
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthMethod {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    /// Base64-encoded `id:api_key`, sent as `Authorization: ApiKey <key>`
    ApiKey(String),
}

impl From<&userdex::config::AuthConfig> for AuthMethod {
    fn from(config: &userdex::config::AuthConfig) -> Self {
        use userdex::config::AuthConfig;
        match config {
            AuthConfig::None => AuthMethod::None,
            AuthConfig::Basic { username, password } => AuthMethod::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            AuthConfig::ApiKey { key } => AuthMethod::ApiKey(key.clone()),
        }
    }
}

/// Subset of the `GET /` banner
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub version: Option<VersionInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub number: String,
}

#[derive(Deserialize)]
struct GetResponse<T> {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<T>,
}

#[derive(Deserialize)]
struct SearchResponse<T> {
    hits: SearchHits<T>,
}

#[derive(Deserialize)]
struct SearchHits<T> {
    hits: Vec<SearchHit<T>>,
}

#[derive(Deserialize)]
struct SearchHit<T> {
    #[serde(rename = "_source")]
    source: T,
}

#[derive(Deserialize)]
struct WriteResponse {
    result: String,
}

#[derive(Deserialize)]
struct DeleteByQueryResponse {
    deleted: u64,
}

#[derive(Deserialize)]
struct BulkResponse {
    errors: bool,
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Deserialize)]
struct BulkItem {
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorCause,
}

#[derive(Deserialize)]
struct ErrorCause {
    #[serde(rename = "type")]
    error_type: String,
}

pub struct ElasticsearchClient {
    http: reqwest::Client,
    base_url: Url,
    auth: AuthMethod,
}

impl ElasticsearchClient {
    pub fn new(base_url: Url, auth: AuthMethod) -> Result<Self> {
        Self::with_timeout(base_url, auth, None)
    }

    /// Build a client whose requests give up after `timeout`
    pub fn with_timeout(
        base_url: Url,
        auth: AuthMethod,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(EsError::CannotBeABase(base_url.to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            auth,
        })
    }

    /// Append percent-encoded path segments to the base URL
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EsError::CannotBeABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL under `index`. Names the path cannot carry are rejected up front.
    fn index_url(&self, index: &str, path: &[&str]) -> Result<Url> {
        if !is_valid_index_name(index) {
            return Err(EsError::InvalidIndexName(index.to_string()));
        }
        let mut segments = Vec::with_capacity(path.len() + 1);
        segments.push(index);
        segments.extend_from_slice(path);
        self.url(&segments)
    }

    /// `url` drops `.` and `..` segments (their `%2E` forms included), so such
    /// ids are addressed through request bodies instead of `/_doc/{id}`.
    fn is_path_addressable(id: &str) -> bool {
        !matches!(id, "" | "." | "..")
    }

    fn with_refresh(mut url: Url, refresh: bool) -> Url {
        if refresh {
            url.query_pairs_mut().append_pair("refresh", "true");
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.auth {
            AuthMethod::None => req,
            AuthMethod::Basic { username, password } => {
                req.basic_auth(username, Some(password))
            }
            AuthMethod::ApiKey(key) => req.header(AUTHORIZATION, format!("ApiKey {}", key)),
        }
    }

    async fn status_error(response: Response) -> EsError {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return EsError::Auth {
                status: status.as_u16(),
            };
        }
        let body = response.text().await.unwrap_or_default();
        EsError::Status {
            status: status.as_u16(),
            body,
        }
    }

    /// `GET /`
    pub async fn ping(&self) -> Result<ClusterInfo> {
        let timer = RequestTimer::new("ping");
        let result: Result<ClusterInfo> = async {
            let response = self.request(Method::GET, self.url(&[])?).send().await?;
            if !response.status().is_success() {
                return Err(Self::status_error(response).await);
            }
            Ok(response.json::<ClusterInfo>().await?)
        }
        .await;
        timer.observe(&result);
        result
    }

    /// `HEAD /{index}`
    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let timer = RequestTimer::new("index_exists");
        let result: Result<bool> = async {
            let response = self
                .request(Method::HEAD, self.index_url(index, &[])?)
                .send()
                .await?;
            match response.status() {
                status if status.is_success() => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                _ => Err(Self::status_error(response).await),
            }
        }
        .await;
        timer.observe(&result);
        result
    }

    /// Create `index` unless it exists. Returns `true` if this call created it.
    ///
    /// A concurrent creation that wins the race is reported as `false`.
    pub async fn create_index(&self, index: &str) -> Result<bool> {
        if self.index_exists(index).await? {
            return Ok(false);
        }

        let timer = RequestTimer::new("create_index");
        let result: Result<bool> = async {
            let response = self
                .request(Method::PUT, self.index_url(index, &[])?)
                .send()
                .await?;
            let status = response.status();
            if status.is_success() {
                return Ok(true);
            }

            let body = response.text().await.unwrap_or_default();
            let already_exists = status == StatusCode::BAD_REQUEST
                && serde_json::from_str::<ErrorResponse>(&body)
                    .is_ok_and(|e| e.error.error_type == "resource_already_exists_exception");
            if already_exists {
                Ok(false)
            } else {
                Err(EsError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
        .await;
        timer.observe(&result);
        result
    }

    /// `PUT /{index}/_doc/{id}`: create or replace a document
    pub async fn index_document<T: Serialize + ?Sized>(
        &self,
        index: &str,
        id: &str,
        document: &T,
        refresh: bool,
    ) -> Result<()> {
        let timer = RequestTimer::new("index_document");
        let result: Result<()> = async {
            if !Self::is_path_addressable(id) {
                return self.bulk_index(index, id, document, refresh).await;
            }

            let url = Self::with_refresh(self.index_url(index, &["_doc", id])?, refresh);
            let response = self.request(Method::PUT, url).json(document).send().await?;
            if !response.status().is_success() {
                return Err(Self::status_error(response).await);
            }
            Ok(())
        }
        .await;
        timer.observe(&result);
        result
    }

    /// `GET /{index}/_doc/{id}`. A missing document or index is `Ok(None)`.
    pub async fn get_document<T: DeserializeOwned>(
        &self,
        index: &str,
        id: &str,
    ) -> Result<Option<T>> {
        let timer = RequestTimer::new("get_document");
        let result: Result<Option<T>> = async {
            if !Self::is_path_addressable(id) {
                return self.get_by_ids_query(index, id).await;
            }

            let response = self
                .request(Method::GET, self.index_url(index, &["_doc", id])?)
                .send()
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !response.status().is_success() {
                return Err(Self::status_error(response).await);
            }

            let body: GetResponse<T> = response.json().await?;
            Ok(if body.found { body.source } else { None })
        }
        .await;
        timer.observe(&result);
        result
    }

    /// `POST /{index}/_search` with `match_all`, returning up to `size` sources
    pub async fn search_all<T: DeserializeOwned>(
        &self,
        index: &str,
        size: usize,
    ) -> Result<Vec<T>> {
        let timer = RequestTimer::new("search_all");
        let result: Result<Vec<T>> = async {
            let body = json!({
                "query": { "match_all": {} },
                "size": size,
            });
            let response = self
                .request(Method::POST, self.index_url(index, &["_search"])?)
                .json(&body)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Self::status_error(response).await);
            }

            let body: SearchResponse<T> = response.json().await?;
            Ok(body.hits.hits.into_iter().map(|hit| hit.source).collect())
        }
        .await;
        timer.observe(&result);
        result
    }

    /// `DELETE /{index}/_doc/{id}`. Returns `false` if nothing was deleted.
    pub async fn delete_document(&self, index: &str, id: &str, refresh: bool) -> Result<bool> {
        let timer = RequestTimer::new("delete_document");
        let result: Result<bool> = async {
            if !Self::is_path_addressable(id) {
                return self.delete_by_ids_query(index, id, refresh).await;
            }

            let url = Self::with_refresh(self.index_url(index, &["_doc", id])?, refresh);
            let response = self.request(Method::DELETE, url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(false);
            }
            if !response.status().is_success() {
                return Err(Self::status_error(response).await);
            }

            let body: WriteResponse = response.json().await?;
            Ok(body.result == "deleted")
        }
        .await;
        timer.observe(&result);
        result
    }

    /// `POST /{index}/_delete_by_query` with `match_all`. Returns the deleted count.
    pub async fn delete_all_documents(&self, index: &str, refresh: bool) -> Result<u64> {
        let timer = RequestTimer::new("delete_by_query");
        let result: Result<u64> = async {
            let url = Self::with_refresh(self.index_url(index, &["_delete_by_query"])?, refresh);
            let response = self
                .request(Method::POST, url)
                .json(&json!({ "query": { "match_all": {} } }))
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Self::status_error(response).await);
            }

            let body: DeleteByQueryResponse = response.json().await?;
            Ok(body.deleted)
        }
        .await;
        timer.observe(&result);
        result
    }

    /// `POST /{index}/_bulk` with a single `index` action
    async fn bulk_index<T: Serialize + ?Sized>(
        &self,
        index: &str,
        id: &str,
        document: &T,
        refresh: bool,
    ) -> Result<()> {
        let action = json!({ "index": { "_id": id } });
        let body = format!("{}\n{}\n", action, serde_json::to_string(document)?);

        let url = Self::with_refresh(self.index_url(index, &["_bulk"])?, refresh);
        let response = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body: BulkResponse = response.json().await?;
        if !body.errors {
            return Ok(());
        }
        let failed = body
            .items
            .into_iter()
            .flat_map(|item| item.into_values())
            .find(|item| item.error.is_some());
        Err(match failed {
            Some(item) => EsError::Status {
                status: item.status,
                body: item.error.map(|e| e.to_string()).unwrap_or_default(),
            },
            None => EsError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                body: "bulk request reported errors".to_string(),
            },
        })
    }

    /// `POST /{index}/_search` with an `ids` query
    async fn get_by_ids_query<T: DeserializeOwned>(
        &self,
        index: &str,
        id: &str,
    ) -> Result<Option<T>> {
        let body = json!({
            "query": { "ids": { "values": [id] } },
            "size": 1,
        });
        let response = self
            .request(Method::POST, self.index_url(index, &["_search"])?)
            .json(&body)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body: SearchResponse<T> = response.json().await?;
        Ok(body.hits.hits.into_iter().next().map(|hit| hit.source))
    }

    /// `POST /{index}/_delete_by_query` with an `ids` query
    async fn delete_by_ids_query(&self, index: &str, id: &str, refresh: bool) -> Result<bool> {
        let url = Self::with_refresh(self.index_url(index, &["_delete_by_query"])?, refresh);
        let response = self
            .request(Method::POST, url)
            .json(&json!({ "query": { "ids": { "values": [id] } } }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body: DeleteByQueryResponse = response.json().await?;
        Ok(body.deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ElasticsearchClient {
        ElasticsearchClient::new(Url::parse(base).unwrap(), AuthMethod::None).unwrap()
    }

    #[test]
    fn test_url_joins_segments() {
        let c = client("http://localhost:9200");
        assert_eq!(
            c.url(&["users", "_doc", "u1"]).unwrap().as_str(),
            "http://localhost:9200/users/_doc/u1"
        );
        assert_eq!(c.url(&[]).unwrap().as_str(), "http://localhost:9200/");
    }

    #[test]
    fn test_url_keeps_base_path() {
        let c = client("https://proxy.example.com/es/");
        assert_eq!(
            c.url(&["users", "_search"]).unwrap().as_str(),
            "https://proxy.example.com/es/users/_search"
        );
    }

    #[test]
    fn test_url_encodes_ids() {
        let c = client("http://localhost:9200");
        assert_eq!(
            c.url(&["users", "_doc", "a/b c"]).unwrap().as_str(),
            "http://localhost:9200/users/_doc/a%2Fb%20c"
        );
    }

    #[test]
    fn test_index_url_rejects_unaddressable_names() {
        let c = client("http://localhost:9200");
        for name in ["", ".", ".."] {
            assert!(matches!(
                c.index_url(name, &[]),
                Err(EsError::InvalidIndexName(_))
            ));
        }
        assert_eq!(
            c.index_url(".users", &["_search"]).unwrap().as_str(),
            "http://localhost:9200/.users/_search"
        );
    }

    #[test]
    fn test_dot_ids_are_not_path_addressable() {
        assert!(ElasticsearchClient::is_path_addressable("u1"));
        assert!(ElasticsearchClient::is_path_addressable("..."));
        assert!(ElasticsearchClient::is_path_addressable("%2E"));
        assert!(!ElasticsearchClient::is_path_addressable("."));
        assert!(!ElasticsearchClient::is_path_addressable(".."));
    }

    #[test]
    fn test_refresh_param() {
        let url = Url::parse("http://localhost:9200/users/_doc/u1").unwrap();
        assert_eq!(
            ElasticsearchClient::with_refresh(url.clone(), true).as_str(),
            "http://localhost:9200/users/_doc/u1?refresh=true"
        );
        assert_eq!(
            ElasticsearchClient::with_refresh(url, false).as_str(),
            "http://localhost:9200/users/_doc/u1"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        let url = Url::parse("mailto:ops@example.com").unwrap();
        assert!(matches!(
            ElasticsearchClient::new(url, AuthMethod::None),
            Err(EsError::CannotBeABase(_))
        ));
    }

    #[test]
    fn test_auth_from_config() {
        use userdex::config::AuthConfig;

        assert_eq!(AuthMethod::from(&AuthConfig::None), AuthMethod::None);
        assert_eq!(
            AuthMethod::from(&AuthConfig::ApiKey {
                key: "k".to_string()
            }),
            AuthMethod::ApiKey("k".to_string())
        );
    }
}
