//! HTTP store implementation.
//!
//! Talks to the master-data REST API with JSON bodies. The same client
//! type serves the master store and every sub-account; only the base
//! address differs.

use crate::config::Credentials;
use crate::document::{Document, ID_FIELD};
use crate::error::{SyncError, SyncResult};
use crate::store::{
    DocumentRef, DocumentStore, ScrollPage, ScrollRequest, SearchQuery, StoreConnector,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Header carrying the next scroll token.
pub const SCROLL_TOKEN_HEADER: &str = "x-vtex-md-token";

const APP_KEY_HEADER: &str = "x-vtex-api-appkey";
const APP_TOKEN_HEADER: &str = "x-vtex-api-apptoken";
const USE_HTTPS_HEADER: &str = "x-vtex-use-https";
const RANGE_HEADER: &str = "rest-range";
const MASTER_DATA_ACCEPT: &str = "application/vnd.vtex.ds.v10+json";

/// Base address of an account's data entities.
pub fn account_base_url(account: &str) -> String {
    format!(
        "https://{}.vtexcommercestable.com.br/api/dataentities",
        account
    )
}

/// Connection settings for one store.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Account name, used in logs.
    pub account: String,
    /// Base address, e.g. `https://{account}.vtexcommercestable.com.br/api/dataentities`.
    pub base_url: String,
    /// Shared application credentials.
    pub credentials: Credentials,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpStoreConfig {
    /// Configuration for `account` at its standard address.
    pub fn for_account(account: impl Into<String>, credentials: Credentials) -> Self {
        let account = account.into();
        Self {
            base_url: account_base_url(&account),
            account,
            credentials,
            timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the base address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Create/update response body.
#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(rename = "DocumentId", alias = "Id")]
    document_id: Option<String>,
}

/// Master-data store reached over HTTP.
pub struct HttpStore {
    account: String,
    base_url: Url,
    client: reqwest::Client,
}

impl HttpStore {
    /// Creates a store client.
    pub fn new(config: HttpStoreConfig) -> SyncResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(MASTER_DATA_ACCEPT));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USE_HTTPS_HEADER, HeaderValue::from_static("true"));
        headers.insert(APP_KEY_HEADER, header_value(&config.credentials.app_key)?);
        let mut token = header_value(&config.credentials.app_token)?;
        token.set_sensitive(true);
        headers.insert(APP_TOKEN_HEADER, token);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| SyncError::Config(format!("invalid base url {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "base url {} cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self {
            account: config.account,
            base_url,
            client,
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Builds a request for `base/segments...`; each segment is
    /// percent-encoded, `/`, `?` and `#` included.
    fn request(&self, method: Method, segments: &[&str]) -> SyncResult<RequestBuilder> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config(format!("base url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(self.client.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::remote(status.as_u16(), body))
    }

    async fn write(&self, request: RequestBuilder, fallback_id: &str) -> SyncResult<DocumentRef> {
        let response = self.send(request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(DocumentRef::new(fallback_id));
        }
        let body = response.text().await.map_err(transport_error)?;
        let id = serde_json::from_str::<WriteResponse>(&body)
            .ok()
            .and_then(|r| r.document_id)
            .unwrap_or_else(|| fallback_id.to_string());
        Ok(DocumentRef::new(id))
    }
}

/// An empty projection asks for every field.
fn fields_param(fields: &[String]) -> String {
    if fields.is_empty() {
        "_all".to_string()
    } else {
        fields.join(",")
    }
}

/// Ids travel as a single path segment; `.` and `..` would be collapsed
/// by URL normalisation, so they are refused.
fn id_segment(id: &str) -> SyncResult<&str> {
    match id {
        "" | "." | ".." => Err(SyncError::InvalidRequest(format!(
            "{:?} is not a valid document id",
            id
        ))),
        _ => Ok(id),
    }
}

fn header_value(value: &str) -> SyncResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| SyncError::Config("credentials contain invalid header characters".into()))
}

fn transport_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else if err.is_connect() {
        SyncError::Unreachable(err.to_string())
    } else if err.is_decode() || err.is_body() {
        SyncError::Decode(err.to_string())
    } else {
        SyncError::InvalidRequest(err.to_string())
    }
}

fn decode_documents(body: &str) -> SyncResult<Vec<Document>> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| {
                Document::from_value(item)
                    .ok_or_else(|| SyncError::Decode("expected a JSON object".into()))
            })
            .collect(),
        Ok(_) => Err(SyncError::Decode("expected a JSON array".into())),
        Err(e) => Err(SyncError::Decode(e.to_string())),
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    fn account(&self) -> &str {
        &self.account
    }

    #[instrument(skip(self, fields), fields(account = %self.account))]
    async fn get_document(
        &self,
        entity: &str,
        id: &str,
        fields: &[String],
    ) -> SyncResult<Document> {
        let request = self
            .request(Method::GET, &[entity, "documents", id_segment(id)?])?
            .query(&[("_fields", fields_param(fields))]);

        let response = match self.send(request).await {
            Err(err) if err.is_not_found() => return Err(SyncError::not_found(entity, id)),
            other => other?,
        };
        let body = response.text().await.map_err(transport_error)?;

        // An empty body is how the API reports a missing document on some accounts.
        if body.trim().is_empty() || body.trim() == "null" {
            return Err(SyncError::not_found(entity, id));
        }
        serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(Document::from_value)
            .ok_or_else(|| SyncError::Decode("expected a JSON object".into()))
    }

    #[instrument(skip(self, query), fields(account = %self.account))]
    async fn search(&self, entity: &str, query: &SearchQuery) -> SyncResult<Vec<Document>> {
        let (start, end) = query.range();
        let request = self
            .request(Method::GET, &[entity, "search"])?
            .query(&[
                ("_fields", fields_param(&query.fields)),
                ("_where", query.predicate.to_string()),
            ])
            .header(RANGE_HEADER, format!("resources={}-{}", start, end));

        let body = self
            .send(request)
            .await?
            .text()
            .await
            .map_err(transport_error)?;
        decode_documents(&body)
    }

    #[instrument(skip(self, request), fields(account = %self.account))]
    async fn scroll(&self, entity: &str, request: &ScrollRequest) -> SyncResult<ScrollPage> {
        let mut params = vec![
            ("_fields", fields_param(&request.fields)),
            ("_size", request.page_size.to_string()),
        ];
        if let Some(predicate) = &request.predicate {
            params.push(("_where", predicate.to_string()));
        }
        if let Some(token) = &request.token {
            params.push(("_token", token.clone()));
        }

        let response = self
            .send(self.request(Method::GET, &[entity, "scroll"])?.query(&params))
            .await?;
        let token = response
            .headers()
            .get(SCROLL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .filter(|t| !t.is_empty());
        let body = response.text().await.map_err(transport_error)?;
        let documents = decode_documents(&body)?;

        debug!(documents = documents.len(), has_token = token.is_some(), "scroll page read");

        // An empty page ends the scroll even if a token came back.
        let token = if documents.is_empty() { None } else { token };
        Ok(ScrollPage { documents, token })
    }

    #[instrument(skip(self, document), fields(account = %self.account))]
    async fn create_document(&self, entity: &str, document: &Document) -> SyncResult<DocumentRef> {
        let id = document
            .id()
            .ok_or_else(|| SyncError::InvalidRequest("create requires an explicit id".into()))?;
        // PATCH with the id in the body creates or updates, so it is safe to retry.
        let request = self
            .request(Method::PATCH, &[entity, "documents"])?
            .json(document);
        self.write(request, &id).await
    }

    #[instrument(skip(self, document), fields(account = %self.account))]
    async fn update_partial_document(
        &self,
        entity: &str,
        id: &str,
        document: &Document,
    ) -> SyncResult<DocumentRef> {
        let body = document.without(ID_FIELD);
        let request = self
            .request(Method::PATCH, &[entity, "documents", id_segment(id)?])?
            .json(&body);
        self.write(request, id).await
    }
}

/// Builds one [`HttpStore`] per sub-account from the shared credentials.
#[derive(Debug, Clone)]
pub struct AccountConnector {
    url_template: Option<String>,
    timeout: Duration,
}

impl AccountConnector {
    /// Connector for the standard per-account addresses.
    pub fn new(timeout: Duration) -> Self {
        Self {
            url_template: None,
            timeout,
        }
    }

    /// Connector using a custom address template; `{account}` is replaced
    /// by the account name.
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = Some(template.into());
        self
    }

    fn base_url(&self, account: &str) -> String {
        match &self.url_template {
            Some(template) => template.replace("{account}", account),
            None => account_base_url(account),
        }
    }
}

impl StoreConnector for AccountConnector {
    fn connect(
        &self,
        account: &str,
        credentials: &Credentials,
    ) -> SyncResult<Arc<dyn DocumentStore>> {
        if account.is_empty() || !account.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SyncError::Config(format!("invalid account name {:?}", account)));
        }
        let config = HttpStoreConfig::for_account(account, credentials.clone())
            .with_base_url(self.base_url(account))
            .with_timeout(self.timeout);
        Ok(Arc::new(HttpStore::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_account_address() {
        assert_eq!(
            account_base_url("store-a"),
            "https://store-a.vtexcommercestable.com.br/api/dataentities"
        );
    }

    #[test]
    fn connector_templates_and_validation() {
        let connector = AccountConnector::new(Duration::from_secs(30))
            .with_url_template("http://localhost:9000/{account}/api/dataentities");
        assert_eq!(
            connector.base_url("store-a"),
            "http://localhost:9000/store-a/api/dataentities"
        );

        let credentials = Credentials {
            app_key: "key".into(),
            app_token: "token".into(),
        };
        assert!(connector.connect("store-a", &credentials).is_ok());
        assert!(matches!(
            connector.connect("bad/account", &credentials),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn invalid_credentials_are_a_config_error() {
        let credentials = Credentials {
            app_key: "key\n".into(),
            app_token: "token".into(),
        };
        let result = HttpStore::new(HttpStoreConfig::for_account("store-a", credentials));
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn base_url_must_be_hierarchical() {
        let credentials = Credentials {
            app_key: "key".into(),
            app_token: "token".into(),
        };
        let config = HttpStoreConfig::for_account("store-a", credentials.clone());
        for bad in ["not a url", "mailto:ops@example.com"] {
            let result = HttpStore::new(config.clone().with_base_url(bad));
            assert!(matches!(result, Err(SyncError::Config(_))), "{}", bad);
        }

        let store = HttpStore::new(config.with_base_url("http://localhost:9000/api/")).unwrap();
        assert_eq!(store.base_url(), "http://localhost:9000/api");
    }

    #[test]
    fn decode_rejects_non_arrays() {
        assert!(decode_documents("[]").unwrap().is_empty());
        assert_eq!(decode_documents(r#"[{"id":"a"}]"#).unwrap().len(), 1);
        assert!(matches!(decode_documents("{}"), Err(SyncError::Decode(_))));
        assert!(matches!(decode_documents("[1]"), Err(SyncError::Decode(_))));
    }
}
