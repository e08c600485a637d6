//! Realtime-database REST backend.
//!
//! Documents live at `{database_url}/{collection}/{code}.json`. Versions are
//! the ETags the database hands out when asked with `X-Firebase-ETag`, and
//! conditional writes send them back in `if-match`; a stale tag is answered
//! with `412 Precondition Failed`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::error::RoomError;
use crate::store::{CasOutcome, RoomBackend, Version, Versioned};

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";
const ETAG_HEADER: &str = "ETag";
const IF_MATCH_HEADER: &str = "if-match";

/// REST client for one collection of room documents.
#[derive(Debug, Clone)]
pub struct FirebaseBackend {
    client: reqwest::Client,
    database_url: String,
    collection: String,
    auth_token: Option<String>,
}

impl FirebaseBackend {
    /// Creates a backend for `collection` under `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError`] if the HTTP client cannot be built.
    #[instrument(skip(auth_token), fields(has_token = auth_token.is_some()))]
    pub fn new(
        database_url: &str,
        collection: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RoomError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            database_url: database_url.trim_end_matches('/').to_string(),
            collection: collection.trim_matches('/').to_string(),
            auth_token,
        })
    }

    fn document_url(&self, key: &str) -> String {
        format!("{}/{}/{}.json", self.database_url, self.collection, key)
    }

    fn collection_url(&self) -> String {
        format!("{}/{}.json", self.database_url, self.collection)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }

    fn etag(response: &Response) -> Result<Version, RoomError> {
        response
            .headers()
            .get(ETAG_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(Version::new)
            .ok_or_else(|| RoomError::unavailable("response carried no ETag"))
    }
}

async fn ensure_success(response: Response) -> Result<Response, RoomError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    warn!(%status, url = %url, body = %body, "Store request failed");
    Err(RoomError::unavailable(format!("{} returned {}", url, status)))
}

#[async_trait]
impl RoomBackend for FirebaseBackend {
    #[instrument(skip(self))]
    async fn fetch(&self, key: &str) -> Result<Versioned<Value>, RoomError> {
        let response = self
            .request(Method::GET, &self.document_url(key))
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let version = Self::etag(&response)?;
        let data: Value = response.json().await?;
        debug!(%version, "Fetched document");
        Ok(Versioned { data, version })
    }

    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<Map<String, Value>, RoomError> {
        let response = self
            .request(Method::GET, &self.collection_url())
            .send()
            .await?;
        let response = ensure_success(response).await?;
        match response.json::<Value>().await? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => {
                warn!(?other, "Collection is not an object, treating as empty");
                Ok(Map::new())
            }
        }
    }

    #[instrument(skip(self, document))]
    async fn put(&self, key: &str, document: Value) -> Result<(), RoomError> {
        let response = self
            .request(Method::PUT, &self.document_url(key))
            .json(&document)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self, document), fields(expected = %expected))]
    async fn put_if_version(
        &self,
        key: &str,
        document: Value,
        expected: &Version,
    ) -> Result<CasOutcome, RoomError> {
        let response = self
            .request(Method::PUT, &self.document_url(key))
            .header(ETAG_REQUEST_HEADER, "true")
            .header(IF_MATCH_HEADER, expected.as_str())
            .json(&document)
            .send()
            .await?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            debug!("Document changed since read");
            return Ok(CasOutcome::Conflict);
        }
        let response = ensure_success(response).await?;
        Ok(CasOutcome::Applied(Self::etag(&response)?))
    }

    #[instrument(skip(self, fields), fields(field_count = fields.len()))]
    async fn patch(&self, key: &str, fields: Map<String, Value>) -> Result<(), RoomError> {
        let response = self
            .request(Method::PATCH, &self.document_url(key))
            .json(&fields)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), RoomError> {
        let response = self
            .request(Method::DELETE, &self.document_url(key))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let backend = FirebaseBackend::new(
            "https://example.firebasedatabase.app/",
            "/rooms/",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            backend.document_url("AB3D"),
            "https://example.firebasedatabase.app/rooms/AB3D.json"
        );
        assert_eq!(
            backend.collection_url(),
            "https://example.firebasedatabase.app/rooms.json"
        );
    }

    #[test]
    fn test_auth_token_is_query_encoded() {
        let backend = FirebaseBackend::new(
            "https://example.firebasedatabase.app",
            "rooms",
            Some("a b&c=d".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        let request = backend
            .request(Method::GET, &backend.document_url("AB3D"))
            .build()
            .unwrap();

        assert_eq!(request.url().path(), "/rooms/AB3D.json");
        assert_eq!(request.url().query(), Some("auth=a+b%26c%3Dd"));
        let pairs: Vec<_> = request.url().query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "auth");
        assert_eq!(pairs[0].1, "a b&c=d");
    }
}
