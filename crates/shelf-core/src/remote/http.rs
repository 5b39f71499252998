//! REST client for a JSON document database.
//!
//! Documents live at `{base}/{collection}/{key}.json` and the whole
//! collection at `{base}/{collection}.json`. A missing collection or document
//! reads back as `null`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{RemoteDocument, RemoteError, RemoteResult, RemoteStore};
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    collection: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url)
            .field("collection", &self.collection)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> RemoteResult<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            collection: normalize_collection(collection.into())?,
            auth_token: None,
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Append `?auth=<token>` to every request.
    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = normalize_text_option(token);
        self
    }

    /// Replace the transport default (no timeout) with a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> RemoteResult<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn collection_url(&self) -> String {
        format!("{}/{}.json", self.base_url, self.collection)
    }

    pub fn document_url(&self, id: &str) -> String {
        format!(
            "{}/{}/{}.json",
            self.base_url,
            self.collection,
            urlencoding::encode(id)
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> RemoteResult<String> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(body)
        } else {
            Err(RemoteError::Api {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            })
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_all(&self) -> RemoteResult<Vec<(String, RemoteDocument)>> {
        let body = self
            .send(self.request(Method::GET, &self.collection_url()))
            .await?;
        parse_collection_payload(&body)
    }

    async fn fetch_one(&self, id: &str) -> RemoteResult<Option<RemoteDocument>> {
        let body = self
            .send(self.request(Method::GET, &self.document_url(id)))
            .await?;
        parse_document_payload(&body)
    }

    async fn put(&self, id: &str, document: &RemoteDocument) -> RemoteResult<()> {
        let payload = document.to_json()?;
        self.send(
            self.request(Method::PUT, &self.document_url(id))
                .json(&payload),
        )
        .await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> RemoteResult<()> {
        match self
            .send(self.request(Method::DELETE, &self.document_url(id)))
            .await
        {
            Ok(_) => Ok(()),
            Err(RemoteError::Api { status: 404, .. }) => Ok(()),
            Err(error) => Err(error),
        }
    }
}

/// Parse a collection body: `null` or an object of key to document.
///
/// `null` members are skipped; they are keys deleted mid-read.
pub(crate) fn parse_collection_payload(body: &str) -> RemoteResult<Vec<(String, RemoteDocument)>> {
    let value = parse_json(body)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(members) => members
            .into_iter()
            .filter(|(_, document)| !document.is_null())
            .map(|(id, document)| RemoteDocument::from_json(document).map(|doc| (id, doc)))
            .collect(),
        other => Err(RemoteError::InvalidPayload(format!(
            "collection must be an object, got {}",
            compact_text(&other.to_string())
        ))),
    }
}

pub(crate) fn parse_document_payload(body: &str) -> RemoteResult<Option<RemoteDocument>> {
    match parse_json(body)? {
        Value::Null => Ok(None),
        value => RemoteDocument::from_json(value).map(Some),
    }
}

fn parse_json(body: &str) -> RemoteResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|error| RemoteError::InvalidPayload(error.to_string()))
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<RemoteErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
    } else {
        trimmed
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("remote URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "remote URL must include http:// or https://".to_string(),
        ))
    }
}

fn normalize_collection(raw: String) -> RemoteResult<String> {
    let collection = normalize_text_option(Some(raw))
        .map(|value| value.trim_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            RemoteError::InvalidConfiguration("collection must not be empty".to_string())
        })?;
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_rejects_invalid_configuration() {
        assert!(HttpRemoteStore::new("", "books").is_err());
        assert!(HttpRemoteStore::new("example.firebaseio.com", "books").is_err());
        assert!(HttpRemoteStore::new("https://example.firebaseio.com", " / ").is_err());
    }

    #[test]
    fn urls_are_built_from_base_and_collection() {
        let store = HttpRemoteStore::new("https://db.example.com/", "/books/").unwrap();
        assert_eq!(store.collection_url(), "https://db.example.com/books.json");
        assert_eq!(
            store.document_url("a b/c"),
            "https://db.example.com/books/a%20b%2Fc.json"
        );
    }

    #[test]
    fn debug_redacts_auth_token() {
        let store = HttpRemoteStore::new("https://db.example.com", "books")
            .unwrap()
            .with_auth_token(Some("secret".to_string()));
        let debug = format!("{store:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn null_collection_is_empty() {
        assert!(parse_collection_payload("null").unwrap().is_empty());
        assert!(parse_collection_payload("").unwrap().is_empty());
    }

    #[test]
    fn collection_payload_yields_keyed_documents() {
        let body = r#"{
            "k1": {"ownerId": "u1", "title": "Physics", "price": 30.0},
            "k2": null,
            "k3": {"ownerId": "u2", "title": "Chemistry"}
        }"#;
        let documents = parse_collection_payload(body).unwrap();
        let keys: Vec<_> = documents.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["k1", "k3"]);
        assert_eq!(documents[0].1.fields["price"], FieldValue::Float(30.0));
    }

    #[test]
    fn collection_payload_must_be_object() {
        assert!(matches!(
            parse_collection_payload("[1, 2]"),
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn document_payload_null_is_missing() {
        assert_eq!(parse_document_payload("null").unwrap(), None);
        let document = parse_document_payload(r#"{"ownerId": "u1", "title": "X"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(document.owner_id, "u1");
    }

    #[test]
    fn api_error_prefers_message_fields() {
        assert_eq!(
            parse_api_error(StatusCode::UNAUTHORIZED, r#"{"error": "Permission denied"}"#),
            "Permission denied"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "  upstream down "),
            "upstream down"
        );
        assert_eq!(parse_api_error(StatusCode::NOT_FOUND, ""), "Not Found");
    }
}
