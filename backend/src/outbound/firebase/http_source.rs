//! Reqwest-backed Firebase Realtime Database source.
//!
//! Owns transport details only: path-to-URL mapping, auth query parameters,
//! timeout and HTTP error mapping, and JSON decoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use crate::domain::ports::{FirebaseTreeSource, FirebaseTreeSourceError};

/// File suffix the REST API expects on every resource path.
const JSON_SUFFIX: &str = ".json";

/// Tree source speaking the Realtime Database REST protocol.
pub struct FirebaseRestSource {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl FirebaseRestSource {
    /// Build a source against `base_url` with a whole-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base_url: Url,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            auth_token: auth_token.filter(|token| !token.is_empty()),
        })
    }

    /// REST URL for a slash-separated tree path.
    fn resource_url(&self, path: &str) -> Result<Url, FirebaseTreeSourceError> {
        let mut url = self.base_url.clone();
        let mut parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
        let leaf = parts
            .pop()
            .map_or_else(|| JSON_SUFFIX.to_owned(), |leaf| format!("{leaf}{JSON_SUFFIX}"));
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                FirebaseTreeSourceError::unavailable(format!(
                    "database URL {} cannot carry a path",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty();
            segments.extend(parts);
            segments.push(&leaf);
        }
        Ok(url)
    }

    fn authorised(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token.as_str())]),
            None => request,
        }
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value, FirebaseTreeSourceError> {
        let response = self
            .authorised(request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        decode_body(body.as_ref())
    }
}

#[async_trait]
impl FirebaseTreeSource for FirebaseRestSource {
    async fn read(&self, path: &str) -> Result<Option<Value>, FirebaseTreeSourceError> {
        let url = self.resource_url(path)?;
        debug!(%path, "firebase read");
        let value = self.send_json(self.client.get(url)).await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn child_keys(&self, path: &str) -> Result<Vec<String>, FirebaseTreeSourceError> {
        let url = self.resource_url(path)?;
        debug!(%path, "firebase shallow read");
        let value = self
            .send_json(self.client.get(url).query(&[("shallow", "true")]))
            .await?;
        Ok(match value {
            Value::Object(map) => map.into_iter().map(|(key, _)| key).collect(),
            _ => Vec::new(),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), FirebaseTreeSourceError> {
        let url = self.resource_url(path)?;
        debug!(%path, "firebase delete");
        self.send_json(self.client.delete(url)).await.map(|_| ())
    }
}

fn decode_body(body: &[u8]) -> Result<Value, FirebaseTreeSourceError> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|error| {
        FirebaseTreeSourceError::decode(format!("invalid Firebase JSON payload: {error}"))
    })
}

fn map_transport_error(error: reqwest::Error) -> FirebaseTreeSourceError {
    if error.is_timeout() {
        FirebaseTreeSourceError::timeout(error.to_string())
    } else {
        FirebaseTreeSourceError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> FirebaseTreeSourceError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            FirebaseTreeSourceError::timeout(message)
        }
        _ if status.is_server_error() => FirebaseTreeSourceError::transport(message),
        _ => FirebaseTreeSourceError::status(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Non-network coverage for URL building and error mapping.

    use super::*;
    use rstest::rstest;

    fn source(base: &str) -> FirebaseRestSource {
        FirebaseRestSource::new(
            Url::parse(base).expect("valid url"),
            Some("secret".to_owned()),
            Duration::from_secs(5),
        )
        .expect("client builds")
    }

    #[rstest]
    #[case(
        "https://db.example/",
        "fastpay/d1/messages",
        "https://db.example/fastpay/d1/messages.json"
    )]
    #[case("https://db.example", "device", "https://db.example/device.json")]
    #[case(
        "https://db.example/root/",
        "message/d1/",
        "https://db.example/root/message/d1.json"
    )]
    #[case("https://db.example/", "", "https://db.example/.json")]
    fn builds_rest_urls(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
        let url = source(base).resource_url(path).expect("url builds");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT, "Timeout")]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, "Timeout")]
    #[case::unauthorised(StatusCode::UNAUTHORIZED, "Status")]
    #[case::server_error(StatusCode::SERVICE_UNAVAILABLE, "Transport")]
    fn maps_http_statuses(#[case] status: StatusCode, #[case] expected: &str) {
        let error = map_status_error(status, b"{\"error\" : \"Permission denied\"}");
        let matched = match expected {
            "Timeout" => matches!(error, FirebaseTreeSourceError::Timeout { .. }),
            "Status" => matches!(error, FirebaseTreeSourceError::Status { .. }),
            "Transport" => matches!(error, FirebaseTreeSourceError::Transport { .. }),
            _ => panic!("unsupported test expectation: {expected}"),
        };
        assert!(matched, "{status} mapped to {error:?}");
    }

    #[test]
    fn status_messages_carry_a_compact_preview() {
        let error = map_status_error(StatusCode::UNAUTHORIZED, b"{\n  \"error\" :  \"denied\"\n}");
        assert_eq!(
            error.to_string(),
            "firebase rejected request: status 401: { \"error\" : \"denied\" }"
        );
    }

    #[test]
    fn empty_bodies_decode_as_null() {
        assert_eq!(decode_body(b""), Ok(Value::Null));
        assert!(matches!(
            decode_body(b"<html>"),
            Err(FirebaseTreeSourceError::Decode { .. })
        ));
    }
}
