//! Authenticated REST client.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

use guild_core::{ApiError, ApiResult, TransportError};

use crate::multipart::MultipartForm;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,
    /// Value of the `Authorization` header, if any.
    pub authorization: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl HttpClientConfig {
    /// Creates a configuration with a 30 second timeout and no authorization.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            authorization: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the `Authorization` header value.
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A JSON REST client bound to one base URL and credential.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Builds a client from `config`.
    pub fn new(config: HttpClientConfig) -> ApiResult<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.authorization {
            Some(value) => req.header(reqwest::header::AUTHORIZATION, value),
            None => req,
        }
    }

    /// Sends `GET path?query` and decodes the JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        trace!(path, "GET");
        let req = self.authorize(self.client.get(self.url(path)).query(query));
        decode(execute(req).await?)
    }

    /// Sends `POST path` with a JSON body and decodes the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        trace!(path, "POST json");
        let req = self.authorize(self.client.post(self.url(path)).json(body));
        decode(execute(req).await?)
    }

    /// Sends `POST path` with a `multipart/form-data` body.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: MultipartForm,
    ) -> ApiResult<T> {
        trace!(path, files = form.files.len(), "POST multipart");
        let mut body = Form::new();
        for (name, value) in form.fields {
            body = body.text(name, value);
        }
        for file in form.files {
            body = body.part(file.name, Part::bytes(file.bytes).file_name(file.filename));
        }
        let req = self.authorize(self.client.post(self.url(path)).multipart(body));
        decode(execute(req).await?)
    }

    /// Sends `DELETE path?query`; the response body is ignored.
    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> ApiResult<()> {
        trace!(path, "DELETE");
        let req = self.authorize(self.client.delete(self.url(path)).query(query));
        execute(req).await.map(|_| ())
    }
}

/// Sends the request and returns the body text of a successful response.
async fn execute(req: RequestBuilder) -> ApiResult<String> {
    let resp = req.send().await.map_err(map_reqwest_error)?;
    let status = resp.status();
    let text = resp.text().await.map_err(map_reqwest_error)?;
    if status.is_success() {
        return Ok(text);
    }
    let err = status_error(status.as_u16(), &text);
    warn!(status = status.as_u16(), error = %err, "API request failed");
    Err(err)
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(TransportError::Io(e.to_string()))
    }
}

/// Builds an [`ApiError::Status`] from a failed response body.
///
/// Platform errors carry `{"code": .., "message": ..}`; anything else is kept
/// verbatim as the message.
pub(crate) fn status_error(status: u16, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code"))
        .and_then(Value::as_i64)
        .unwrap_or(i64::from(status));
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    ApiError::Status {
        status,
        code,
        message,
    }
}

/// Decodes a response body; an empty body decodes as JSON `null`.
pub(crate) fn decode<T: DeserializeOwned>(text: String) -> ApiResult<T> {
    let text = if text.trim().is_empty() {
        debug!("Empty response body");
        "null"
    } else {
        text.as_str()
    };
    serde_json::from_str(text).map_err(|e| ApiError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_reads_platform_body() {
        let err = status_error(401, r#"{"code":11241,"message":"token invalid"}"#);
        match err {
            ApiError::Status {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 401);
                assert_eq!(code, 11241);
                assert_eq!(message, "token invalid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_error_keeps_plain_body() {
        let err = status_error(502, "bad gateway");
        assert!(matches!(
            err,
            ApiError::Status { status: 502, code: 502, ref message } if message == "bad gateway"
        ));
    }

    #[test]
    fn test_decode_empty_body_as_null() {
        let value: Option<Value> = decode(String::new()).unwrap();
        assert!(value.is_none());
        let value: Value = decode(r#"{"id":"1"}"#.to_string()).unwrap();
        assert_eq!(value["id"], "1");
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = HttpClient::new(HttpClientConfig::new("https://api.example.com/")).unwrap();
        assert_eq!(client.url("/gateway"), "https://api.example.com/gateway");
    }
}
