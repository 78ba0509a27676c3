use crate::error::{ApiError, Error};
use reqwest::{IntoUrl, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{fmt, time::Duration};

/// Generic JSON-over-HTTP layer the Mailchimp client is built on.
///
/// Paths are relative to the base URL. Every request carries basic auth
/// credentials, and every non-2xx response becomes an [`Error::Mailchimp`].
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    api_key: String,
}

impl RestClient {
    pub fn new<U: IntoUrl, S: Into<String>>(
        base_url: U,
        username: S,
        api_key: S,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into_url()?,
            username: username.into(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "mailchimp request");
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.api_key))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Sends the request and decodes the JSON body. An empty body (e.g. a
    /// `204 No Content`) decodes to `Value::Null`.
    pub async fn send(&self, request: RequestBuilder) -> Result<Value, Error> {
        let resp = request.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await?;
            return Err(ApiError { status, body }.into());
        }

        let bytes = resp.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn send_as<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, Error> {
        let value = self.send(request).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
