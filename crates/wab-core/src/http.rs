//! Authenticated GET wrapper shared by every upstream adapter.
//!
//! One request, one timeout, no retries: a non-2xx status or a transport failure
//! comes back as `Error::Upstream` for the calling adapter to handle.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::{errors::Error, keys::Secret, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const API_KEY_HEADER: &str = "x-api-key";

/// How the API key travels with each request.
#[derive(Clone, Debug)]
pub enum ApiAuth {
    /// `name: <secret>` request header.
    Header { name: HeaderName, secret: Secret },
    /// `?name=<secret>` query parameter.
    Query { name: String, secret: Secret },
}

impl ApiAuth {
    pub fn api_key_header(secret: Secret) -> Self {
        Self::Header {
            name: HeaderName::from_static(API_KEY_HEADER),
            secret,
        }
    }

    pub fn query(name: impl Into<String>, secret: Secret) -> Self {
        Self::Query {
            name: name.into(),
            secret,
        }
    }
}

/// Body and metadata of a successful (2xx) response.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::upstream(Some(self.status), format!("malformed json body: {e}")))
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Clone, Debug)]
pub struct HttpApiClient {
    base_url: String,
    auth: ApiAuth,
    http: reqwest::Client,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>, auth: ApiAuth, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            auth,
            http,
        })
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Header set for one request: caller headers first, auth last so it always wins.
    fn headers(&self, extra: &[(HeaderName, &str)]) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in extra {
            let value = HeaderValue::from_str(value).map_err(|_| {
                Error::InvalidArgument(format!("invalid value for header {name}"))
            })?;
            headers.insert(name.clone(), value);
        }

        if let ApiAuth::Header { name, secret } = &self.auth {
            let mut value = HeaderValue::from_str(secret.expose()).map_err(|_| {
                Error::SecretInvalid(format!("api key is not a valid {name} header value"))
            })?;
            value.set_sensitive(true);
            headers.insert(name.clone(), value);
        }
        Ok(headers)
    }

    pub async fn request(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        extra_headers: &[(HeaderName, &str)],
    ) -> Result<RawResponse> {
        let headers = self.headers(extra_headers)?;

        let mut params: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        if let ApiAuth::Query { name, secret } = &self.auth {
            params.push((name.as_str(), secret.expose()));
        }

        let resp = self
            .http
            .get(self.url(endpoint))
            .headers(headers)
            .query(&params)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::upstream(
                Some(status.as_u16()),
                format!("{endpoint}: {status}"),
            ));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = resp
            .bytes()
            .await
            .map_err(|e| transport_error(endpoint, e))?
            .to_vec();

        Ok(RawResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Map a reqwest failure without its URL: query-placed keys would otherwise leak
/// into logs.
fn transport_error(endpoint: &str, e: reqwest::Error) -> Error {
    let kind = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else if e.is_decode() || e.is_body() {
        "failed to read body"
    } else {
        "request failed"
    };
    let e = e.without_url();
    Error::upstream(e.status().map(|s| s.as_u16()), format!("{endpoint}: {kind}: {e}"))
}
