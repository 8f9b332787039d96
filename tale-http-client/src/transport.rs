//! Single-request HTTP transport with cookie and CSRF headers

use crate::error::TaleError;
use crate::parser::{Decoded, ResponseParser};
use crate::registry::HttpVerb;
use crate::session::Session;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, REFERER, SET_COOKIE};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;
use zeroize::Zeroize;

const CSRF_HEADER: &str = "x-csrftoken";
const CACHE_BUSTER: &str = "_";

/// Ordered form parameters; keys may repeat
///
/// Values are zeroized on drop since they may carry credentials.
#[derive(Debug, Default)]
pub(crate) struct FormParams(Vec<(String, String)>);

impl FormParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.0.push((key.to_string(), value.into()));
        self
    }

    /// One entry per value, sharing the key
    pub fn push_all<I, S>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.push(key, value);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `application/x-www-form-urlencoded` serialization
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl Drop for FormParams {
    fn drop(&mut self) {
        for (_, value) in &mut self.0 {
            value.zeroize();
        }
    }
}

/// Status, headers and body of one response
#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Every `Set-Cookie` value that is valid header text
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }
}

/// Issues requests against the configured host
#[derive(Clone, Debug)]
pub(crate) struct Transport {
    client: reqwest::blocking::Client,
    base_url: reqwest::Url,
    referer: HeaderValue,
    parser: ResponseParser,
    last_cache_buster: Arc<AtomicI64>,
}

impl Transport {
    pub fn new(client: reqwest::blocking::Client, base_url: reqwest::Url) -> Result<Self, TaleError> {
        let referer = HeaderValue::from_str(&base_url.origin().ascii_serialization())
            .map_err(|_| TaleError::ClientInit("Base URL has no usable origin".to_string()))?;

        Ok(Self {
            client,
            base_url,
            referer,
            parser: ResponseParser::new(),
            last_cache_buster: Arc::new(AtomicI64::new(0)),
        })
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    /// Perform one request
    ///
    /// `url` is resolved against the base URL and must stay on its origin,
    /// so server-supplied URLs never carry the session elsewhere. GET sends `form` in the query
    /// string together with a cache-busting `_` parameter; POST sends it as
    /// an url-encoded body. With a session, the `Cookie` header is attached
    /// and POSTs also carry `x-csrftoken`.
    pub fn request(
        &self,
        url: &str,
        verb: HttpVerb,
        form: &FormParams,
        session: Option<&Session>,
    ) -> Result<RawResponse, TaleError> {
        let mut target = self.base_url.join(url)?;
        if target.origin() != self.base_url.origin() {
            return Err(TaleError::ForeignOrigin(target.origin().ascii_serialization()));
        }

        let builder = match verb {
            HttpVerb::Get => {
                target
                    .query_pairs_mut()
                    .extend_pairs(form.iter())
                    .append_pair(CACHE_BUSTER, &self.next_cache_buster().to_string());
                debug!(verb = %verb, path = target.path(), "sending request");
                self.client.get(target)
            }
            HttpVerb::Post => {
                let body = form.encode();
                debug!(verb = %verb, path = target.path(), body_len = body.len(), "sending request");
                let mut builder = self
                    .client
                    .post(target)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header(CONTENT_LENGTH, body.len());
                if let Some(session) = session {
                    builder = builder.header(CSRF_HEADER, session.csrf_header()?);
                }
                builder.body(body)
            }
        };

        let mut builder = builder.header(REFERER, self.referer.clone());
        if let Some(session) = session {
            builder = builder.header(COOKIE, session.cookie_header()?);
        }

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().map_err(|_| TaleError::Encoding)?;
        debug!(%status, body_len = body.len(), "received response");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    /// Decode a response and apply the application-error policy
    pub fn decode(&self, raw: &RawResponse) -> Result<Decoded, TaleError> {
        self.parser.decode_response(raw)
    }

    /// Milliseconds since the epoch, strictly increasing across calls
    fn next_cache_buster(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = self.last_cache_buster.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_cache_buster.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}
