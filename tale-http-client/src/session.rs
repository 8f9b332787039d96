//! Session cookies and CSRF token

use crate::error::TaleError;
use reqwest::header::HeaderValue;
use std::fmt;
use tracing::debug;
use zeroize::Zeroize;

const CSRF_COOKIE: &str = "csrftoken";
const SESSION_COOKIE: &str = "sessionid";

/// An established session with the Tale server
///
/// Holds the `sessionid` and `csrftoken` cookie values, plus the account the
/// session belongs to when the server reported it. Token material is zeroized
/// on drop and never shown by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    session_id: String,
    csrf_token: String,
    account_id: Option<u64>,
    account_name: Option<String>,
}

impl Session {
    /// Create a session from known cookie values
    pub fn new(session_id: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            csrf_token: csrf_token.into(),
            account_id: None,
            account_name: None,
        }
    }

    /// Attach account information
    pub fn with_account(mut self, account_id: Option<u64>, account_name: Option<String>) -> Self {
        self.set_account(account_id, account_name);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    pub fn account_id(&self) -> Option<u64> {
        self.account_id
    }

    pub fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref()
    }

    /// Build a session from `Set-Cookie` header values
    ///
    /// Returns `None` unless both `csrftoken` and `sessionid` are present.
    ///
    /// # Example
    ///
    /// ```
    /// use tale_http_client::Session;
    ///
    /// let session = Session::from_set_cookie([
    ///     "sessionid=xyz; expires=Thu, 01 Jan 2099 00:00:00 GMT; HttpOnly",
    ///     "csrftoken=abc; Path=/",
    /// ])
    /// .unwrap();
    /// assert_eq!(session.csrf_token(), "abc");
    /// assert_eq!(session.session_id(), "xyz");
    /// ```
    pub fn from_set_cookie<'a, I>(headers: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut csrf_token = None;
        let mut session_id = None;

        for (name, value) in headers.into_iter().filter_map(parse_cookie) {
            match name {
                CSRF_COOKIE => csrf_token = Some(value),
                SESSION_COOKIE => session_id = Some(value),
                _ => {}
            }
        }

        Some(Self::new(session_id?, csrf_token?))
    }

    /// Replace the tokens with the ones found in `headers`
    ///
    /// The session is left unchanged unless both cookies are present.
    /// Returns whether an update happened.
    pub fn capture<'a, I>(&mut self, headers: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(mut fresh) = Self::from_set_cookie(headers) else {
            return false;
        };
        std::mem::swap(&mut self.session_id, &mut fresh.session_id);
        std::mem::swap(&mut self.csrf_token, &mut fresh.csrf_token);
        debug!("session cookies refreshed");
        true
    }

    pub(crate) fn set_account(&mut self, account_id: Option<u64>, account_name: Option<String>) {
        if account_id.is_some() {
            self.account_id = account_id;
        }
        if account_name.is_some() {
            self.account_name = account_name;
        }
    }

    /// `Cookie` header carrying both tokens, marked sensitive
    pub(crate) fn cookie_header(&self) -> Result<HeaderValue, TaleError> {
        let mut cookie_string = format!(
            "{CSRF_COOKIE}={}; {SESSION_COOKIE}={}",
            self.csrf_token, self.session_id
        );
        let header_value = HeaderValue::from_bytes(cookie_string.as_bytes());
        cookie_string.zeroize();

        let mut sensitive_header = header_value.map_err(|_| TaleError::InvalidSession)?;
        sensitive_header.set_sensitive(true);
        Ok(sensitive_header)
    }

    /// `x-csrftoken` header value, marked sensitive
    pub(crate) fn csrf_header(&self) -> Result<HeaderValue, TaleError> {
        let mut header = HeaderValue::from_str(&self.csrf_token).map_err(|_| TaleError::InvalidSession)?;
        header.set_sensitive(true);
        Ok(header)
    }
}

/// Name and value of one `Set-Cookie` entry, attributes dropped
fn parse_cookie(raw: &str) -> Option<(&str, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    Some((name.trim(), value.trim().to_string()))
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("account_name", &self.account_name)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.session_id.zeroize();
        self.csrf_token.zeroize();
    }
}
