//! CMS credentials and Basic-Auth header construction.
//!
//! The application password only ever leaves this type as part of the
//! `Authorization` header value. `Debug` output redacts it, and cache keys
//! are scoped by [`CmsCredentials::cache_scope`], which does not include it.

use anyhow::{bail, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials for a CMS REST API (WordPress-style application passwords).
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CmsCredentials {
    /// API base, e.g. `https://blog.example.com/wp-json/wp/v2`.
    pub base_url: String,
    pub username: String,
    pub app_password: String,
}

impl CmsCredentials {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        app_password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            app_password: app_password.into(),
        }
    }

    /// All three fields are required and the base must be an http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty()
            || self.username.trim().is_empty()
            || self.app_password.trim().is_empty()
        {
            bail!("CMS credentials need a base URL, a username and an application password");
        }
        match url::Url::parse(self.base_url.trim()) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => Ok(()),
            _ => bail!("CMS base URL is not an absolute http(s) URL: {}", self.base_url),
        }
    }

    /// API base without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// `Basic base64(username:app_password)`.
    pub fn authorization_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.app_password);
        format!("Basic {}", STANDARD.encode(raw))
    }

    /// Header pairs to attach to every CMS request.
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![("Authorization".to_string(), self.authorization_header())]
    }

    /// Identity used to separate cache entries between accounts.
    pub fn cache_scope(&self) -> String {
        format!("{}@{}", self.username, self.api_base())
    }
}

impl fmt::Debug for CmsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsCredentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .finish()
    }
}
