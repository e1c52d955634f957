//! Refresh-token cookie handling.

use axum::http::{header, HeaderMap};
use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, SameSite};

use crate::config::Config;

pub const REFRESH_COOKIE: &str = "refreshToken";

/// Attributes for the refresh-token cookie, derived from the environment.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub max_age_seconds: i64,
    pub same_site: SameSite,
    pub secure: bool,
}

impl CookiePolicy {
    pub fn from_config(config: &Config) -> Self {
        let production = config.is_production();
        Self {
            max_age_seconds: config.tokens.refresh_ttl_seconds,
            same_site: if production {
                SameSite::Strict
            } else {
                SameSite::Lax
            },
            secure: production,
        }
    }

    /// `Set-Cookie` value carrying a freshly minted refresh token.
    pub fn issue(&self, refresh_token: &str) -> String {
        Cookie::build((REFRESH_COOKIE, refresh_token.to_string()))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(CookieDuration::seconds(self.max_age_seconds))
            .build()
            .to_string()
    }

    /// `Set-Cookie` value that removes the refresh token.
    pub fn clear(&self) -> String {
        Cookie::build((REFRESH_COOKIE, ""))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(CookieDuration::seconds(0))
            .build()
            .to_string()
    }
}

/// Find the refresh token in the request's `Cookie` headers.
pub fn refresh_token_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|part| Cookie::parse(part.trim().to_string()).ok())
        .find(|c| c.name() == REFRESH_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_string())
}
