//! Per-request client identity: session cookie, address and user agent

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use std::convert::Infallible;
use std::net::SocketAddr;
use tracing::warn;

use crate::core::config::SessionConfig;
use crate::core::session::SessionId;
use crate::AppState;

pub const UNKNOWN_AGENT: &str = "Unknown";

/// The caller's session, taken from the cookie or freshly minted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSession {
    pub id: SessionId,
    /// No valid cookie came with the request
    pub is_new: bool,
}

impl ClientSession {
    pub fn fresh() -> Self {
        Self {
            id: SessionId::new(),
            is_new: true,
        }
    }

    pub fn existing(id: SessionId) -> Self {
        Self { id, is_new: false }
    }

    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == cookie_name)
            .and_then(|(_, value)| SessionId::parse(value))
            .map(Self::existing)
            .unwrap_or_else(Self::fresh)
    }

    pub fn cookie_value(&self, config: &SessionConfig) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            config.cookie_name, self.id, config.ttl_secs
        )
    }

    /// Add `Set-Cookie` to `response` when the session was just created
    pub fn attach(&self, config: &SessionConfig, mut response: Response) -> Response {
        if !self.is_new {
            return response;
        }
        match HeaderValue::from_str(&self.cookie_value(config)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!("Cannot encode session cookie: {}", e),
        }
        response
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ClientSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(
            &parts.headers,
            &state.config.session.cookie_name,
        ))
    }
}

/// Peer address, or the first `X-Forwarded-For` hop when proxies are trusted
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.ip().to_string()
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_AGENT)
        .to_string()
}
