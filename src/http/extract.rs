//! Request-scoped extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::net::SocketAddr;

use crate::domain::aggregates::CurrentUser;
use crate::EcommerceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

const CLIENT_IP_HEADERS: [&str; 3] = ["x-forwarded-for", "proxy-client-ip", "wl-proxy-client-ip"];

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

/// Identity asserted by the upstream authentication layer.
#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(&parts.headers, USER_ID_HEADER)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or(EcommerceError::Unauthorized)?;
        let email = header(&parts.headers, USER_EMAIL_HEADER).ok_or(EcommerceError::Unauthorized)?;
        let roles = header(&parts.headers, USER_ROLES_HEADER)
            .map(|v| v.split(',').map(str::trim).filter(|r| !r.is_empty()).map(str::to_lowercase).collect::<Vec<_>>())
            .unwrap_or_default();
        Ok(CurrentUser::new(id, email).with_roles(roles))
    }
}

/// Payer address: first proxy header entry that is not `unknown`, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for name in CLIENT_IP_HEADERS {
        if let Some(candidate) = header(headers, name).and_then(|v| v.split(',').next()).map(str::trim) {
            if !candidate.is_empty() && !candidate.eq_ignore_ascii_case("unknown") {
                return candidate.to_string();
            }
        }
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}
