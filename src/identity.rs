//! Client identity derivation for rate-limit keys.
//!
//! Proxy headers are attacker-controlled behind an untrusted proxy. The value
//! returned here is a coarse abuse signal and must never feed authorization.

use axum::http::HeaderMap;

/// Shared bucket for traffic that carries no proxy headers.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then [`UNKNOWN_IDENTITY`].
pub fn client_identity(headers: &HeaderMap) -> String {
    if let Some(first) = header_str(headers, "x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header_str(headers, "x-real-ip")
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_string();
    }

    UNKNOWN_IDENTITY.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Sanitize key components to ensure valid Redis keys
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ':' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
