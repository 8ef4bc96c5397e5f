//! Small helpers shared by the trust-decision handlers.

/// Normalize an institutional handle for lookup/uniqueness checks.
pub(crate) fn normalize_handle(handle: &str) -> String {
    handle.trim().to_lowercase()
}

/// Extract a client IP from common proxy headers.
///
/// Priority: first `x-forwarded-for` entry, then `x-real-ip`, then
/// `cf-connecting-ip`. Returns `None` when no header yields a value; callers
/// that need an address fall back to loopback.
pub(crate) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    for header in ["x-real-ip", "cf-connecting-ip"] {
        let value = headers
            .get(header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if value.is_some() {
            return value.map(str::to_string);
        }
    }
    None
}

/// Client IP for rate limiting and audit, with the loopback fallback applied.
pub(crate) fn client_ip_or_loopback(headers: &axum::http::HeaderMap) -> String {
    extract_client_ip(headers).unwrap_or_else(|| "127.0.0.1".to_string())
}
