use ::url::Url;

use crate::error::WriterApiError;

/// Default base URL for the writing backend.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Normalize a base URL to the API root.
///
/// Normalization rules:
/// 1) blank input falls back to [`DEFAULT_API_BASE_URL`]
/// 2) trailing slashes are dropped
/// 3) `/api` is appended when the path does not already end in it
pub fn normalize_api_base(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_API_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/api") {
        return trimmed.to_string();
    }
    format!("{trimmed}/api")
}

/// Resolve path segments under the API root, percent-encoding each segment.
pub fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url, WriterApiError> {
    let api = normalize_api_base(base);
    let mut url = Url::parse(&api)
        .map_err(|error| WriterApiError::InvalidBaseUrl(format!("{api}: {error}")))?;
    url.path_segments_mut()
        .map_err(|()| WriterApiError::InvalidBaseUrl(api.clone()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Build the push-channel URL for a session key.
///
/// `http` maps to `ws` and `https` to `wss`; websocket schemes pass through.
pub fn channel_url(base: &str, session_key: &str) -> Result<Url, WriterApiError> {
    let key = session_key.trim();
    if key.is_empty() {
        return Err(WriterApiError::InvalidBaseUrl(format!(
            "empty session key for {}",
            normalize_api_base(base)
        )));
    }

    let mut url = endpoint_url(base, &["ws", key, "session"])?;
    let shown = url.to_string();
    let ws_scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(WriterApiError::InvalidBaseUrl(shown)),
    };
    url.set_scheme(ws_scheme)
        .map_err(|()| WriterApiError::InvalidBaseUrl(shown))?;
    Ok(url)
}
