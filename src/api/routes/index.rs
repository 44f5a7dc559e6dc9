//! Index Route
//!
//! - GET / - The chat page, `index.html` from the static directory
//!
//! Every `{{host}}` in the page is replaced with the request's `Host`
//! header so the page can open `ws://{{host}}/ws` against whichever
//! address it was served from. A header that is not a plain
//! `host[:port]` authority is ignored in favour of the configured host.

use axum::{
    extract::State,
    http::{header::HOST, HeaderMap},
    response::Html,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

const HOST_PLACEHOLDER: &str = "{{host}}";

/// GET /
pub async fn index(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Html<String>> {
    let path = state.config.static_dir.join("index.html");

    let page = match tokio::fs::read_to_string(&path).await {
        Ok(page) => page,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| is_authority(h))
        .unwrap_or_else(|| state.config.host.as_str());

    Ok(Html(render(&page, host)))
}

fn render(page: &str, host: &str) -> String {
    page.replace(HOST_PLACEHOLDER, host)
}

/// Hostname, IPv4 or bracketed IPv6, with an optional port
fn is_authority(host: &str) -> bool {
    !host.is_empty()
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b':' | b'[' | b']'))
}
