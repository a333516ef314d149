//! Header copying between the caller and the backend.
//!
//! [`build_forwarded_headers`] copies the caller's headers onto the
//! outbound request under a [`HeaderValues`] policy, strips hop-by-hop
//! headers, and points `Host` at the backend. [`strip_response_hop_by_hop`]
//! cleans a buffered backend response before it is relayed.

use std::sync::LazyLock;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// How many values of a multi-valued inbound header reach the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderValues {
    /// Only the first value of each header.
    #[default]
    First,
    /// Every value, in order.
    All,
}

/// Strip hop-by-hop headers from a backend response.
///
/// The body has already been fully collected, so `content-length` from the
/// backend no longer describes what is sent and axum sets it from the relayed
/// bytes. Responses that carry no body (`HEAD`, 1xx, 204, 304) keep the
/// backend's value.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap, method: &Method, status: StatusCode) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    if !is_bodiless(method, status) {
        headers.remove(header::CONTENT_LENGTH);
    }
}

fn is_bodiless(method: &Method, status: StatusCode) -> bool {
    *method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Headers for the outbound request to the backend at `authority`.
///
/// `content-length` is dropped along with the hop-by-hop set; the client
/// derives it from the buffered body.
#[must_use]
pub fn build_forwarded_headers(
    original: &HeaderMap,
    policy: HeaderValues,
    authority: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(original.keys_len() + 1);

    for name in original.keys() {
        if HOP_BY_HOP.contains(name) || *name == header::CONTENT_LENGTH || *name == header::HOST {
            continue;
        }
        match policy {
            HeaderValues::First => {
                if let Some(value) = original.get(name) {
                    headers.insert(name.clone(), value.clone());
                }
            }
            HeaderValues::All => {
                for value in original.get_all(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }
    }

    match HeaderValue::from_str(authority) {
        Ok(host) => {
            headers.insert(header::HOST, host);
        }
        Err(e) => {
            tracing::warn!(authority = %authority, error = %e, "invalid backend authority, Host not set");
        }
    }

    headers
}
