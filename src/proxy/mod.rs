//! Core HTTP request forwarding handler.
//!
//! The [`forward_handler`] function is the Axum fallback that receives
//! every request, resolves its backend from the current routing snapshot,
//! and relays the backend's response. Submodules handle prefix matching
//! ([`routing`]), header copying ([`headers`]), and the backend call
//! itself ([`forward`]).

pub mod forward;
pub mod headers;
pub mod routing;

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};

use crate::server::AppState;
use forward::InboundRequest;

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Snapshot held for this request only; a reload swaps in a new table
    // without touching this one.
    let snapshot = state.routes.load_full();
    let route = snapshot.table.resolve(uri.path());

    let request = InboundRequest {
        method: method.clone(),
        uri: uri.clone(),
        headers: req_headers,
        body,
    };

    match state.forwarder.forward(route, request).await {
        Ok(result) => {
            let status = result.status;
            let mut resp_headers = result.headers;
            headers::strip_response_hop_by_hop(&mut resp_headers, &method, status);

            let mut response = Response::new(Body::from(result.body));
            *response.status_mut() = status;
            *response.headers_mut() = resp_headers;

            tracing::info!(
                backend = %route.name,
                method = %method,
                status = status.as_u16(),
                uri = %uri,
                "request forwarded"
            );
            response
        }
        Err(e) if e.is_fatal() => {
            tracing::error!(
                backend = %route.name,
                method = %method,
                uri = %uri,
                error = %e,
                "cannot build backend request, exiting"
            );
            std::process::exit(1);
        }
        Err(e) => {
            let status = e.status();
            tracing::warn!(
                backend = %route.name,
                method = %method,
                status = status.as_u16(),
                uri = %uri,
                error = %e,
                "backend request failed"
            );
            status.into_response()
        }
    }
}
