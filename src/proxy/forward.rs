//! Single-attempt forwarding of one request to one backend.
//!
//! [`Forwarder::forward`] rebuilds the caller's request against
//! `http://<upstream_host>:<port><path>`, sends it, and buffers the whole
//! backend response (status, every header value, body) into an
//! [`OutboundResult`]. Every failure comes back as a [`ForwardError`];
//! deciding what the caller sees is left to the handler.
//!
//! There is no retry and no load balancing. Dropping the returned future
//! aborts the backend call.

use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::time::Instant;

use super::headers::{build_forwarded_headers, HeaderValues};
use super::routing::Route;
use crate::error::ForwardError;

pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

/// The caller's request, with its body already buffered.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A backend's complete response.
#[derive(Debug)]
pub struct OutboundResult {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct ForwardOptions {
    pub upstream_host: String,
    pub timeout: Duration,
    pub max_response_body: usize,
    pub header_values: HeaderValues,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            upstream_host: "localhost".into(),
            timeout: Duration::from_secs(30),
            max_response_body: 64 * 1024 * 1024,
            header_values: HeaderValues::First,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    client: HttpClient,
    options: ForwardOptions,
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build_http()
}

impl Forwarder {
    #[must_use]
    pub fn new(options: ForwardOptions) -> Self {
        Self {
            client: build_http_client(),
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ForwardOptions {
        &self.options
    }

    /// `host:port` of the backend serving `route`.
    #[must_use]
    pub fn authority(&self, route: &Route) -> String {
        format!("{}:{}", self.options.upstream_host, route.port)
    }

    /// Outbound target for `route`: same path and query, backend authority.
    ///
    /// A request-target that is not origin-form (`OPTIONS *`) is sent to `/`.
    pub fn target(&self, route: &Route, uri: &Uri) -> Result<Uri, ForwardError> {
        let authority = self.authority(route);
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| pq.starts_with('/'))
            .unwrap_or("/");

        Uri::builder()
            .scheme("http")
            .authority(authority.as_str())
            .path_and_query(path)
            .build()
            .map_err(|source| ForwardError::InvalidTarget {
                target: format!("http://{authority}{path}"),
                source,
            })
    }

    pub async fn forward(
        &self,
        route: &Route,
        request: InboundRequest,
    ) -> Result<OutboundResult, ForwardError> {
        let target = self.target(route, &request.uri)?;
        let headers = build_forwarded_headers(
            &request.headers,
            self.options.header_values,
            &self.authority(route),
        );

        let mut builder = hyper::Request::builder()
            .method(request.method)
            .uri(target.clone());
        if let Some(h) = builder.headers_mut() {
            *h = headers;
        }
        let outbound = builder
            .body(Full::new(request.body))
            .map_err(|source| ForwardError::InvalidTarget {
                target: target.to_string(),
                source,
            })?;

        tracing::debug!(backend = %route.name, target = %target, "forwarding request");

        // One deadline covers both the response head and the body.
        let deadline = Instant::now() + self.options.timeout;

        let response = tokio::time::timeout_at(deadline, self.client.request(outbound))
            .await
            .map_err(|_| ForwardError::Timeout(self.options.timeout))?
            .map_err(|source| ForwardError::Unreachable { source })?;

        let (parts, body) = response.into_parts();
        let limit = self.options.max_response_body;
        let collected = tokio::time::timeout_at(deadline, Limited::new(body, limit).collect())
            .await
            .map_err(|_| ForwardError::Timeout(self.options.timeout))?
            .map_err(|source| {
                if source.is::<http_body_util::LengthLimitError>() {
                    ForwardError::ResponseTooLarge { limit }
                } else {
                    ForwardError::BodyRead { source }
                }
            })?;

        Ok(OutboundResult {
            status: parts.status,
            headers: parts.headers,
            body: collected.to_bytes(),
        })
    }
}
