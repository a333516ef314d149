//! Integration tests for end-to-end forwarding, failure handling, reload, and shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use routemux::config::ConfigVersion;
use routemux::proxy::forward::{ForwardOptions, Forwarder};
use routemux::proxy::headers::HeaderValues;
use routemux::proxy::routing::{Route, RoutingTable};
use routemux::server::{self, AppState, LoadedTable};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Backend that echoes `<name> <method> <uri> <body>` and reports what it saw.
async fn spawn_backend(name: &'static str) -> u16 {
    let app = Router::new().fallback(
        move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| async move {
            if uri.path().ends_with("/slow") {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }

            let seen_multi = headers.get_all("x-multi").iter().count();
            let seen_host = headers
                .get("host")
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("none"));

            let mut response = Response::new(Body::from(format!(
                "{name} {method} {uri} {}",
                String::from_utf8_lossy(&body)
            )));
            if uri.path().ends_with("/teapot") {
                *response.status_mut() = StatusCode::IM_A_TEAPOT;
            }
            let h = response.headers_mut();
            h.append("x-test", HeaderValue::from_static("a"));
            h.append("x-test", HeaderValue::from_static("b"));
            h.insert("x-seen-multi", HeaderValue::from(seen_multi));
            h.insert("x-seen-host", seen_host);
            response
        },
    )
    .layer(DefaultBodyLimit::disable());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// Backend that answers every connection with a `content-length: 100` head
/// followed by only a few body bytes, then closes.
async fn spawn_truncating_backend() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nshort")
                    .await;
                let _ = stream.shutdown().await;
            });
        }
    });
    port
}

/// A port with nothing listening on it.
fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn local_options() -> ForwardOptions {
    ForwardOptions {
        upstream_host: "127.0.0.1".into(),
        ..ForwardOptions::default()
    }
}

fn route(name: &str, prefix: &str, port: u16) -> Route {
    Route::new(name, vec![prefix.to_string()], port)
}

fn table(routes: Vec<Route>, default_port: u16) -> RoutingTable {
    RoutingTable::new(routes, default_port)
}

async fn start_proxy(
    table: RoutingTable,
    options: ForwardOptions,
) -> (SocketAddr, Arc<AppState>, tokio::sync::oneshot::Sender<()>) {
    start_proxy_with_body_limit(table, options, 1_048_576).await
}

async fn start_proxy_with_body_limit(
    table: RoutingTable,
    options: ForwardOptions,
    max_body: usize,
) -> (SocketAddr, Arc<AppState>, tokio::sync::oneshot::Sender<()>) {
    let state = Arc::new(AppState::new(
        LoadedTable::new(table, ConfigVersion::Hash("test-hash".into()), "test"),
        Forwarder::new(options),
    ));

    let router = server::build_router(state.clone(), max_body);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    (addr, state, shutdown_tx)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn forwards_by_prefix_and_falls_back_to_default() {
    let svc1 = spawn_backend("svc1").await;
    let fallback = spawn_backend("fallback").await;
    let (addr, _, shutdown) =
        start_proxy(table(vec![route("svc1", "/api/v1", svc1)], fallback), local_options()).await;

    let body = client()
        .get(format!("http://{addr}/api/v1/users?page=2"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "svc1 GET /api/v1/users?page=2 ");

    let body = client()
        .get(format!("http://{addr}/other"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "fallback GET /other ");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn first_configured_route_wins() {
    let wide = spawn_backend("wide").await;
    let narrow = spawn_backend("narrow").await;
    let (addr, _, shutdown) = start_proxy(
        table(
            vec![route("wide", "/api", wide), route("narrow", "/api/v1", narrow)],
            dead_port(),
        ),
        local_options(),
    )
    .await;

    let body = client()
        .get(format!("http://{addr}/api/v1/users"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("wide "));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn relays_status_body_and_multi_valued_headers() {
    let port = spawn_backend("svc").await;
    let (addr, _, shutdown) = start_proxy(table(vec![], port), local_options()).await;

    let resp = client()
        .post(format!("http://{addr}/echo"))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let values: Vec<_> = resp
        .headers()
        .get_all("x-test")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(values, vec!["a", "b"]);
    assert_eq!(resp.text().await.unwrap(), "svc POST /echo payload");

    let resp = client()
        .get(format!("http://{addr}/brew/teapot"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 418);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn inbound_headers_keep_first_value_by_default() {
    let port = spawn_backend("svc").await;
    let (addr, _, shutdown) = start_proxy(table(vec![], port), local_options()).await;

    let resp = client()
        .get(format!("http://{addr}/h"))
        .header("x-multi", "1")
        .header("x-multi", "2")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-seen-multi"], "1");
    assert_eq!(
        resp.headers()["x-seen-host"].to_str().unwrap(),
        format!("127.0.0.1:{port}")
    );

    let _ = shutdown.send(());
}

#[tokio::test]
async fn all_values_policy_forwards_every_value() {
    let port = spawn_backend("svc").await;
    let options = ForwardOptions {
        header_values: HeaderValues::All,
        ..local_options()
    };
    let (addr, _, shutdown) = start_proxy(table(vec![], port), options).await;

    let resp = client()
        .get(format!("http://{addr}/h"))
        .header("x-multi", "1")
        .header("x-multi", "2")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-seen-multi"], "2");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unreachable_backend_returns_bad_gateway() {
    let (addr, _, shutdown) = start_proxy(
        table(vec![route("gone", "/gone", dead_port())], dead_port()),
        local_options(),
    )
    .await;

    let resp = client()
        .get(format!("http://{addr}/gone/x"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    assert!(resp.text().await.unwrap().is_empty());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn truncated_backend_body_returns_bad_gateway() {
    let port = spawn_truncating_backend().await;
    let (addr, _, shutdown) = start_proxy(table(vec![], port), local_options()).await;

    let resp = client()
        .get(format!("http://{addr}/partial"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    assert!(resp.text().await.unwrap().is_empty());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn asterisk_options_reaches_default_backend() {
    let port = spawn_backend("fallback").await;
    let (addr, _, shutdown) = start_proxy(
        table(vec![route("api", "/api", dead_port())], port),
        local_options(),
    )
    .await;

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"OPTIONS * HTTP/1.1\r\nhost: proxy\r\nconnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8_lossy(&raw);

    assert!(raw.starts_with("HTTP/1.1 200"), "got {raw}");
    assert!(raw.contains("fallback OPTIONS / "), "got {raw}");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn head_response_keeps_backend_content_length() {
    let port = spawn_backend("svc").await;
    let (addr, _, shutdown) = start_proxy(table(vec![], port), local_options()).await;

    let direct = client()
        .head(format!("http://127.0.0.1:{port}/x"))
        .send()
        .await
        .unwrap();
    let proxied = client()
        .head(format!("http://{addr}/x"))
        .send()
        .await
        .unwrap();

    assert_eq!(proxied.status(), 200);
    let direct_len = direct.headers().get("content-length").cloned();
    assert!(direct_len.is_some());
    assert_eq!(proxied.headers().get("content-length").cloned(), direct_len);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn max_body_above_extractor_default_is_honored() {
    let port = spawn_backend("svc").await;
    let (addr, _, shutdown) =
        start_proxy_with_body_limit(table(vec![], port), local_options(), 8 * 1024 * 1024).await;

    let payload = vec![b'a'; 3 * 1024 * 1024];
    let resp = client()
        .post(format!("http://{addr}/upload"))
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert_eq!(body.len(), "svc POST /upload ".len() + payload.len());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn slow_backend_times_out_with_gateway_timeout() {
    let port = spawn_backend("svc").await;
    let options = ForwardOptions {
        timeout: Duration::from_millis(200),
        ..local_options()
    };
    let (addr, _, shutdown) = start_proxy(table(vec![], port), options).await;

    let resp = client()
        .get(format!("http://{addr}/slow"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 504);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn oversized_response_returns_bad_gateway() {
    let port = spawn_backend("svc").await;
    let options = ForwardOptions {
        max_response_body: 4,
        ..local_options()
    };
    let (addr, _, shutdown) = start_proxy(table(vec![], port), options).await;

    let resp = client()
        .get(format!("http://{addr}/big"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn slow_backend_does_not_delay_other_routes() {
    let slow = spawn_backend("slow").await;
    let fast = spawn_backend("fast").await;
    let (addr, _, shutdown) = start_proxy(
        table(
            vec![route("slow", "/s", slow), route("fast", "/f", fast)],
            dead_port(),
        ),
        local_options(),
    )
    .await;

    let slow_url = format!("http://{addr}/s/slow");
    let slow_request = tokio::spawn(async move { client().get(slow_url).send().await });

    // Let the slow request reach its backend first.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let resp = client()
        .get(format!("http://{addr}/f/quick"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!slow_request.is_finished());

    let slow_resp = slow_request.await.unwrap().unwrap();
    assert_eq!(slow_resp.status(), 200);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn published_table_applies_to_new_requests() {
    let first = spawn_backend("first").await;
    let second = spawn_backend("second").await;
    let (addr, state, shutdown) =
        start_proxy(table(vec![route("first", "/x", first)], dead_port()), local_options()).await;

    let body = client()
        .get(format!("http://{addr}/x"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("first "));

    server::publish(
        &state,
        LoadedTable::new(
            table(vec![route("second", "/x", second)], dead_port()),
            ConfigVersion::Hash("next".into()),
            "test",
        ),
    );

    let body = client()
        .get(format!("http://{addr}/x"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("second "));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn graceful_shutdown_works() {
    let port = spawn_backend("svc").await;
    let (addr, _, shutdown) = start_proxy(table(vec![], port), local_options()).await;

    let url = format!("http://{addr}/ping");
    assert!(client().get(&url).send().await.is_ok());

    let _ = shutdown.send(());

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(client().get(&url).send().await.is_err());
}
