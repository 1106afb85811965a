use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::Path,
    http::{header, HeaderMap},
    response::{AppendHeaders, Redirect},
    routing::{get, post},
    Router,
};
use courier_core::message::{decode_response, encode_request, Header, Request, Response};
use courier_fabric::{ChannelProvider, Connection, ConnectionHandler, MemoryProvider, PeerId};
use courier_gateway::{Gateway, GatewayOptions, MalformedPolicy};
use tokio::sync::mpsc;

const CHUNK: usize = 1024;

fn init_tracing() {
    static ONCE: OnceLock<()> = OnceLock::new();
    ONCE.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Start an upstream HTTP server on a random port
async fn upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/json",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"{"hello":"world"}"#,
                )
            }),
        )
        .route("/echo", post(|body: Bytes| async move { body }))
        .route(
            "/headers",
            get(|headers: HeaderMap| async move {
                headers
                    .get_all("x-multi")
                    .iter()
                    .map(|v| v.to_str().unwrap_or_default().to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            }),
        )
        .route(
            "/cookies",
            get(|| async {
                (
                    AppendHeaders([
                        (header::SET_COOKIE, "a=1"),
                        (header::SET_COOKIE, "b=2"),
                    ]),
                    "",
                )
            }),
        )
        .route("/big", get(|| async { vec![b'x'; 11 * 1024 * 1024] }))
        .route(
            "/bytes/{len}",
            get(|Path(len): Path<usize>| async move { vec![b'x'; len] }),
        )
        .route(
            "/stream/{chunks}",
            get(|Path(chunks): Path<usize>| async move {
                // No content-length: the gateway only learns the size by reading.
                Body::from_stream(futures::stream::iter(
                    (0..chunks).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; CHUNK]))),
                ))
            }),
        )
        .route("/redirect", get(|| async { Redirect::temporary("/json") }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                "slow"
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

/// Raw connection to a gateway that surfaces decoded responses
struct RawPeer {
    frames: mpsc::UnboundedSender<Vec<u8>>,
    opened: mpsc::UnboundedSender<()>,
}

#[async_trait::async_trait]
impl ConnectionHandler for RawPeer {
    async fn on_open(&self, _conn: &Connection) {
        let _ = self.opened.send(());
    }

    async fn on_data(&self, _conn: &Connection, bytes: Vec<u8>) {
        let _ = self.frames.send(bytes);
    }
}

struct Harness {
    _gateway: Gateway,
    conn: Connection,
    frames: mpsc::UnboundedReceiver<Vec<u8>>,
    upstream: SocketAddr,
}

impl Harness {
    async fn start(options: GatewayOptions) -> Self {
        init_tracing();
        let upstream = upstream().await;
        let provider = MemoryProvider::new();
        let gateway = Gateway::bind(&provider, options.peer_id("gateway"))
            .await
            .unwrap();

        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (opened_tx, mut opened) = mpsc::unbounded_channel();
        let conn = provider.connect(
            &PeerId::new("gateway"),
            Arc::new(RawPeer {
                frames: frames_tx,
                opened: opened_tx,
            }),
        );
        tokio::time::timeout(Duration::from_secs(5), opened.recv())
            .await
            .unwrap()
            .unwrap();

        Self {
            _gateway: gateway,
            conn,
            frames,
            upstream,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.upstream, path)
    }

    fn send(&self, req: &Request) {
        self.conn.send(encode_request(req).unwrap()).unwrap();
    }

    async fn recv(&mut self) -> Response {
        let bytes = tokio::time::timeout(Duration::from_secs(10), self.frames.recv())
            .await
            .expect("response in time")
            .expect("connection alive");
        decode_response(&bytes).unwrap()
    }

    async fn call(&mut self, req: Request) -> Response {
        self.send(&req);
        let res = self.recv().await;
        assert_eq!(res.id, req.id);
        res
    }
}

fn get_req(id: &str, url: String) -> Request {
    Request {
        id: id.to_string(),
        method: "GET".to_string(),
        url,
        ..Default::default()
    }
}

#[tokio::test]
async fn get_json_keeps_body_and_content_type() {
    let mut h = Harness::start(GatewayOptions::default()).await;

    let res = h.call(get_req("1", h.url("/json"))).await;

    assert_eq!(res.status, 200);
    assert_eq!(res.status_text, "OK");
    assert_eq!(res.body, br#"{"hello":"world"}"#);
    assert_eq!(res.header_values("content-type"), vec!["application/json"]);
}

#[tokio::test]
async fn post_body_reaches_upstream() {
    let mut h = Harness::start(GatewayOptions::default()).await;
    let payload = br#"{"message":"hello world"}"#.to_vec();

    let res = h
        .call(Request {
            id: "2".into(),
            method: "POST".into(),
            url: h.url("/echo"),
            protocol: "HTTP/1.1".into(),
            headers: vec![Header::single("Content-Type", "application/json")],
            body: payload.clone(),
        })
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body, payload);
}

#[tokio::test]
async fn repeated_request_headers_are_all_forwarded() {
    let mut h = Harness::start(GatewayOptions::default()).await;

    let mut req = get_req("3", h.url("/headers"));
    req.headers = vec![
        Header::single("X-Multi", "one"),
        Header::new("X-Multi", vec!["two".into(), "three".into()]),
    ];
    let res = h.call(req).await;

    assert_eq!(String::from_utf8(res.body).unwrap(), "one,two,three");
}

#[tokio::test]
async fn repeated_response_headers_are_kept() {
    let mut h = Harness::start(GatewayOptions::default()).await;

    let res = h.call(get_req("4", h.url("/cookies"))).await;

    assert_eq!(res.header_values("set-cookie"), vec!["a=1", "b=2"]);
}

#[tokio::test]
async fn oversized_body_is_a_500_not_a_truncation() {
    let mut h = Harness::start(GatewayOptions::default().max_body_bytes(10 * 1024 * 1024)).await;

    let res = h.call(get_req("5", h.url("/big"))).await;

    assert_eq!(res.status, 500);
    let body = String::from_utf8(res.body).unwrap();
    assert!(body.contains("too large"), "body was {body:?}");

    // Connection still serves requests
    let res = h.call(get_req("5b", h.url("/json"))).await;
    assert_eq!(res.status, 200);
}

#[tokio::test]
async fn streamed_oversized_body_is_a_500() {
    let limit = 4 * CHUNK as u64;
    let mut h = Harness::start(GatewayOptions::default().max_body_bytes(limit)).await;

    let res = h.call(get_req("s1", h.url("/stream/5"))).await;

    assert_eq!(res.status, 500);
    let body = String::from_utf8(res.body).unwrap();
    assert!(body.contains("too large"), "body was {body:?}");
    assert!(body.contains(&limit.to_string()), "body was {body:?}");
}

#[tokio::test]
async fn body_at_the_limit_passes_through() {
    let limit = 4 * CHUNK as u64;
    let mut h = Harness::start(GatewayOptions::default().max_body_bytes(limit)).await;

    let streamed = h.call(get_req("s2", h.url("/stream/4"))).await;
    assert_eq!(streamed.status, 200);
    assert_eq!(streamed.body.len() as u64, limit);

    let sized = h.call(get_req("s3", h.url(&format!("/bytes/{limit}")))).await;
    assert_eq!(sized.status, 200);
    assert_eq!(sized.body, vec![b'x'; limit as usize]);

    let over = h.call(get_req("s4", h.url(&format!("/bytes/{}", limit + 1)))).await;
    assert_eq!(over.status, 500);
}

#[tokio::test]
async fn http2_label_does_not_break_plain_http() {
    let mut h = Harness::start(GatewayOptions::default()).await;

    let res = h
        .call(Request {
            protocol: "HTTP/2.0".into(),
            ..get_req("v2", h.url("/json"))
        })
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body, br#"{"hello":"world"}"#);
}

#[tokio::test]
async fn redirects_are_returned_not_followed() {
    let mut h = Harness::start(GatewayOptions::default()).await;

    let res = h.call(get_req("6", h.url("/redirect"))).await;

    assert_eq!(res.status, 307);
    assert_eq!(res.header_values("location"), vec!["/json"]);
}

#[tokio::test]
async fn unreachable_destination_is_a_500() {
    let mut h = Harness::start(GatewayOptions::default()).await;
    let closed_port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };

    let res = h
        .call(get_req("7", format!("http://{closed_port}/")))
        .await;

    assert_eq!(res.status, 500);
    let body = String::from_utf8(res.body).unwrap();
    assert!(body.starts_with("Failed to send HTTP request"), "body was {body:?}");
}

#[tokio::test]
async fn unbuildable_request_is_a_500() {
    let mut h = Harness::start(GatewayOptions::default()).await;

    let res = h.call(get_req("8", "no scheme here".into())).await;

    assert_eq!(res.status, 500);
    let body = String::from_utf8(res.body).unwrap();
    assert!(body.starts_with("Failed to create HTTP request"), "body was {body:?}");
}

#[tokio::test]
async fn malformed_frame_gets_sentinel_reply() {
    let mut h = Harness::start(GatewayOptions::default()).await;

    h.conn.send(b"\xde\xad\xbe\xef garbage".to_vec()).unwrap();
    let res = h.recv().await;

    assert_eq!(res.id, "");
    assert_eq!(res.status, 500);
    assert!(String::from_utf8(res.body)
        .unwrap()
        .starts_with("Failed to parse request"));

    let res = h.call(get_req("9", h.url("/json"))).await;
    assert_eq!(res.status, 200);
}

#[tokio::test]
async fn malformed_frame_can_be_dropped() {
    let mut h = Harness::start(GatewayOptions::default().malformed_policy(MalformedPolicy::Drop)).await;

    h.conn.send(b"\xde\xad\xbe\xef garbage".to_vec()).unwrap();
    let res = h.call(get_req("10", h.url("/json"))).await;

    // The first frame to come back answers the valid request
    assert_eq!(res.status, 200);
    assert!(
        tokio::time::timeout(Duration::from_millis(200), h.frames.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn slow_requests_do_not_block_fast_ones() {
    let mut h = Harness::start(GatewayOptions::default()).await;

    h.send(&get_req("slow", h.url("/slow")));
    h.send(&get_req("fast", h.url("/json")));

    assert_eq!(h.recv().await.id, "fast");
    assert_eq!(h.recv().await.id, "slow");
}

#[tokio::test]
async fn response_header_timeout_is_enforced() {
    let options = GatewayOptions {
        response_header_timeout: Duration::from_millis(100),
        ..GatewayOptions::default()
    };
    let mut h = Harness::start(options).await;

    let res = h.call(get_req("11", h.url("/slow"))).await;

    assert_eq!(res.status, 500);
    assert!(String::from_utf8(res.body)
        .unwrap()
        .contains("no response headers"));
}
