//! End-to-end tests for the HLS proxy
//!
//! Starts a real Axum server on a random port in front of a wiremock origin
//! and plays through it the way a player would: fetch the master playlist,
//! follow the rewritten variant, then fetch the rewritten segments.

use hlsgate::config::Config;
use hlsgate::server::build_router;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p/index.m3u8
";

const VARIANT: &str = "#EXTM3U
#EXT-X-VERSION:7
#EXT-X-TARGETDURATION:2
#EXT-X-MEDIA-SEQUENCE:0
#EXT-X-MAP:URI=\"init.mp4\"
#EXTINF:2.0,
seg0.m4s
#EXTINF:2.0,
seg1.m4s
#EXT-X-ENDLIST
";

// ── Test server helpers ───────────────────────────────────────────────────────

/// Spin up the proxy in front of `origin` and return its address.
async fn start_proxy(origin: &MockServer) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let config = Config {
        port: 0,
        origin_base: Url::parse(&origin.uri()).unwrap(),
        is_dev: true,
        allow_insecure_tls: false,
        proxy_timeout: Duration::from_secs(5),
        max_redirects: 5,
        max_upstream_connections: 8,
        segment_max_age_secs: 15,
        default_user_agent: "Mozilla/5.0".to_string(),
        debug_hls: false,
        static_dir: None,
    };

    let app = build_router(config).unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Origin serving a master playlist, one variant, an init segment and two
/// media segments. Segment bodies are distinct so mix-ups show.
async fn start_origin() -> MockServer {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hls/live/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER))
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/hls/live/360p/index.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VARIANT))
        .mount(&origin)
        .await;

    for (name, fill) in [("init.mp4", 0x10u8), ("seg0.m4s", 0x20), ("seg1.m4s", 0x30)] {
        Mock::given(method("GET"))
            .and(path(format!("/hls/live/360p/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(segment_body(fill)))
            .mount(&origin)
            .await;
    }

    origin
}

fn segment_body(fill: u8) -> Vec<u8> {
    let mut body = vec![fill; 256 * 1024];
    body[0] = 0x47;
    body
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_check() {
    let origin = start_origin().await;
    let addr = start_proxy(&origin).await;

    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn player_walkthrough_stays_on_proxy() {
    let origin = start_origin().await;
    let addr = start_proxy(&origin).await;
    let client = reqwest::Client::new();

    // Master playlist: the variant reference points back at the proxy
    let master = client
        .get(format!("http://{}/hls/live/master.m3u8", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(master.status(), 200);
    assert_eq!(
        master.headers().get("content-type").unwrap(),
        "application/vnd.apple.mpegurl"
    );
    let master = master.text().await.unwrap();
    let variant_path = master
        .lines()
        .find(|l| !l.starts_with('#') && !l.is_empty())
        .unwrap()
        .to_string();
    assert_eq!(variant_path, "/hls/live/360p/index.m3u8");

    // Variant playlist: init map and segments are rewritten
    let variant = client
        .get(format!("http://{}{}", addr, variant_path))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(variant.contains("#EXT-X-MAP:URI=\"/hls/live/360p/init.mp4\""));

    let segment_paths: Vec<&str> = variant
        .lines()
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .collect();
    assert_eq!(
        segment_paths,
        vec!["/hls/live/360p/seg0.m4s", "/hls/live/360p/seg1.m4s"]
    );

    // Segments stream back byte-for-byte
    for (segment_path, fill) in segment_paths.iter().zip([0x20u8, 0x30]) {
        let resp = client
            .get(format!("http://{}{}", addr, segment_path))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("cache-control").unwrap(),
            "public, max-age=15, immutable"
        );
        assert_eq!(resp.bytes().await.unwrap().to_vec(), segment_body(fill));
    }

    let init = client
        .get(format!("http://{}/hls/live/360p/init.mp4", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(init.bytes().await.unwrap().to_vec(), segment_body(0x10));
}

#[tokio::test]
async fn concurrent_segment_requests_are_independent() {
    let origin = start_origin().await;
    let addr = start_proxy(&origin).await;
    let client = reqwest::Client::new();

    let mut handles = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        let name = if i % 2 == 0 { "seg0.m4s" } else { "seg1.m4s" };
        let fill = if i % 2 == 0 { 0x20u8 } else { 0x30 };
        handles.push(tokio::spawn(async move {
            let bytes = client
                .get(format!("http://{}/hls/live/360p/{}", addr, name))
                .send()
                .await
                .unwrap()
                .bytes()
                .await
                .unwrap();
            assert_eq!(bytes.to_vec(), segment_body(fill));
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn missing_segment_is_404() {
    let origin = start_origin().await;
    let addr = start_proxy(&origin).await;

    let resp = reqwest::get(format!("http://{}/hls/live/360p/seg99.m4s", addr))
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let origin = start_origin().await;
    let addr = start_proxy(&origin).await;

    let resp = reqwest::Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{}/hls/live/360p/seg0.m4s", addr),
        )
        .header("origin", "https://player.example")
        .header("access-control-request-method", "GET")
        .header("access-control-request-headers", "range")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");
}

#[tokio::test]
async fn exposed_headers_are_advertised() {
    let origin = start_origin().await;
    let addr = start_proxy(&origin).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/hls/live/360p/seg0.m4s", addr))
        .header("origin", "https://player.example")
        .send()
        .await
        .unwrap();

    let exposed = resp
        .headers()
        .get("access-control-expose-headers")
        .unwrap()
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("content-range"));
    assert!(exposed.contains("accept-ranges"));
}
