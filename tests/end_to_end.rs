use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use seesay::camera::{self, SourceConfig};
use seesay::detect::{BoundingBox, Detection, ScriptedDetector};
use seesay::pipeline::{FramePipeline, PipelineConfig};
use seesay::publish;
use seesay::server::{ServerConfig, StreamServer};
use seesay::shutdown::ShutdownSignal;
use seesay::state::DetectionState;
use seesay::stats::Stats;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Split a multipart body into JPEG payloads using each part's
/// Content-Length
fn parts(body: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = body;
    let marker = b"Content-Length: ";

    while let Some(pos) = rest.windows(marker.len()).position(|w| w == marker) {
        rest = &rest[pos + marker.len()..];
        let line_end = rest.windows(2).position(|w| w == b"\r\n").unwrap();
        let len: usize = std::str::from_utf8(&rest[..line_end])
            .unwrap()
            .parse()
            .unwrap();
        let start = line_end + 4; // "\r\n\r\n"
        out.push(rest[start..start + len].to_vec());
        rest = &rest[start + len..];
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_camera_to_http_client() {
    let state = Arc::new(DetectionState::new());
    let stats = Arc::new(Stats::new());
    let (publisher, feed) = publish::channel();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = StreamServer::with_shared(
        ServerConfig::with_addr(addr),
        feed,
        Arc::clone(&state),
        Arc::clone(&stats),
    );
    let shutdown = ShutdownSignal::new();
    let server_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.serve(listener, shutdown.wait()).await })
    };

    // the response head arrives before any frame, so the client is
    // subscribed before the pipeline starts
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let mut response = tokio::time::timeout(
        TIMEOUT,
        client.get(format!("http://{}/video_feed", addr)).send(),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(response.headers()[reqwest::header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .contains("boundary=frame"));

    let source = camera::open(
        &SourceConfig::default()
            .uri("stub://e2e?frames=6")
            .size(64, 48)
            .fps(0),
    )
    .unwrap();
    let detector = ScriptedDetector::constant(vec![Detection::new(
        "person",
        0.9,
        BoundingBox::new(2.0, 2.0, 10.0, 20.0),
    )]);
    let pipeline = FramePipeline::new(
        PipelineConfig::default().skip_interval(2).detect_size(32, 24),
        source,
        Box::new(detector),
        Arc::clone(&state),
        publisher,
    )
    .with_stats(Arc::clone(&stats))
    .spawn()
    .unwrap();

    let mut body = Vec::new();
    tokio::time::timeout(TIMEOUT, async {
        while let Some(chunk) = response.chunk().await.unwrap() {
            body.extend_from_slice(&chunk);
        }
    })
    .await
    .unwrap();

    let result = tokio::task::spawn_blocking(move || pipeline.join())
        .await
        .unwrap();
    assert!(matches!(result, Err(seesay::Error::Capture(_))));

    assert!(body.ends_with(b"--frame--\r\n"));
    let jpegs = parts(&body);
    assert!(!jpegs.is_empty());
    for jpeg in &jpegs {
        let image = image::load_from_memory(jpeg).unwrap();
        assert_eq!((image.width(), image.height()), (64, 48));
    }

    assert_eq!(state.drain().utterance(), "1 person");
    let snapshot = stats.pipeline.snapshot();
    assert_eq!(snapshot.captured, 6);
    assert_eq!(snapshot.processed, 3);

    shutdown.trigger();
    server_task.await.unwrap().unwrap();
}
