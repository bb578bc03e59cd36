use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use legalrag_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use legalrag_core::traits::Embedder;
use legalrag_core::Error;
use legalrag_embed::{embedder_from_settings, HashingEmbedder, RemoteEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::test]
async fn hashing_embedder_shapes_and_determinism() {
    let embedder = HashingEmbedder::new(384).expect("embedder");
    let texts = vec!["Oral evidence must be direct.".to_string(), "Oral evidence must be direct.".to_string()];
    let embs = embedder.embed_documents(&texts).await.expect("embed");

    assert_eq!(embs.len(), 2);
    assert_eq!(embs[0].len(), 384);
    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    assert_eq!(embs[0], embs[1]);
    assert_eq!(embedder.embedder_id(), "hashing:xxh64:d384");
}

#[tokio::test]
async fn hashing_embedder_ranks_shared_words_closer() {
    let embedder = HashingEmbedder::new(384).unwrap();
    let query = embedder.embed_query("section 125 maintenance").await.unwrap();
    let near = embedder.embed_query("Section 125 provides for maintenance of wives").await.unwrap();
    let far = embedder.embed_query("Confessions made to police are inadmissible").await.unwrap();
    assert!(cosine(&query, &near) > cosine(&query, &far));
}

#[tokio::test]
async fn hashing_embedder_handles_empty_text() {
    let embedder = HashingEmbedder::new(8).unwrap();
    let v = embedder.embed_query("").await.unwrap();
    assert_eq!(v.len(), 8);
    assert!((v.iter().map(|x| x * x).sum::<f32>() - 1.0).abs() < 1e-6);
    assert!(HashingEmbedder::new(0).is_err());
}

#[test]
fn factory_builds_hashing_embedder() {
    let settings = EmbeddingSettings { provider: EmbeddingProviderKind::Hashing, dim: 64, ..Default::default() };
    let embedder = embedder_from_settings(&settings, Path::new(".")).expect("factory");
    assert_eq!(embedder.dim(), 64);
}

#[test]
fn factory_reports_missing_local_model() {
    let tmp = tempfile::TempDir::new().unwrap();
    let settings = EmbeddingSettings {
        provider: EmbeddingProviderKind::Local,
        model_dir: tmp.path().join("absent").to_string_lossy().to_string(),
        ..Default::default()
    };
    assert!(embedder_from_settings(&settings, Path::new(".")).is_err());
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
            let len = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Serve one canned HTTP response on a local port; returns the base URL.
async fn serve_once(status_line: &'static str, body: &'static str, delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        assert!(request.starts_with("POST /v1/embeddings"), "unexpected request: {request}");
        tokio::time::sleep(delay).await;
        let resp = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(resp.as_bytes()).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}/v1")
}

fn two_texts() -> Vec<String> {
    vec!["first".to_string(), "second".to_string()]
}

#[tokio::test]
async fn remote_embedder_orders_vectors_by_index() {
    let body = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#;
    let base = serve_once("200 OK", body, Duration::ZERO).await;
    let embedder = RemoteEmbedder::new(&base, "test-model", "key", 2, Duration::from_secs(5)).unwrap();

    let vectors = embedder.embed_documents(&two_texts()).await.expect("embed");

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn remote_embedder_detects_count_mismatch() {
    let body = r#"{"data":[{"index":0,"embedding":[1.0,0.0]}]}"#;
    let base = serve_once("200 OK", body, Duration::ZERO).await;
    let embedder = RemoteEmbedder::new(&base, "test-model", "", 2, Duration::from_secs(5)).unwrap();

    let err = embedder.embed_documents(&two_texts()).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingCountMismatch { texts: 2, vectors: 1 }));
}

#[tokio::test]
async fn remote_embedder_detects_wrong_dimension() {
    let body = r#"{"data":[{"index":0,"embedding":[1.0,0.0,0.0]}]}"#;
    let base = serve_once("200 OK", body, Duration::ZERO).await;
    let embedder = RemoteEmbedder::new(&base, "test-model", "", 2, Duration::from_secs(5)).unwrap();

    let err = embedder.embed_query("only").await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
}

#[tokio::test]
async fn remote_embedder_classifies_server_errors() {
    let base = serve_once("503 Service Unavailable", r#"{"error":"busy"}"#, Duration::ZERO).await;
    let embedder = RemoteEmbedder::new(&base, "test-model", "", 2, Duration::from_secs(5)).unwrap();
    let err = embedder.embed_query("q").await.unwrap_err();
    assert!(err.is_retryable(), "503 is retryable: {err}");

    let base = serve_once("401 Unauthorized", r#"{"error":"bad key"}"#, Duration::ZERO).await;
    let embedder = RemoteEmbedder::new(&base, "test-model", "", 2, Duration::from_secs(5)).unwrap();
    let err = embedder.embed_query("q").await.unwrap_err();
    assert!(!err.is_retryable(), "401 is not retryable: {err}");
}

#[tokio::test]
async fn remote_embedder_timeout_is_retryable() {
    let base = serve_once("200 OK", r#"{"data":[]}"#, Duration::from_secs(5)).await;
    let embedder = RemoteEmbedder::new(&base, "test-model", "", 2, Duration::from_millis(200)).unwrap();
    let err = embedder.embed_query("q").await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingProvider { retryable: true, .. }), "got {err}");
}

#[tokio::test]
async fn remote_embedder_rejects_duplicate_indices() {
    let body = r#"{"data":[{"index":0,"embedding":[1.0,0.0]},{"index":0,"embedding":[0.5,0.5]}]}"#;
    let base = serve_once("200 OK", body, Duration::ZERO).await;
    let embedder = RemoteEmbedder::new(&base, "test-model", "", 2, Duration::from_secs(5)).unwrap();

    let err = embedder.embed_documents(&two_texts()).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingProvider { retryable: false, .. }), "got {err}");
}

#[tokio::test]
async fn remote_embedder_rejects_out_of_range_indices() {
    let body = r#"{"data":[{"index":0,"embedding":[1.0,0.0]},{"index":5,"embedding":[0.0,1.0]}]}"#;
    let base = serve_once("200 OK", body, Duration::ZERO).await;
    let embedder = RemoteEmbedder::new(&base, "test-model", "", 2, Duration::from_secs(5)).unwrap();

    let err = embedder.embed_documents(&two_texts()).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingProvider { retryable: false, .. }), "got {err}");
}
