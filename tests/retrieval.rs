//! Integration-style tests covering the retrieval state machine against stub
//! resolver scripts, without a real yt-dlp installation or external network
//! access.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use trackpipe::platform::{Platform, Track, YtDlpPlatform, PLATFORM_YTDLP};
use trackpipe::resolver::Resolver;
use trackpipe::utils::{AppSettings, TrackpipeError};

fn write_stub(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("stub-ytdlp");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write stub");
    let mut perms = std::fs::metadata(&path).expect("stub metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod stub");
    path
}

fn platform_with(temp: &TempDir, script_body: &str) -> YtDlpPlatform {
    let settings = AppSettings {
        downloads_dir: temp.path().join("downloads"),
        cookies_dir: temp.path().join("cookies"),
        max_video_height: 720,
    };
    let resolver = Resolver::from_path(write_stub(temp.path(), script_body));
    YtDlpPlatform::with_resolver(resolver, settings).expect("build platform")
}

fn sample_track(id: &str, video: bool, is_live: bool) -> Track {
    Track {
        id: id.to_string(),
        title: "Sample".to_string(),
        duration: 60,
        artwork: String::new(),
        url: format!("https://example.com/watch?v={}", id),
        source: PLATFORM_YTDLP,
        video,
        is_live,
    }
}

/// Pre-create a cache artifact as fetch would have left it
fn seed_cache(temp: &TempDir, name: &str) -> PathBuf {
    let downloads = temp.path().join("downloads");
    std::fs::create_dir_all(&downloads).expect("create downloads dir");
    let path = downloads.join(name);
    std::fs::write(&path, b"cached-bytes").expect("seed artifact");
    path
}

/// Serve exactly one HTTP response on a loopback socket
async fn one_shot_http_server(response: &'static str) -> std::net::SocketAddr {
    stalling_http_server(response, Duration::ZERO).await
}

/// Serve one response after sitting on the accepted connection for `delay`
async fn stalling_http_server(response: &'static str, delay: Duration) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        if let Ok((mut sock, _)) = listener.accept().await {
            let mut buf = [0u8; 2048];
            let _ = sock.read(&mut buf).await;
            tokio::time::sleep(delay).await;
            let _ = sock.write_all(response.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
    });
    addr
}

#[tokio::test]
async fn cache_hit_short_circuits_the_resolver() {
    let temp = TempDir::new().expect("temp dir");
    let marker = temp.path().join("resolver-ran");
    let platform = platform_with(&temp, &format!(": > '{}'\nexit 1", marker.display()));
    let cached = seed_cache(&temp, "abc_audio.opus");

    let track = sample_track("abc", false, false);
    let path = platform
        .fetch_and_cache(&track, &CancellationToken::new())
        .await
        .expect("cache hit");

    assert_eq!(path, cached);
    assert!(
        !marker.exists(),
        "a valid cache entry must satisfy the request without resolver work"
    );
}

#[tokio::test]
async fn sequential_fetches_download_at_most_once() {
    let temp = TempDir::new().expect("temp dir");
    let log = temp.path().join("invocations.log");
    let artifact = temp.path().join("downloads/abc_audio.opus");
    let platform = platform_with(
        &temp,
        &format!(
            "echo run >> '{log}'\n: > '{artifact}'\necho '{artifact}'",
            log = log.display(),
            artifact = artifact.display()
        ),
    );

    let track = sample_track("abc", false, false);
    let cancel = CancellationToken::new();

    let first = platform.fetch_and_cache(&track, &cancel).await.expect("first fetch");
    let second = platform.fetch_and_cache(&track, &cancel).await.expect("second fetch");

    assert_eq!(first, second);
    let runs = std::fs::read_to_string(&log).expect("read log");
    assert_eq!(runs.lines().count(), 1, "second call must be a cache hit");
}

#[tokio::test]
async fn concurrent_fetches_for_one_key_download_at_most_once() {
    let temp = TempDir::new().expect("temp dir");
    let log = temp.path().join("invocations.log");
    let artifact = temp.path().join("downloads/abc_audio.opus");
    // The stub stays busy long enough for both callers to overlap.
    let platform = Arc::new(platform_with(
        &temp,
        &format!(
            "echo run >> '{log}'\nsleep 0.3\n: > '{artifact}'\necho '{artifact}'",
            log = log.display(),
            artifact = artifact.display()
        ),
    ));

    let track = sample_track("abc", false, false);

    let spawn_fetch = |platform: Arc<YtDlpPlatform>, track: Track| {
        tokio::spawn(async move {
            platform
                .fetch_and_cache(&track, &CancellationToken::new())
                .await
        })
    };

    let a = spawn_fetch(Arc::clone(&platform), track.clone());
    let b = spawn_fetch(Arc::clone(&platform), track.clone());

    let path_a = a.await.expect("join a").expect("fetch a");
    let path_b = b.await.expect("join b").expect("fetch b");
    assert_eq!(path_a, path_b);

    let runs = std::fs::read_to_string(&log).expect("read log");
    assert_eq!(
        runs.lines().count(),
        1,
        "the loser of the race must wait and then hit the cache"
    );
}

#[tokio::test]
async fn invalid_cached_video_is_refetched() {
    let temp = TempDir::new().expect("temp dir");
    let log = temp.path().join("invocations.log");
    let artifact = temp.path().join("downloads/abc_video.mp4");
    let platform = platform_with(
        &temp,
        &format!(
            "echo run >> '{log}'\n: > '{artifact}'\necho '{artifact}'",
            log = log.display(),
            artifact = artifact.display()
        ),
    );

    // Junk bytes cannot pass the video probe, so the entry must be evicted
    // and fetched fresh.
    seed_cache(&temp, "abc_video.mp4");

    let track = sample_track("abc", true, false);
    let path = platform
        .fetch_and_cache(&track, &CancellationToken::new())
        .await
        .expect("refetch after eviction");

    assert_eq!(path, artifact);
    let runs = std::fs::read_to_string(&log).expect("read log");
    assert_eq!(runs.lines().count(), 1, "corrupt cache entry must trigger one fetch");
}

#[tokio::test]
async fn live_track_fails_without_touching_download_mode() {
    let temp = TempDir::new().expect("temp dir");
    let platform = platform_with(&temp, "exit 1");

    let track = sample_track("radio", false, true);
    let err = platform
        .fetch_and_cache(&track, &CancellationToken::new())
        .await
        .expect_err("live content has no finite file");

    assert!(matches!(err, TrackpipeError::LiveUnsupportedForFile));
}

#[tokio::test]
async fn cancellation_kills_an_in_flight_fetch() {
    let temp = TempDir::new().expect("temp dir");
    let platform = platform_with(&temp, "sleep 30");

    let track = sample_track("slow", false, false);
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
    }

    let start = Instant::now();
    let err = platform
        .fetch_and_cache(&track, &cancel)
        .await
        .expect_err("cancelled fetch must not succeed");

    assert!(matches!(err, TrackpipeError::Cancelled));
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "cancellation must kill the child, not wait it out"
    );
}

#[tokio::test]
async fn cancellation_interrupts_a_direct_stream_attempt() {
    // The server accepts the connection but stalls before answering, so only
    // cancellation can end the validation promptly.
    let addr = stalling_http_server(
        "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        Duration::from_secs(5),
    )
    .await;
    let stream_url = format!("http://{}/stream", addr);

    let temp = TempDir::new().expect("temp dir");
    let platform = platform_with(
        &temp,
        &format!(
            "case \"$1\" in\n-g) echo '{}' ;;\n*) exit 1 ;;\nesac",
            stream_url
        ),
    );

    let track = sample_track("stalled", false, false);
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            cancel.cancel();
        });
    }

    let start = Instant::now();
    let err = platform
        .download(&track, cancel)
        .await
        .expect_err("a cancelled retrieval must not produce a location");

    assert!(matches!(err, TrackpipeError::Cancelled));
    assert!(
        start.elapsed() < Duration::from_secs(3),
        "cancellation must interrupt the validation, not wait for the server"
    );
}

#[tokio::test]
async fn download_returns_direct_stream_when_one_validates() {
    let addr =
        one_shot_http_server("HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await;
    let stream_url = format!("http://{}/stream", addr);

    let temp = TempDir::new().expect("temp dir");
    let platform = platform_with(
        &temp,
        &format!(
            "case \"$1\" in\n-g) echo '{}' ;;\n*) exit 1 ;;\nesac",
            stream_url
        ),
    );

    let track = sample_track("direct", false, false);
    let location = platform
        .download(&track, CancellationToken::new())
        .await
        .expect("direct stream");

    assert_eq!(location, stream_url);
}

#[tokio::test]
async fn live_track_plays_via_direct_stream() {
    let addr =
        one_shot_http_server("HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await;
    let stream_url = format!("http://{}/live", addr);

    let temp = TempDir::new().expect("temp dir");
    let platform = platform_with(
        &temp,
        &format!(
            "case \"$1\" in\n-g) echo '{}' ;;\n*) exit 1 ;;\nesac",
            stream_url
        ),
    );

    let track = sample_track("radio", false, true);
    let location = platform
        .download(&track, CancellationToken::new())
        .await
        .expect("live tracks stream directly");

    assert_eq!(location, stream_url);
}

#[tokio::test]
async fn download_falls_back_to_cache_when_direct_fails() {
    let temp = TempDir::new().expect("temp dir");
    let log = temp.path().join("download-mode.log");
    // Direct mode fails; download mode would be visible in the log.
    let platform = platform_with(
        &temp,
        &format!(
            "case \"$1\" in\n-g) exit 1 ;;\n*) echo run >> '{}'; exit 1 ;;\nesac",
            log.display()
        ),
    );
    let cached = seed_cache(&temp, "abc_audio.opus");

    let track = sample_track("abc", false, false);
    let location = platform
        .download(&track, CancellationToken::new())
        .await
        .expect("cached fallback");

    assert_eq!(PathBuf::from(location), cached);
    assert!(!log.exists(), "cache hit must short-circuit download mode");
}

#[tokio::test]
async fn download_surfaces_fetch_failure_after_fallback() {
    let temp = TempDir::new().expect("temp dir");
    let platform = platform_with(&temp, "echo 'ERROR: boom' >&2\nexit 1");

    let track = sample_track("gone", false, false);
    let err = platform
        .download(&track, CancellationToken::new())
        .await
        .expect_err("nothing resolvable");

    match err {
        TrackpipeError::DownloadFailed(msg) => assert!(msg.contains("boom")),
        other => panic!("expected DownloadFailed, got {:?}", other),
    }
}
