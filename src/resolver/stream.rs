//! Direct-stream resolution
//!
//! Asks the resolver for ready-to-play addresses, then probes each candidate
//! with a header-only request and returns the first reachable one. Never
//! writes to disk and never re-invokes the resolver.

use crate::resolver::command::Resolver;
use crate::utils::TrackpipeError;
use reqwest::header;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timeout for one candidate reachability probe
pub const STREAM_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Some CDNs reject unidentified clients on HEAD requests
pub const PROBE_USER_AGENT: &str = "Mozilla/5.0 (compatible; yt-dlp/2023.07.06)";

/// Per-request knobs for a direct-stream resolution
#[derive(Debug, Clone, Copy)]
pub struct DirectStreamOptions<'a> {
    /// Video rendition (vs. audio-only)
    pub video: bool,
    /// Restricted-platform URL: excludes segmented m3u8 formats, which need
    /// an extra segment-fetching step downstream
    pub restricted: bool,
    /// Resolution ceiling for video
    pub max_height: u32,
    /// Cookie file to attach, if the source needs one
    pub cookie: Option<&'a Path>,
}

/// Build the shared HEAD-probe client once
pub fn probe_client() -> Result<reqwest::Client, TrackpipeError> {
    let client = reqwest::Client::builder()
        .user_agent(PROBE_USER_AGENT)
        .timeout(STREAM_PROBE_TIMEOUT)
        .build()?;
    Ok(client)
}

impl Resolver {
    /// Resolve one or more playable addresses and return the first that
    /// passes the reachability probe.
    ///
    /// One resolver invocation, multiple candidate validations. Any failure
    /// mode here means zero usable candidates, so the typed error is
    /// `NoValidStream`; cancellation surfaces as `Cancelled`, whether it
    /// lands during the resolver wait or during a validation. Diagnostics
    /// go to the log.
    pub async fn resolve_direct_stream(
        &self,
        client: &reqwest::Client,
        url: &str,
        opts: DirectStreamOptions<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, TrackpipeError> {
        let args = direct_stream_args(url, &opts);
        debug!("Executing yt-dlp for direct stream: {:?}", args);

        let start = Instant::now();
        let output = self.run(&args, cancel).await?;
        let elapsed = start.elapsed();

        if !output.success() {
            error!(
                "yt-dlp -g failed after {:.1?}\nArgs: {:?}\nStderr:\n{}",
                elapsed, args, output.stderr
            );
            return Err(TrackpipeError::NoValidStream);
        }

        if output.stdout.trim().is_empty() {
            warn!("yt-dlp returned empty stream URL for {}", url);
            return Err(TrackpipeError::NoValidStream);
        }

        for (i, candidate) in candidate_urls(&output.stdout).into_iter().enumerate() {
            info!("Validating candidate stream URL #{}: {}", i + 1, candidate);
            // The HEAD request is a suspension point like the resolver wait;
            // cancellation interrupts it rather than waiting it out.
            let validation = tokio::select! {
                result = validate_stream_url(client, candidate) => result,
                _ = cancel.cancelled() => {
                    warn!("Cancellation requested during stream validation");
                    return Err(TrackpipeError::Cancelled);
                }
            };
            match validation {
                Ok(()) => {
                    info!("Valid stream URL selected: {}", candidate);
                    return Ok(candidate.to_string());
                }
                Err(e) => warn!("Stream URL #{} invalid: {}", i + 1, e),
            }
        }

        Err(TrackpipeError::NoValidStream)
    }
}

/// Header-only reachability check: any status below 400 passes.
pub(crate) async fn validate_stream_url(
    client: &reqwest::Client,
    url: &str,
) -> Result<(), TrackpipeError> {
    let resp = client.head(url).send().await?;

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    resp.error_for_status()?;

    debug!("Stream URL validated | Content-Type: {}", content_type);
    Ok(())
}

fn direct_stream_args(url: &str, opts: &DirectStreamOptions<'_>) -> Vec<String> {
    let mut args: Vec<String> = [
        "-g",
        "--no-playlist",
        "--geo-bypass",
        "--no-check-certificate",
        "--prefer-free-formats",
        "--no-warnings",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push("-f".to_string());
    args.push(stream_format_selector(
        opts.video,
        opts.restricted,
        opts.max_height,
    ));

    if let Some(cookie) = opts.cookie {
        args.push("--cookies".to_string());
        args.push(cookie.to_string_lossy().into_owned());
    }

    args.push(url.to_string());
    args
}

fn stream_format_selector(video: bool, restricted: bool, max_height: u32) -> String {
    match (restricted, video) {
        (true, true) => format!(
            "bestvideo*[protocol!=m3u8][height<={}]/best[protocol!=m3u8]",
            max_height
        ),
        (true, false) => "bestaudio[protocol!=m3u8]/bestaudio".to_string(),
        (false, true) => format!("bestvideo*[height<={}]/best", max_height),
        (false, false) => "bestaudio/best".to_string(),
    }
}

/// Candidate addresses, one per stdout line; blanks and non-http lines
/// (resolver chatter) are skipped.
fn candidate_urls(stdout: &str) -> Vec<&str> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.starts_with("http"))
        .collect()
}
