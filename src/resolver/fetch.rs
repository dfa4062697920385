//! Download-mode invocation
//!
//! Runs the resolver to completion for one artifact and verifies the file it
//! claims to have produced. Retry behavior for flaky networks lives in the
//! resolver's own flags; this crate never re-invokes on failure.

use crate::resolver::command::Resolver;
use crate::utils::TrackpipeError;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Per-request knobs for a download invocation
#[derive(Debug, Clone)]
pub struct FetchOptions<'a> {
    /// Video rendition (vs. audio-only)
    pub video: bool,
    /// Resolution ceiling for video
    pub max_height: u32,
    /// Cookie file to attach, if the source needs one
    pub cookie: Option<&'a Path>,
    /// Output path template keyed by cache key, e.g. `downloads/{key}.%(ext)s`
    pub output_template: String,
}

impl Resolver {
    /// Fetch one artifact to disk and return its verified path.
    ///
    /// The resolver prints the final path after moving the file into place;
    /// printing a path is not proof the file exists, so the path is stat'd
    /// before being returned.
    pub async fn fetch_media(
        &self,
        url: &str,
        opts: FetchOptions<'_>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, TrackpipeError> {
        let args = download_args(url, &opts);
        info!("Starting full download with args: {:?}", args);

        let start = Instant::now();
        let output = self.run(&args, cancel).await?;
        let elapsed = start.elapsed();

        if !output.success() {
            error!(
                "yt-dlp download FAILED after {:.1?}\nURL: {}\nArgs: {:?}\nSTDOUT:\n{}\nSTDERR:\n{}",
                elapsed, url, args, output.stdout, output.stderr
            );
            return Err(TrackpipeError::DownloadFailed(
                output.stderr.trim().to_string(),
            ));
        }

        let final_path = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .map(PathBuf::from);

        let final_path = match final_path {
            Some(p) => p,
            None => {
                return Err(TrackpipeError::DownloadFailed(
                    "yt-dlp did not output a file path".to_string(),
                ))
            }
        };

        let meta = tokio::fs::metadata(&final_path)
            .await
            .map_err(|_| TrackpipeError::ArtifactMissing(final_path.clone()))?;

        info!(
            "Download complete: {} ({:.2} MB) in {:.1?}",
            final_path.display(),
            meta.len() as f64 / 1024.0 / 1024.0,
            elapsed
        );

        Ok(final_path)
    }
}

fn download_args(url: &str, opts: &FetchOptions<'_>) -> Vec<String> {
    let mut args: Vec<String> = [
        "--no-playlist",
        "--no-part",
        "--no-overwrites",
        "--no-warnings",
        "--geo-bypass",
        "--ignore-errors",
        "--no-check-certificate",
        "--prefer-free-formats",
        "--force-overwrites",
        "--concurrent-fragments",
        "4",
        "--fragment-retries",
        "10",
        "--retries",
        "5",
        "--file-access-retries",
        "5",
        "--extractor-retries",
        "3",
        "--hls-prefer-ffmpeg",
        "--hls-use-mpegts",
        "--downloader",
        "ffmpeg",
        "--no-mtime",
        "--print",
        "after_move:filepath",
        "-o",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(opts.output_template.clone());

    if opts.video {
        args.push("-f".to_string());
        args.push(download_format_selector(true, opts.max_height));
        // Normalize mixed streams into a single mp4 container
        args.push("--merge-output-format".to_string());
        args.push("mp4".to_string());
        args.push("--remux-video".to_string());
        args.push("mp4".to_string());
    } else {
        args.push("-f".to_string());
        args.push(download_format_selector(false, opts.max_height));
        args.push("--extract-audio".to_string());
        args.push("--audio-format".to_string());
        args.push("opus".to_string());
        args.push("--audio-quality".to_string());
        args.push("0".to_string());
    }

    if let Some(cookie) = opts.cookie {
        args.push("--cookies".to_string());
        args.push(cookie.to_string_lossy().into_owned());
    }

    args.push(url.to_string());
    args
}

fn download_format_selector(video: bool, max_height: u32) -> String {
    if video {
        format!(
            "bestvideo*[height<={}][vcodec!=vp9]/best[height<={}]/best",
            max_height, max_height
        )
    } else {
        "bestaudio[acodec=opus]/bestaudio/best".to_string()
    }
}
