//! trackpipe - Media Source Resolution CLI
//!
//! Resolves a page or playlist URL into tracks via yt-dlp, then retrieves
//! each one as a direct stream address or a cached local file and prints the
//! resulting location, one per line.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trackpipe::platform::{PlatformRegistry, YtDlpPlatform};
use trackpipe::utils::AppSettings;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "trackpipe",
    about = "Resolve a URL into a playable stream address or cached media file"
)]
struct Args {
    /// Page or playlist URL to resolve
    query: String,

    /// Request the video rendition instead of audio-only
    #[arg(long)]
    video: bool,

    /// Print resolved tracks without retrieving them
    #[arg(long)]
    info_only: bool,

    /// Directory for cached media artifacts
    #[arg(long)]
    downloads_dir: Option<PathBuf>,

    /// Directory holding rotating cookie files for restricted sources
    #[arg(long)]
    cookies_dir: Option<PathBuf>,

    /// Resolution ceiling for video renditions
    #[arg(long)]
    max_height: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut settings = AppSettings::default();
    if let Some(dir) = args.downloads_dir {
        settings.downloads_dir = dir;
    }
    if let Some(dir) = args.cookies_dir {
        settings.cookies_dir = dir;
    }
    if let Some(height) = args.max_height {
        settings.max_video_height = height;
    }

    let platform = YtDlpPlatform::new(settings).context("failed to initialize yt-dlp engine")?;
    let registry = PlatformRegistry::new(vec![Arc::new(platform)]);

    let handler = match registry.find(&args.query) {
        Some(handler) => handler,
        None => bail!("no platform accepts this reference: {}", args.query),
    };

    // Ctrl-C cancels in-flight resolver work instead of orphaning it.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let tracks = handler
        .get_tracks(&args.query, args.video, cancel.clone())
        .await?;
    if tracks.is_empty() {
        bail!("no tracks resolved from {}", args.query);
    }

    for track in &tracks {
        let live = if track.is_live { "  [live]" } else { "" };
        println!("{}  {} ({}s){}", track.id, track.title, track.duration, live);
    }

    if args.info_only {
        return Ok(());
    }

    let mut failures = 0usize;
    for track in &tracks {
        match handler.download(track, cancel.clone()).await {
            Ok(location) => {
                info!("Resolved {} -> {}", track.id, location);
                println!("{}", location);
            }
            Err(e) => {
                failures += 1;
                error!("Failed to retrieve {}: {}", track.id, e);
            }
        }
    }

    if failures == tracks.len() {
        bail!("all {} track(s) failed to retrieve", failures);
    }

    Ok(())
}
