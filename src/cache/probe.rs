//! Video artifact validation via ffprobe
//!
//! The probe is a black box: given a file path it reports the first video
//! stream's dimensions as `WxH`, or nothing. Empty output or a non-zero
//! exit means "not a valid video file".

use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Whether the file contains at least one decodable video stream with
/// readable dimensions.
pub async fn has_video_stream(path: &Path) -> bool {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .await;

    let output = match output {
        Ok(o) => o,
        Err(e) => {
            warn!("ffprobe unavailable: {}", e);
            return false;
        }
    };

    if !output.status.success() {
        return false;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.lines().next().and_then(parse_dimensions) {
        Some((w, h)) => {
            debug!("Video artifact validated: {}x{}", w, h);
            true
        }
        None => false,
    }
}

fn parse_dimensions(line: &str) -> Option<(u32, u32)> {
    let (w, h) = line.trim().split_once('x')?;
    let w: u32 = w.parse().ok()?;
    let h: u32 = h.parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("1280x720"), Some((1280, 720)));
        assert_eq!(parse_dimensions("  1920x1080  "), Some((1920, 1080)));
        assert_eq!(parse_dimensions(""), None);
        assert_eq!(parse_dimensions("x"), None);
        assert_eq!(parse_dimensions("0x0"), None, "zero dimensions are unreadable");
        assert_eq!(parse_dimensions("1280x"), None);
        assert_eq!(parse_dimensions("N/AxN/A"), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_a_video() {
        assert!(!has_video_stream(Path::new("/nonexistent/clip.mp4")).await);
    }

    #[tokio::test]
    async fn test_junk_file_is_not_a_video() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("junk.mp4");
        std::fs::write(&path, b"not really an mp4").unwrap();
        assert!(!has_video_stream(&path).await);
    }
}
