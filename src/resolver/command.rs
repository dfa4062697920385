//! yt-dlp process plumbing
//!
//! Locates the resolver binary and runs it with captured output and prompt
//! cancellation. Every invocation mode in this crate goes through [`Resolver::run`].

use crate::utils::TrackpipeError;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle to the external resolver binary
pub struct Resolver {
    bin: PathBuf,
    /// Constrained PATH handed to the child so auxiliary runtimes it shells
    /// out to (ffmpeg, deno) are discoverable even under a stripped parent
    /// environment.
    child_path: Option<OsString>,
}

/// Captured output of one resolver invocation
pub struct ResolverOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ResolverOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

impl Resolver {
    /// Locate yt-dlp and build a handle, or fail with `ResolverNotFound`
    pub fn locate() -> Result<Self, TrackpipeError> {
        match find_resolver() {
            Some(bin) => {
                info!("Found yt-dlp at: {}", bin.display());
                Ok(Self::from_path(bin))
            }
            None => Err(TrackpipeError::ResolverNotFound),
        }
    }

    /// Build a handle around a known binary path (used by tests with stub
    /// scripts and by callers that manage discovery themselves)
    pub fn from_path(bin: PathBuf) -> Self {
        let child_path = child_search_path(&bin);
        Self { bin, child_path }
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        if let Some(path) = &self.child_path {
            cmd.env("PATH", path);
        }
        cmd
    }

    /// Run the resolver to completion with both streams captured.
    ///
    /// Cancelling the token kills the child process rather than abandoning
    /// the wait, so a cancelled request never leaks a running download.
    pub(crate) async fn run(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<ResolverOutput, TrackpipeError> {
        debug!("Executing {} {:?}", self.bin.display(), args);

        let mut cmd = self.command();
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "resolver stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "resolver stderr not captured"))?;

        // Drain both pipes off-task so a chatty child never blocks on a full
        // pipe buffer while we wait on it.
        let stdout_task = tokio::spawn(read_to_string_lossy(stdout));
        let stderr_task = tokio::spawn(read_to_string_lossy(stderr));

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                warn!("Cancellation requested, killing resolver process");
                let _ = child.kill().await;
                return Err(TrackpipeError::Cancelled);
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ResolverOutput {
            status,
            stdout,
            stderr,
        })
    }
}

async fn read_to_string_lossy<R>(mut reader: R) -> String
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

// ============================================================
// Resolver binary discovery
// ============================================================

/// Find the yt-dlp binary: system PATH first, then common installation paths
pub fn find_resolver() -> Option<PathBuf> {
    if let Ok(path) = which::which("yt-dlp") {
        if path.exists() {
            return Some(path);
        }
    }

    find_in_common_paths()
}

/// Check common installation locations (Homebrew, pip user installs, etc.)
fn find_in_common_paths() -> Option<PathBuf> {
    let common_paths = [
        "/opt/homebrew/bin/yt-dlp",
        "/usr/local/bin/yt-dlp",
        "/usr/bin/yt-dlp",
        "/Library/Frameworks/Python.framework/Versions/Current/bin/yt-dlp",
        "~/.local/bin/yt-dlp",
    ];

    for path_str in common_paths {
        let expanded = expand_home(path_str);
        if expanded.exists() && is_executable(&expanded) {
            return Some(expanded);
        }
    }

    None
}

/// Directories placed on the child's PATH, in order: the resolver's own
/// directory, standard bin dirs, and user-local installs where deno/node
/// ordinarily land.
fn child_search_path(bin: &Path) -> Option<OsString> {
    let mut dirs_list: Vec<PathBuf> = Vec::new();

    if let Some(parent) = bin.parent() {
        if !parent.as_os_str().is_empty() {
            dirs_list.push(parent.to_path_buf());
        }
    }

    for dir in ["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin", "/bin"] {
        dirs_list.push(PathBuf::from(dir));
    }

    if let Some(home) = dirs::home_dir() {
        dirs_list.push(home.join(".local/bin"));
        dirs_list.push(home.join(".deno/bin"));
    }

    std::env::join_paths(dirs_list).ok()
}

fn expand_home(path_str: &str) -> PathBuf {
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path_str)
}

/// Check if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Ok(metadata) = std::fs::metadata(path) {
            return metadata.permissions().mode() & 0o111 != 0;
        }
        false
    }

    #[cfg(not(unix))]
    {
        path.exists()
    }
}
