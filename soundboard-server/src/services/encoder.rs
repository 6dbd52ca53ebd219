//! External audio encoder
//!
//! The pipeline only sees the `AudioEncoder` trait: take an input file, write a
//! canonical MP3 to the output path with a single `title` tag. `FfmpegEncoder` is the
//! production implementation; tests plug in scripted encoders.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Output bitrate for re-encoded uploads
pub const TARGET_BITRATE: &str = "192k";
/// Output channel count
pub const TARGET_CHANNELS: u8 = 2;
/// Output sample rate (Hz)
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Keep this many bytes of encoder stderr in error messages
const STDERR_TAIL_BYTES: usize = 600;

/// How the encoder treats the audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    /// Input is already MP3: copy the stream, rewrite tags only
    StripMetadata,
    /// Decode and re-encode to the target MP3 profile
    Transcode,
}

/// One encoder invocation
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Sole metadata tag written to the output
    pub title: String,
    pub mode: EncodeMode,
}

impl EncodeRequest {
    /// ffmpeg arguments for this request
    ///
    /// All input metadata and chapters are dropped, only the first audio stream is
    /// kept, and only an ID3v2 `title` frame is written (no ID3v1 trailer). The output
    /// format is forced because the output path has no `.mp3` extension.
    pub fn ffmpeg_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(self.input.clone().into_os_string());
        args.extend(
            ["-map", "0:a:0", "-map_metadata", "-1", "-map_chapters", "-1"]
                .into_iter()
                .map(OsString::from),
        );

        match self.mode {
            EncodeMode::StripMetadata => {
                args.extend(["-c:a", "copy"].into_iter().map(OsString::from));
            }
            EncodeMode::Transcode => {
                let channels = TARGET_CHANNELS.to_string();
                let sample_rate = TARGET_SAMPLE_RATE.to_string();
                args.extend(
                    [
                        "-c:a",
                        "libmp3lame",
                        "-b:a",
                        TARGET_BITRATE,
                        "-ac",
                        channels.as_str(),
                        "-ar",
                        sample_rate.as_str(),
                    ]
                    .into_iter()
                    .map(OsString::from),
                );
            }
        }

        let title = format!("title={}", self.title);
        args.extend(
            [
                "-metadata",
                title.as_str(),
                "-id3v2_version",
                "3",
                "-write_id3v1",
                "0",
                "-f",
                "mp3",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(self.output.clone().into_os_string());

        args
    }
}

/// Encoder errors
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Encoder executable could not be found
    #[error("Encoder not installed: {0}")]
    NotInstalled(String),

    /// Encoder process could not be started
    #[error("Failed to start encoder: {0}")]
    Spawn(#[source] std::io::Error),

    /// Encoder exited unsuccessfully
    #[error("Encoder exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    /// Encoder ran past the configured limit and was killed
    #[error("Encoder timed out after {0:?}")]
    TimedOut(Duration),
}

/// Produces a canonical MP3 from an input file
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    /// Encoder name for logging
    fn name(&self) -> &'static str;

    /// Run to completion (success or error)
    ///
    /// Success only means the encoder reported success; callers verify the output.
    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncoderError>;
}

/// ffmpeg subprocess encoder
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: String,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Check if the encoder binary runs
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .is_ok_and(|output| output.status.success())
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncoderError> {
        tracing::debug!(
            input = %request.input.display(),
            output = %request.output.display(),
            mode = ?request.mode,
            "Running ffmpeg"
        );

        let mut command = Command::new(&self.binary);
        command
            .args(request.ffmpeg_args())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Dropping the output future on timeout kills the child (kill_on_drop)
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| EncoderError::TimedOut(self.timeout))?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EncoderError::NotInstalled(self.binary.clone()),
                _ => EncoderError::Spawn(e),
            })?;

        if !output.status.success() {
            return Err(EncoderError::Failed {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(())
    }
}

/// Last few hundred bytes of stderr, where ffmpeg puts the actual error
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();

    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }

    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: EncodeMode) -> EncodeRequest {
        EncodeRequest {
            input: PathBuf::from("/tmp/upload-1.wav"),
            output: PathBuf::from("/srv/sfx/.upload-1.part"),
            title: "Air Horn".to_string(),
            mode,
        }
    }

    fn args_as_strings(req: &EncodeRequest) -> Vec<String> {
        req.ffmpeg_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_transcode_args_use_target_profile() {
        let args = args_as_strings(&request(EncodeMode::Transcode));
        let joined = args.join(" ");

        assert!(joined.contains("-c:a libmp3lame -b:a 192k -ac 2 -ar 44100"));
        assert!(joined.contains("-map_metadata -1"));
        assert!(joined.contains("-write_id3v1 0"));
        assert_eq!(args.last().unwrap(), "/srv/sfx/.upload-1.part");
    }

    #[test]
    fn test_strip_args_copy_stream() {
        let args = args_as_strings(&request(EncodeMode::StripMetadata));
        let joined = args.join(" ");

        assert!(joined.contains("-c:a copy"));
        assert!(!joined.contains("libmp3lame"));
        assert!(args.contains(&"title=Air Horn".to_string()));
        assert!(joined.contains("-f mp3"));
    }

    #[test]
    fn test_stderr_tail_truncates() {
        let long = "x".repeat(2000);
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.starts_with("..."));
        assert_eq!(tail.len(), STDERR_TAIL_BYTES + 3);

        assert_eq!(stderr_tail(b"  short  \n"), "short");
    }

    #[tokio::test]
    async fn test_missing_binary_reports_not_installed() {
        let encoder = FfmpegEncoder::new("definitely-not-a-real-encoder-binary", Duration::from_secs(5));

        assert!(!encoder.is_available().await);
        assert!(matches!(
            encoder.encode(&request(EncodeMode::Transcode)).await,
            Err(EncoderError::NotInstalled(_))
        ));
    }
}
