//! Audio/video transcode adapter
//!
//! Shim over an external ffmpeg binary. Input bytes are staged into a
//! scoped temp directory, ffmpeg runs as a child process with kill-on-drop
//! so an engine timeout reclaims it, and the temp directory is released on
//! every exit path when the guard drops.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::process::Stdio;

use transmute_core::models::Quality;
use transmute_core::Format;

use crate::converter::{format_set, ConvertError, ConvertRequest, Converter};

const VIDEO_FORMATS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv", "mpg", "m4v", "gif"];
const AUDIO_FORMATS: &[&str] = &["mp3", "wav", "aac", "flac", "ogg", "opus", "m4a"];

/// Cap on captured stderr carried into error messages.
const MAX_STDERR_BYTES: usize = 2048;

pub struct FfmpegConverter {
    ffmpeg_path: String,
}

impl FfmpegConverter {
    /// Build without probing the binary. Conversions fail at run time if
    /// ffmpeg is absent.
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Probe the ffmpeg binary and return the converter only when it runs.
    /// Called once at startup so the registry never advertises pairs this
    /// host cannot service.
    pub fn detect(ffmpeg_path: &str) -> Option<Self> {
        let works = std::process::Command::new(ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if works {
            Some(Self::new(ffmpeg_path))
        } else {
            tracing::warn!(
                ffmpeg_path,
                "ffmpeg not found or not runnable; audio/video conversion disabled"
            );
            None
        }
    }

    fn is_audio(format: &Format) -> bool {
        AUDIO_FORMATS.contains(&format.as_str())
    }

    fn is_video(format: &Format) -> bool {
        VIDEO_FORMATS.contains(&format.as_str())
    }

    fn quality_args(quality: Option<Quality>, output: &Format) -> Vec<String> {
        if !Self::is_video(output) {
            return Vec::new();
        }
        let (crf, preset) = match quality.unwrap_or_default() {
            Quality::High => ("18", "slow"),
            Quality::Medium => ("23", "medium"),
            Quality::Low => ("28", "fast"),
        };
        vec![
            "-crf".to_string(),
            crf.to_string(),
            "-preset".to_string(),
            preset.to_string(),
        ]
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn inputs(&self) -> BTreeSet<Format> {
        let mut inputs = format_set(VIDEO_FORMATS);
        inputs.extend(format_set(AUDIO_FORMATS));
        inputs
    }

    fn compatible_outputs(&self, input: &Format) -> BTreeSet<Format> {
        // Audio sources can only become other audio formats; video sources
        // can become any video format or have their audio track extracted.
        let mut outputs = if Self::is_audio(input) {
            format_set(AUDIO_FORMATS)
        } else if Self::is_video(input) {
            let mut all = format_set(VIDEO_FORMATS);
            all.extend(format_set(AUDIO_FORMATS));
            all
        } else {
            return BTreeSet::new();
        };
        outputs.remove(input);
        outputs
    }

    async fn convert(
        &self,
        data: &[u8],
        request: &ConvertRequest,
    ) -> Result<Vec<u8>, ConvertError> {
        if Self::is_audio(&request.input) && Self::is_video(&request.output) {
            return Err(ConvertError::Unsupported {
                converter: "ffmpeg",
                input: request.input.to_string(),
                output: request.output.to_string(),
            });
        }

        // Temp directory scopes both staged files; dropped on every exit path.
        let dir = tempfile::tempdir()?;
        let input_path = dir.path().join(format!("input.{}", request.input));
        let output_path = dir.path().join(format!("output.{}", request.output));

        tokio::fs::write(&input_path, data).await?;

        let mut command = tokio::process::Command::new(&self.ffmpeg_path);
        command
            .arg("-y")
            .arg("-i")
            .arg(&input_path)
            .args(Self::quality_args(request.params.quality, &request.output))
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            input = %request.input,
            output = %request.output,
            "Spawning ffmpeg"
        );

        let result = command
            .output()
            .await
            .map_err(|e| ConvertError::Failed(format!("Failed to spawn ffmpeg: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: String = stderr
                .chars()
                .rev()
                .take(MAX_STDERR_BYTES)
                .collect::<String>()
                .chars()
                .rev()
                .collect();
            return Err(ConvertError::CorruptInput(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                tail.trim()
            )));
        }

        let output = tokio::fs::read(&output_path)
            .await
            .map_err(|e| ConvertError::Failed(format!("ffmpeg produced no output: {}", e)))?;

        if output.is_empty() {
            return Err(ConvertError::Failed(
                "ffmpeg produced an empty output file".to_string(),
            ));
        }

        Ok(output)
    }
}
