//! FFmpeg Runner Module
//!
//! Shared handle to a detected FFmpeg installation plus FFprobe media probing.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FFmpegError, FFmpegInfo, FFmpegResult};
use crate::core::process::tool_command;

/// Media information extracted by FFprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration_sec: f64,
    /// Video stream info (if present)
    pub video: Option<VideoStreamInfo>,
    /// Audio stream info (if present)
    pub audio: Option<AudioStreamInfo>,
    /// Container format
    pub format: String,
    /// File size in bytes
    pub size_bytes: u64,
}

/// Video stream information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate (frames per second)
    pub fps: f64,
    pub codec: String,
    pub pixel_format: String,
    /// Stream duration when reported separately from the container
    pub duration_sec: Option<f64>,
}

/// Audio stream information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u8,
    pub codec: String,
    pub duration_sec: Option<f64>,
}

/// FFmpeg runner bound to one installation
#[derive(Debug, Clone)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
}

impl FFmpegRunner {
    /// Create a new FFmpegRunner from detected FFmpeg installation
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    /// Get the FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.info.ffmpeg_path
    }

    /// Probe media file to get information
    pub async fn probe(&self, input: &Path) -> FFmpegResult<MediaInfo> {
        if !input.is_file() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        let output = tool_command(&self.info.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(input)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ProbeError(format!(
                "FFprobe failed on {}: {}",
                input.display(),
                stderr.trim()
            )));
        }

        let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            "Probed {}: {:.3}s ({})",
            input.display(),
            info.duration_sec,
            info.format
        );
        Ok(info)
    }
}

/// Parse FFprobe JSON output
pub(crate) fn parse_probe_output(json_str: &str) -> FFmpegResult<MediaInfo> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to parse FFprobe output: {}", e)))?;

    let format = json
        .get("format")
        .ok_or_else(|| FFmpegError::ParseError("Missing format info".to_string()))?;

    let size_bytes = format
        .get("size")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let format_name = format
        .get("format_name")
        .and_then(|f| f.as_str())
        .unwrap_or("unknown")
        .to_string();

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let mut video_info: Option<VideoStreamInfo> = None;
    let mut audio_info: Option<AudioStreamInfo> = None;

    for stream in &streams {
        match stream.get("codec_type").and_then(|c| c.as_str()) {
            Some("video") if video_info.is_none() => video_info = Some(parse_video_stream(stream)),
            Some("audio") if audio_info.is_none() => audio_info = Some(parse_audio_stream(stream)),
            _ => {}
        }
    }

    // Container duration first, then the longest stream duration
    let duration_sec = parse_seconds(format.get("duration"))
        .or_else(|| {
            let video = video_info.as_ref().and_then(|v| v.duration_sec);
            let audio = audio_info.as_ref().and_then(|a| a.duration_sec);
            match (video, audio) {
                (Some(v), Some(a)) => Some(v.max(a)),
                (v, a) => v.or(a),
            }
        })
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration_sec,
        video: video_info,
        audio: audio_info,
        format: format_name,
        size_bytes,
    })
}

/// FFprobe reports numbers as strings ("10.5"); "N/A" means unknown.
fn parse_seconds(value: Option<&serde_json::Value>) -> Option<f64> {
    value
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

fn parse_video_stream(stream: &serde_json::Value) -> VideoStreamInfo {
    let width = stream.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;

    // r_frame_rate is "30/1" or "30000/1001"
    let fps = stream
        .get("r_frame_rate")
        .and_then(|f| f.as_str())
        .and_then(|s| match s.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num.parse().ok()?;
                let den: f64 = den.parse().ok()?;
                (den > 0.0).then(|| num / den)
            }
            None => s.parse().ok(),
        })
        .unwrap_or(30.0);

    VideoStreamInfo {
        width,
        height,
        fps,
        codec: string_field(stream, "codec_name"),
        pixel_format: string_field(stream, "pix_fmt"),
        duration_sec: parse_seconds(stream.get("duration")),
    }
}

fn parse_audio_stream(stream: &serde_json::Value) -> AudioStreamInfo {
    let sample_rate = stream
        .get("sample_rate")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(44100);

    let channels = stream.get("channels").and_then(|c| c.as_u64()).unwrap_or(2) as u8;

    AudioStreamInfo {
        sample_rate,
        channels,
        codec: string_field(stream, "codec_name"),
        duration_sec: parse_seconds(stream.get("duration")),
    }
}

fn string_field(stream: &serde_json::Value, key: &str) -> String {
    stream
        .get(key)
        .and_then(|c| c.as_str())
        .unwrap_or("unknown")
        .to_string()
}
