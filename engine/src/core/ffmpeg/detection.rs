//! FFmpeg Detection Module
//!
//! Handles detection and validation of FFmpeg/FFprobe binaries.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use super::{FFmpegError, FFmpegResult};
use crate::core::config::RendererSettings;
use crate::core::process::configure_std_command;

/// Information about detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
    /// Whether the paths came from configuration
    pub is_explicit: bool,
}

#[cfg(target_os = "windows")]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(target_os = "windows"))]
const FFMPEG_BINARY: &str = "ffmpeg";

#[cfg(target_os = "windows")]
const FFPROBE_BINARY: &str = "ffprobe.exe";
#[cfg(not(target_os = "windows"))]
const FFPROBE_BINARY: &str = "ffprobe";

/// Detect FFmpeg honoring explicit paths from configuration.
///
/// An explicit ffmpeg path without an ffprobe path looks for ffprobe next to it
/// before searching the system.
pub fn detect_ffmpeg(settings: &RendererSettings) -> FFmpegResult<FFmpegInfo> {
    let Some(ffmpeg_path) = settings.ffmpeg_path.clone() else {
        return detect_system_ffmpeg();
    };
    if !ffmpeg_path.is_file() {
        return Err(FFmpegError::InvalidInput(format!(
            "configured ffmpeg not found: {}",
            ffmpeg_path.display()
        )));
    }

    let ffprobe_path = match settings.ffprobe_path.clone() {
        Some(path) => path,
        None => ffmpeg_path
            .parent()
            .map(|dir| dir.join(FFPROBE_BINARY))
            .filter(|p| p.is_file())
            .map(Ok)
            .unwrap_or_else(|| which_binary(FFPROBE_BINARY))?,
    };

    let version = get_ffmpeg_version(&ffmpeg_path)?;
    info!("Using configured FFmpeg {} at {}", version, ffmpeg_path.display());
    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
        is_explicit: true,
    })
}

/// Detect FFmpeg from system PATH
///
/// Searches common install locations, then the system PATH.
pub fn detect_system_ffmpeg() -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = which_binary(FFMPEG_BINARY)?;
    let ffprobe_path = which_binary(FFPROBE_BINARY)?;
    let version = get_ffmpeg_version(&ffmpeg_path)?;
    debug!("Detected system FFmpeg {} at {}", version, ffmpeg_path.display());

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
        is_explicit: false,
    })
}

/// Find a binary in common locations, then PATH via `where`/`which`
fn which_binary(binary_name: &str) -> FFmpegResult<PathBuf> {
    for dir in get_common_ffmpeg_paths() {
        let candidate = dir.join(binary_name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    #[cfg(target_os = "windows")]
    let locator = "where";
    #[cfg(not(target_os = "windows"))]
    let locator = "which";

    let mut cmd = Command::new(locator);
    configure_std_command(&mut cmd);
    let output = cmd
        .arg(binary_name.trim_end_matches(".exe"))
        .output()
        .map_err(|_| FFmpegError::NotFound)?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = path_str.lines().map(str::trim).find(|l| !l.is_empty()) {
            return Ok(PathBuf::from(first_line));
        }
    }

    Err(FFmpegError::NotFound)
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin"));
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string
fn get_ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let mut cmd = Command::new(ffmpeg_path);
    configure_std_command(&mut cmd);
    let output = cmd.arg("-version").output()?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the first line of `ffmpeg -version` ("ffmpeg version X.Y ...")
fn parse_version_output(output: &str) -> FFmpegResult<String> {
    let first_line = output
        .lines()
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| FFmpegError::ParseError("Could not parse FFmpeg version".to_string()))?;

    Ok(first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or(first_line)
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_common_paths_not_empty() {
        assert!(!get_common_ffmpeg_paths().is_empty());
    }

    #[test]
    fn test_parse_version_output() {
        assert_eq!(
            parse_version_output("ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023\n")
                .unwrap(),
            "6.1.1-3ubuntu5"
        );
        assert_eq!(parse_version_output("custom build\n").unwrap(), "custom build");
        assert!(parse_version_output("").is_err());
    }

    #[test]
    fn test_missing_configured_ffmpeg_is_rejected() {
        let dir = TempDir::new().unwrap();
        let settings = RendererSettings {
            ffmpeg_path: Some(dir.path().join("ffmpeg")),
            ..Default::default()
        };
        assert!(matches!(
            detect_ffmpeg(&settings),
            Err(FFmpegError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_detect_system_ffmpeg() {
        // Passes whether or not FFmpeg is installed
        if let Ok(info) = detect_system_ffmpeg() {
            assert!(!info.version.is_empty());
            assert!(!info.is_explicit);
        }
    }
}
