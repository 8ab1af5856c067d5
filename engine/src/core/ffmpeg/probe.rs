//! Media duration probing.
//!
//! FFprobe when an installation is available; WAV header parsing otherwise.

use std::path::Path;

use tracing::{debug, warn};

use super::FFmpegRunner;
use crate::core::captions::audio::wav_duration;
use crate::core::{CoreError, CoreResult, TimeSec};

/// Probes media durations, degrading to WAV headers without FFprobe
#[derive(Debug, Clone, Default)]
pub struct MediaProbe {
    runner: Option<FFmpegRunner>,
}

impl MediaProbe {
    pub fn new(runner: Option<FFmpegRunner>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> Option<&FFmpegRunner> {
        self.runner.as_ref()
    }

    /// Duration of an audio/video file in seconds.
    ///
    /// Errors are [`CoreError::InvalidMedia`] so callers can drop the source.
    pub async fn probe_duration(&self, path: &Path) -> CoreResult<TimeSec> {
        if !path.is_file() {
            return Err(CoreError::invalid_media(path, "file not found"));
        }

        if let Some(runner) = &self.runner {
            match runner.probe(path).await {
                Ok(info) if info.duration_sec > 0.0 => return Ok(info.duration_sec),
                Ok(_) => warn!("FFprobe reported no duration for {}", path.display()),
                Err(e) => warn!("FFprobe failed for {}: {}", path.display(), e),
            }
        }

        let is_wav = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if !is_wav {
            return Err(CoreError::invalid_media(
                path,
                "duration unknown (ffprobe unavailable and not a WAV file)",
            ));
        }

        let duration = wav_duration(path).map_err(|e| CoreError::invalid_media(path, e))?;
        if duration <= 0.0 {
            return Err(CoreError::invalid_media(path, "empty audio"));
        }
        debug!("WAV header duration for {}: {:.3}s", path.display(), duration);
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::audio::tests::write_tone;
    use tempfile::TempDir;

    #[tokio::test]
    async fn wav_fallback_without_ffprobe() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("voice.wav");
        write_tone(&wav, 22_050, 1, 2.0);

        let duration = MediaProbe::default().probe_duration(&wav).await.unwrap();
        assert!((duration - 2.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn missing_file_is_invalid_media() {
        let err = MediaProbe::default()
            .probe_duration(Path::new("/nonexistent/voice.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidMedia { .. }));
    }

    #[tokio::test]
    async fn non_wav_without_ffprobe_is_invalid_media() {
        let dir = TempDir::new().unwrap();
        let mp3 = dir.path().join("voice.mp3");
        std::fs::write(&mp3, b"ID3").unwrap();
        let err = MediaProbe::default().probe_duration(&mp3).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidMedia { .. }));
    }

    #[tokio::test]
    async fn zero_length_wav_is_invalid_media() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("empty.wav");
        write_tone(&wav, 16_000, 1, 0.0);
        assert!(MediaProbe::default().probe_duration(&wav).await.is_err());
    }
}
