//! Audio helpers for word alignment.
//!
//! Narration is transcoded to 16kHz mono PCM WAV (the format Whisper consumes) and
//! loaded as normalized `f32` samples. WAV headers also serve as a duration source
//! when ffprobe is unavailable.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::core::process::tool_command;
use crate::core::TimeSec;

/// Sample rate expected by the alignment models
pub const ALIGNMENT_SAMPLE_RATE: u32 = 16_000;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while preparing alignment audio
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("FFmpeg process exited with error: {0}")]
    ProcessError(String),

    #[error("Failed to read WAV file: {0}")]
    Decode(String),

    #[error("Unsupported WAV layout: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

// =============================================================================
// Extraction
// =============================================================================

/// Transcodes any audio/video input into a 16kHz mono 16-bit WAV file.
pub async fn extract_for_alignment(
    ffmpeg_path: &Path,
    input_path: &Path,
    output_path: &Path,
) -> AudioResult<()> {
    if !input_path.is_file() {
        return Err(AudioError::InputNotFound(
            input_path.to_string_lossy().to_string(),
        ));
    }

    let output = tool_command(ffmpeg_path)
        .arg("-hide_banner")
        .arg("-nostdin")
        .arg("-y")
        .arg("-i")
        .arg(input_path)
        .args(["-vn", "-ac", "1", "-ar"])
        .arg(ALIGNMENT_SAMPLE_RATE.to_string())
        .args(["-c:a", "pcm_s16le"])
        .arg(output_path)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AudioError::ProcessError(last_lines(&stderr, 5)));
    }

    debug!(
        "Extracted alignment audio {} -> {}",
        input_path.display(),
        output_path.display()
    );
    Ok(())
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

// =============================================================================
// WAV Reading
// =============================================================================

/// Loads a 16kHz mono WAV file as f32 samples normalized to [-1.0, 1.0].
pub fn load_audio_samples(wav_path: &Path) -> AudioResult<Vec<f32>> {
    let reader = hound::WavReader::open(wav_path)
        .map_err(|e| AudioError::Decode(format!("{}: {}", wav_path.display(), e)))?;
    let spec = reader.spec();

    if spec.sample_rate != ALIGNMENT_SAMPLE_RATE {
        return Err(AudioError::Unsupported(format!(
            "expected 16kHz sample rate, got {} Hz",
            spec.sample_rate
        )));
    }
    if spec.channels != 1 {
        return Err(AudioError::Unsupported(format!(
            "expected mono audio, got {} channels",
            spec.channels
        )));
    }

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / 32768.0)
            .collect(),
        (hound::SampleFormat::Int, 32) => reader
            .into_samples::<i32>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / 2147483648.0)
            .collect(),
        (hound::SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .filter_map(Result::ok)
            .map(|s| s.clamp(-1.0, 1.0))
            .collect(),
        (format, bits) => {
            return Err(AudioError::Unsupported(format!(
                "{:?} samples at {} bits",
                format, bits
            )));
        }
    };

    Ok(samples)
}

/// Duration of a WAV file read from its header
pub fn wav_duration(wav_path: &Path) -> AudioResult<TimeSec> {
    let reader = hound::WavReader::open(wav_path)
        .map_err(|e| AudioError::Decode(format!("{}: {}", wav_path.display(), e)))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(AudioError::Unsupported("zero sample rate".to_string()));
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Writes `seconds` of a quiet sine tone as 16-bit PCM
    pub(crate) fn write_tone(path: &Path, sample_rate: u32, channels: u16, seconds: f64) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (seconds * sample_rate as f64).round() as usize;
        for i in 0..frames {
            let sample = ((i as f32 / 50.0).sin() * 8000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_audio_samples_valid_wav() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("voice.wav");
        write_tone(&wav, 16_000, 1, 0.1);

        let samples = load_audio_samples(&wav).unwrap();
        assert_eq!(samples.len(), 1600);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_load_audio_wrong_sample_rate() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("cd.wav");
        write_tone(&wav, 44_100, 1, 0.01);

        let err = load_audio_samples(&wav).unwrap_err();
        assert!(err.to_string().contains("16kHz"));
    }

    #[test]
    fn test_load_audio_wrong_channels() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("stereo.wav");
        write_tone(&wav, 16_000, 2, 0.01);

        let err = load_audio_samples(&wav).unwrap_err();
        assert!(err.to_string().contains("mono"));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_audio_samples(Path::new("/nonexistent/audio.wav")),
            Err(AudioError::Decode(_))
        ));
    }

    #[test]
    fn test_wav_duration_counts_frames_not_samples() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("stereo.wav");
        write_tone(&wav, 44_100, 2, 1.5);
        let duration = wav_duration(&wav).unwrap();
        assert!((duration - 1.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_extract_input_not_found() {
        let result = extract_for_alignment(
            Path::new("ffmpeg"),
            Path::new("/nonexistent/voice.mp3"),
            Path::new("/tmp/out.wav"),
        )
        .await;
        assert!(matches!(result, Err(AudioError::InputNotFound(_))));
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\n\nb\nc\n", 2), "b\nc");
        assert_eq!(last_lines("", 3), "");
    }
}
