//! FFmpeg `-progress` output parsing.

use serde::{Deserialize, Serialize};

/// Progress event sent while a render runs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProgress {
    /// Current frame number
    pub frame: u64,
    /// Total frames
    pub total_frames: u64,
    /// Progress percentage (0-100)
    pub percent: f32,
    /// Current encoding FPS
    pub fps: f32,
    /// Encoded media time in seconds
    pub out_time_sec: f64,
    /// Estimated time remaining in seconds
    pub eta_seconds: u64,
    /// Current status message
    pub message: String,
}

impl RenderProgress {
    pub fn started(total_frames: u64) -> Self {
        Self {
            frame: 0,
            total_frames,
            percent: 0.0,
            fps: 0.0,
            out_time_sec: 0.0,
            eta_seconds: 0,
            message: "Starting render...".to_string(),
        }
    }

    pub fn finished(total_frames: u64, duration: f64) -> Self {
        Self {
            frame: total_frames,
            total_frames,
            percent: 100.0,
            fps: 0.0,
            out_time_sec: duration,
            eta_seconds: 0,
            message: "Render complete".to_string(),
        }
    }
}

/// Accumulated key/value state of one progress block
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    pub frame: u64,
    pub fps: f32,
    pub time_sec: f64,
    pub bitrate_kbps: Option<f32>,
    /// Speed multiplier (e.g., 2.5x)
    pub speed: Option<f32>,
    /// Set once FFmpeg reports `progress=end`
    pub ended: bool,
}

/// Parses one `-progress pipe:1` line into `state`.
///
/// Returns true when the line ends a block (`progress=continue|end`).
///
/// ```text
/// frame=100
/// fps=30.0
/// out_time_us=3333333
/// bitrate=1234.5kbits/s
/// speed=2.5x
/// progress=continue
/// ```
pub fn parse_progress_line(line: &str, state: &mut ProgressState) -> bool {
    let Some((key, value)) = line.trim().split_once('=') else {
        return false;
    };
    let value = value.trim();

    match key {
        "frame" => state.frame = value.parse().unwrap_or(state.frame),
        "fps" => state.fps = value.parse().unwrap_or(state.fps),
        // out_time_ms is in microseconds despite the name
        "out_time_us" | "out_time_ms" => {
            if let Ok(micros) = value.parse::<u64>() {
                state.time_sec = micros as f64 / 1_000_000.0;
            }
        }
        "bitrate" => {
            state.bitrate_kbps = value
                .strip_suffix("kbits/s")
                .and_then(|n| n.trim().parse().ok());
        }
        "speed" => {
            state.speed = value.strip_suffix('x').and_then(|n| n.trim().parse().ok());
        }
        "progress" => {
            state.ended = value == "end";
            return true;
        }
        _ => {}
    }
    false
}

/// Converts parsed state into a progress event
pub fn progress_from_state(
    state: &ProgressState,
    total_duration_sec: f64,
    total_frames: u64,
) -> RenderProgress {
    let percent = if total_duration_sec > 0.0 {
        ((state.time_sec / total_duration_sec) * 100.0).clamp(0.0, 100.0) as f32
    } else if total_frames > 0 {
        ((state.frame as f64 / total_frames as f64) * 100.0).min(100.0) as f32
    } else {
        0.0
    };

    let remaining = (total_duration_sec - state.time_sec).max(0.0);
    let eta_seconds = match state.speed {
        Some(speed) if speed > 0.0 => (remaining / speed as f64) as u64,
        _ => 0,
    };

    RenderProgress {
        frame: state.frame,
        total_frames,
        percent,
        fps: state.fps,
        out_time_sec: state.time_sec,
        eta_seconds,
        message: format!("Encoding frame {} ({:.1} fps)", state.frame, state.fps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_and_fps() {
        let mut state = ProgressState::default();
        assert!(!parse_progress_line("frame=100", &mut state));
        assert_eq!(state.frame, 100);
        parse_progress_line("fps=29.97", &mut state);
        assert!((state.fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_time_units() {
        let mut state = ProgressState::default();
        parse_progress_line("out_time_ms=5000000", &mut state);
        assert!((state.time_sec - 5.0).abs() < 1e-9);
        parse_progress_line("out_time_us=30500000", &mut state);
        assert!((state.time_sec - 30.5).abs() < 1e-9);
        // N/A leaves the previous value
        parse_progress_line("out_time_us=N/A", &mut state);
        assert!((state.time_sec - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_bitrate_and_speed() {
        let mut state = ProgressState::default();
        parse_progress_line("bitrate=8500.5kbits/s", &mut state);
        assert!((state.bitrate_kbps.unwrap() - 8500.5).abs() < 0.1);
        parse_progress_line("bitrate=N/A", &mut state);
        assert!(state.bitrate_kbps.is_none());
        parse_progress_line("speed=2.5x", &mut state);
        assert!((state.speed.unwrap() - 2.5).abs() < 0.01);
    }

    #[test]
    fn test_block_boundaries() {
        let mut state = ProgressState::default();
        assert!(parse_progress_line("progress=continue", &mut state));
        assert!(!state.ended);
        assert!(parse_progress_line("progress=end", &mut state));
        assert!(state.ended);
        assert!(!parse_progress_line("garbage", &mut state));
    }

    #[test]
    fn test_progress_percent_and_eta() {
        let state = ProgressState {
            frame: 150,
            fps: 30.0,
            time_sec: 5.0,
            speed: Some(2.0),
            ..Default::default()
        };
        let progress = progress_from_state(&state, 10.0, 300);
        assert!((progress.percent - 50.0).abs() < 0.01);
        assert_eq!(progress.eta_seconds, 2);
        assert_eq!(progress.total_frames, 300);

        let over = ProgressState {
            time_sec: 12.0,
            ..Default::default()
        };
        assert_eq!(progress_from_state(&over, 10.0, 300).percent, 100.0);
    }
}
