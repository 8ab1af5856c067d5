//! SRT export and import for caption timelines.
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:00,900
//! A B C
//!
//! 2
//! 00:00:02,000 --> 00:00:02,600
//! D
//! ```

use thiserror::Error;

use super::models::CaptionBlock;
use crate::core::TimeSec;

/// Errors that can occur during SRT parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Unexpected end of input")]
    UnexpectedEnd,
}

/// Parses SRT content into caption blocks, reindexed 1..N in file order.
pub fn parse_srt(content: &str) -> Result<Vec<CaptionBlock>, ParseError> {
    let content = content.trim_start_matches('\u{feff}');
    let mut blocks = Vec::new();
    let mut lines = content.lines().peekable();

    loop {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        let Some(first) = lines.next() else {
            break;
        };

        // The sequence number is optional in the wild
        let timestamp_line = if first.contains("-->") {
            first
        } else {
            lines.next().ok_or(ParseError::UnexpectedEnd)?
        };
        let (start, end) = parse_timestamp_line(timestamp_line)?;

        let mut text_lines = Vec::new();
        while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
            text_lines.push(line.trim_end());
        }
        if text_lines.is_empty() {
            return Err(ParseError::MissingData(format!(
                "caption text after '{}'",
                timestamp_line.trim()
            )));
        }

        blocks.push(CaptionBlock::new(
            blocks.len() + 1,
            start,
            end,
            text_lines.join("\n"),
        ));
    }

    Ok(blocks)
}

fn parse_timestamp_line(line: &str) -> Result<(TimeSec, TimeSec), ParseError> {
    let (start, end) = line.split_once("-->").ok_or_else(|| {
        ParseError::InvalidFormat(format!("Expected 'start --> end' format: {}", line))
    })?;
    Ok((parse_timestamp(start.trim())?, parse_timestamp(end.trim())?))
}

/// Parses `HH:MM:SS,mmm` (or `.mmm`) into seconds
fn parse_timestamp(ts: &str) -> Result<TimeSec, ParseError> {
    let invalid = || ParseError::InvalidTimestamp(ts.to_string());
    let normalized = ts.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(invalid());
    };

    let hours: f64 = hours.parse().map_err(|_| invalid())?;
    let minutes: f64 = minutes.parse().map_err(|_| invalid())?;
    let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
    if hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return Err(invalid());
    }

    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Exports caption blocks to SRT.
pub fn export_srt(blocks: &[CaptionBlock]) -> String {
    let mut output = String::new();

    for (i, block) in blocks.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(block.start),
            format_srt_timestamp(block.end)
        ));
        output.push_str(&block.text);
        output.push_str("\n\n");
    }

    output
}

/// Formats seconds as SRT timestamp (00:00:00,000)
pub fn format_srt_timestamp(seconds: TimeSec) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}
