//! Parsing of encoder log output into progress samples.
//!
//! ffmpeg reports progress on stderr as stat lines such as
//! `frame=  120 fps= 30 q=28.0 size=  512kB time=00:00:05.00 bitrate= 838.9kbits/s speed=1.2x`.
//! Times are handled as integer milliseconds throughout so that
//! [`format_timestamp`] and [`parse_timestamp`] are exact inverses.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

static TIME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=\s*(\S+)").expect("time pattern is valid"));

/// Progress extracted from one log line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Position of the encoder in the output timeline.
    pub processed_ms: u64,
    /// `processed_ms / total`, clamped to `[0, 1]`; `None` when the total is unknown.
    pub ratio: Option<f64>,
}

/// Formats milliseconds as seconds with exactly three decimals (`1200` → `"1.200"`).
pub fn format_timestamp(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Parses `HH:MM:SS.mmm`, `MM:SS.mmm` or `S.mmm` into milliseconds.
///
/// Fractions shorter than three digits are right-padded (`05.5` is 5500ms);
/// digits beyond the millisecond are dropped. Negative or non-numeric input
/// (ffmpeg prints `N/A` before the first frame) yields `None`.
pub fn parse_timestamp(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };

    let parts: Vec<&str> = whole.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut seconds: u64 = 0;
    for part in &parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        seconds = seconds.checked_mul(60)?.checked_add(part.parse().ok()?)?;
    }

    let millis = match fraction {
        None => 0,
        Some(f) if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) => return None,
        Some(f) => {
            let digits: String = f.chars().chain("000".chars()).take(3).collect();
            digits.parse::<u64>().ok()?
        }
    };

    seconds.checked_mul(1000)?.checked_add(millis)
}

/// Extracts a progress sample from a log line carrying a `time=` token.
pub fn parse_progress(line: &str, total_duration_ms: Option<u64>) -> Option<ProgressSample> {
    let captures = TIME_REGEX.captures(line)?;
    let processed_ms = parse_timestamp(captures.get(1)?.as_str())?;

    let ratio = match total_duration_ms {
        Some(total) if total > 0 => Some((processed_ms as f64 / total as f64).clamp(0.0, 1.0)),
        _ => None,
    };

    Some(ProgressSample {
        processed_ms,
        ratio,
    })
}

/// Keeps task progress monotonic over a stream of samples.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_duration_ms: Option<u64>,
    processed_ms: u64,
    progress: f64,
}

impl ProgressTracker {
    pub fn new(total_duration_ms: Option<u64>) -> Self {
        Self {
            total_duration_ms,
            processed_ms: 0,
            progress: 0.0,
        }
    }

    /// Feeds a log line; returns the new `(processed_ms, progress)` if it moved forward.
    pub fn observe(&mut self, line: &str) -> Option<(u64, f64)> {
        let sample = parse_progress(line, self.total_duration_ms)?;
        if sample.processed_ms <= self.processed_ms {
            return None;
        }
        self.processed_ms = sample.processed_ms;
        if let Some(ratio) = sample.ratio {
            self.progress = self.progress.max(ratio);
        }
        Some((self.processed_ms, self.progress))
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }
}
