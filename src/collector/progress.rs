//! Run progress reporting

use chrono::{DateTime, TimeDelta, Utc};
use tracing::info;

/// Tracks how far through `start..end` the feed has moved
pub struct Progress {
    start: u64,
    end: u64,
    started_at: DateTime<Utc>,
    last_percent: Option<u64>,
}

impl Progress {
    pub fn new(start: u64, end: u64) -> Self {
        Self::starting_at(start, end, Utc::now())
    }

    fn starting_at(start: u64, end: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            started_at,
            last_percent: None,
        }
    }

    /// Whole percent of the span covered once `seq` is reached, clamped to 0..=100
    pub fn percent(&self, seq: u64) -> u64 {
        let total = self.end.saturating_sub(self.start);
        if total == 0 {
            return 100;
        }
        let done = seq.saturating_sub(self.start).min(total);
        done * 100 / total
    }

    /// Log progress when the whole-percent value changes
    pub fn update(&mut self, seq: u64) {
        let percent = self.percent(seq);
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);

        let eta = self
            .eta(seq, Utc::now())
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string());
        info!(
            "Progress {}% | sequence {}/{} | ETA: {}",
            percent, seq, self.end, eta
        );
    }

    /// Remaining time extrapolated from the rate so far
    fn eta(&self, seq: u64, now: DateTime<Utc>) -> Option<TimeDelta> {
        let done = seq.saturating_sub(self.start);
        if done == 0 {
            return None;
        }
        let remaining = self.end.saturating_sub(seq.max(self.start));
        let elapsed_ms = (now - self.started_at).num_milliseconds().max(0);
        let remaining_ms = (elapsed_ms as f64 * remaining as f64 / done as f64).round() as i64;
        Some(TimeDelta::milliseconds(remaining_ms))
    }
}

/// `1h02m03s` style rendering
fn format_duration(duration: TimeDelta) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
    if hours > 0 {
        format!("{}h{:02}m{:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
