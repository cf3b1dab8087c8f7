use crate::checkpoint::watermark::{floor_to_minute, Watermark};
use chrono::{DateTime, Utc};

/// `[start, end)` range queried from the upstream API in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Watermark,
    pub end: Watermark,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Divide into `parts` contiguous sub-windows of (nearly) equal length.
    /// The first starts at `start`, the last ends at `end`, and each one
    /// begins where the previous ended.
    pub fn split(&self, parts: usize) -> Vec<Window> {
        let span_ms = (self.end.as_datetime() - self.start.as_datetime()).num_milliseconds();
        let parts = parts.max(1).min(span_ms.max(1) as usize);
        if parts == 1 {
            return vec![*self];
        }

        let step = span_ms / parts as i64;
        let mut windows = Vec::with_capacity(parts);
        let mut start = self.start;
        for i in 0..parts {
            let end = if i + 1 == parts {
                self.end
            } else {
                start.plus_millis(step)
            };
            windows.push(Window { start, end });
            start = end;
        }
        windows
    }
}

/// Compute the poll window for a run.
///
/// `end` is `now` floored to the minute minus the fetch delay. `start` is the
/// checkpoint when present, otherwise the floored `now` minus the look-back.
/// `start` never exceeds `end`; a checkpoint ahead of `end` yields an empty
/// window at `end`.
pub fn compute_window(
    now: DateTime<Utc>,
    fetch_delay_minutes: u32,
    look_back_days: u32,
    checkpoint: Option<Watermark>,
) -> Window {
    let floored = floor_to_minute(now);
    let end = Watermark::new(floored - chrono::Duration::minutes(i64::from(fetch_delay_minutes)));
    let start = checkpoint.unwrap_or_else(|| {
        Watermark::new(floored - chrono::Duration::days(i64::from(look_back_days)))
    });

    if start > end {
        tracing::warn!(
            start = %start,
            end = %end,
            "Checkpoint is ahead of the window end, nothing to fetch this run"
        );
        return Window { start: end, end };
    }

    Window { start, end }
}
