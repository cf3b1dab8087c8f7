use super::client::{DeliveryOutcome, LogAnalyticsClient};
use crate::checkpoint::{CheckpointError, Watermark, WatermarkTracker};
use crate::event::{max_timestamp, AnomalyEvent};
use std::sync::Arc;

/// Result of shipping one fetched batch.
#[derive(Debug, Clone, Default)]
pub struct ShipReport {
    pub outcome: DeliveryOutcome,
    pub chunks: usize,
    /// Highest watermark such that every event before it was delivered.
    pub committed: Option<Watermark>,
}

impl ShipReport {
    pub fn is_complete(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Delivers batches to the sink and moves the checkpoint behind them.
///
/// With a tracker attached, every successfully delivered chunk advances the
/// persisted watermark immediately, so a crash resumes after the last chunk
/// that made it. Without one, the committed point is only reported.
pub struct BatchShipper {
    client: LogAnalyticsClient,
    tracker: Option<Arc<WatermarkTracker>>,
    open_tail: bool,
}

impl BatchShipper {
    pub fn new(client: LogAnalyticsClient, tracker: Option<Arc<WatermarkTracker>>) -> Self {
        Self {
            client,
            tracker,
            open_tail: false,
        }
    }

    /// Mark the batch as possibly continuing past its last event (a
    /// truncated fetch). The final commit then stays on the last timestamp
    /// instead of stepping past it.
    pub fn open_tail(mut self, open_tail: bool) -> Self {
        self.open_tail = open_tail;
        self
    }

    /// Ship the whole batch as one request.
    pub async fn ship_single(&self, records: &[AnomalyEvent]) -> Result<ShipReport, CheckpointError> {
        let outcome = self.client.post_batch(records).await;
        let mut report = ShipReport {
            outcome,
            chunks: 1,
            committed: None,
        };

        if outcome.is_success() {
            if let Some(commit) = chunk_commit_point(records, None, self.open_tail) {
                self.commit(commit).await?;
                report.committed = Some(commit);
            }
        }

        Ok(report)
    }

    /// Ship `sorted` in order as slices of at most `chunk_size` records.
    ///
    /// A failed chunk does not stop the remaining ones, but freezes the
    /// committed watermark for the rest of the batch.
    pub async fn ship_chunked(
        &self,
        sorted: &[AnomalyEvent],
        chunk_size: usize,
    ) -> Result<ShipReport, CheckpointError> {
        let chunks = split_chunks(sorted, chunk_size);
        tracing::info!(events = sorted.len(), chunks = chunks.len(), chunk_size, "Entered chunked mode");

        let mut report = ShipReport {
            chunks: chunks.len(),
            ..Default::default()
        };
        let mut frozen = false;

        for (index, chunk) in chunks.iter().enumerate() {
            tracing::debug!(chunk = index + 1, events = chunk.len(), "Shipping chunk");
            let outcome = self.client.post_batch(chunk).await;
            report.outcome.merge(outcome);

            if !outcome.is_success() {
                if !frozen {
                    tracing::warn!(
                        chunk = index + 1,
                        committed = ?report.committed.map(|w| w.to_string()),
                        "Chunk failed, checkpoint held for the rest of this run"
                    );
                }
                frozen = true;
                continue;
            }
            if frozen {
                continue;
            }

            let next = chunks.get(index + 1).and_then(|c| c.first());
            if let Some(commit) = chunk_commit_point(chunk, next, self.open_tail) {
                self.commit(commit).await?;
                report.committed = Some(commit);
            }
        }

        Ok(report)
    }

    async fn commit(&self, watermark: Watermark) -> Result<(), CheckpointError> {
        if let Some(tracker) = &self.tracker {
            tracker.advance(watermark).await?;
        }
        Ok(())
    }
}

/// Contiguous slices of at most `chunk_size` items; `ceil(n / chunk_size)`
/// slices whose concatenation is `items`.
pub fn split_chunks<T>(items: &[T], chunk_size: usize) -> Vec<&[T]> {
    items.chunks(chunk_size.max(1)).collect()
}

/// Watermark to persist once `chunk` is delivered.
///
/// Normally the chunk's newest timestamp plus one millisecond. When the next
/// chunk starts at that same timestamp the boundary events are split across
/// requests, so the watermark stays on the timestamp and those events are
/// fetched again if the next chunk is lost. The same holds for the last
/// chunk of an open-tailed batch.
fn chunk_commit_point(
    chunk: &[AnomalyEvent],
    next: Option<&AnomalyEvent>,
    open_tail: bool,
) -> Option<Watermark> {
    let max = max_timestamp(chunk)?;
    let next_ts = next.and_then(AnomalyEvent::timestamp);
    let shares_boundary = match next {
        Some(_) => next_ts.map_or(false, |ts| ts <= max),
        None => open_tail,
    };

    if shares_boundary {
        Some(max)
    } else {
        Some(max.plus_millis(1))
    }
}
