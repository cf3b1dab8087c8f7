use super::report::{choose_route, step_past_stalled_page, FetchStatus, Route, RunPhase, UnitReport};
use super::RunError;
use crate::checkpoint::WatermarkTracker;
use crate::config::Config;
use crate::event::{max_timestamp, sort_by_timestamp};
use crate::sink::{BatchShipper, LogAnalyticsClient};
use crate::upstream::{FetchOutcome, UpstreamClient, Window};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One fetch+ship pass over a sub-window.
///
/// Owns its upstream and sink clients; the checkpoint tracker is the only
/// thing shared with other units.
pub struct RunUnit {
    pub index: usize,
    pub window: Window,
    pub config: Arc<Config>,
    pub tracker: Arc<WatermarkTracker>,
    /// Advance the persisted watermark after every delivered chunk.
    pub live_checkpoint: bool,
    pub dry_run: bool,
}

impl RunUnit {
    pub async fn execute(self) -> Result<UnitReport, RunError> {
        let mut report = UnitReport::new(self.index, self.window);
        let config = &self.config;

        if self.window.is_empty() {
            debug!(unit = self.index, start = %self.window.start, "Empty window, nothing to fetch");
            report.fetch = FetchStatus::Fetched;
            return Ok(report);
        }

        let api_start = Instant::now();
        let mut upstream = UpstreamClient::new(&config.upstream)?;
        upstream.authenticate().await?;

        debug!(unit = self.index, phase = %RunPhase::Fetching, "Unit phase");
        let outcome = upstream
            .fetch_events(&config.upstream.event_type, &self.window, config.upstream.max_results)
            .await?;
        report.api_time = api_start.elapsed();

        let (mut events, truncated) = match outcome {
            FetchOutcome::Fetched { events, truncated } => {
                report.fetch = if truncated {
                    FetchStatus::Truncated
                } else {
                    FetchStatus::Fetched
                };
                (events, truncated)
            }
            FetchOutcome::UnsupportedPlan => {
                report.fetch = FetchStatus::UnsupportedPlan;
                warn!(unit = self.index, "Window skipped, report not available for this plan");
                return Ok(report);
            }
            FetchOutcome::Failed { status, message } => {
                report.fetch = FetchStatus::Failed;
                warn!(unit = self.index, status, message = %message, "Window skipped, fetch failed");
                return Ok(report);
            }
        };

        report.fetched = events.len();
        info!(
            unit = self.index,
            events = events.len(),
            api_ms = report.api_time.as_millis() as u64,
            "Fetched anomalies"
        );

        if events.is_empty() {
            return Ok(report);
        }

        let route = choose_route(events.len(), config.run.max_event_count);
        report.route = Some(route);
        debug!(unit = self.index, phase = %RunPhase::Routing(route), "Unit phase");

        if self.dry_run {
            info!(unit = self.index, events = events.len(), route = %route, "Dry run, not delivering");
            return Ok(report);
        }

        sort_by_timestamp(&mut events);
        if let Some(latest) = events.last().and_then(|e| e.raw_timestamp()) {
            debug!(unit = self.index, latest, "Latest event timestamp");
        }

        let sink_start = Instant::now();
        let client = LogAnalyticsClient::new(&config.sink)?;
        let tracker = self.live_checkpoint.then(|| self.tracker.clone());
        let shipper = BatchShipper::new(client, tracker).open_tail(truncated);

        let shipped = match route {
            Route::Single => shipper.ship_single(&events).await?,
            Route::Chunked => shipper.ship_chunked(&events, config.run.chunk_size).await?,
        };
        report.sink_time = sink_start.elapsed();
        report.delivery = shipped.outcome;
        report.chunks = shipped.chunks;
        report.committed = shipped.committed;

        if truncated && shipped.is_complete() {
            report.committed =
                step_past_stalled_page(self.window, shipped.committed, max_timestamp(&events));
        }

        debug!(unit = self.index, phase = %RunPhase::Delivered, "Unit phase");
        info!(
            unit = self.index,
            succeeded = shipped.outcome.succeeded,
            failed = shipped.outcome.failed,
            chunks = shipped.chunks,
            complete = shipped.is_complete(),
            sink_ms = report.sink_time.as_millis() as u64,
            "Delivered anomalies"
        );

        Ok(report)
    }
}
