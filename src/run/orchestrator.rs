use super::report::{RunPhase, RunReport, UnitReport};
use super::unit::RunUnit;
use super::RunError;
use crate::checkpoint::{open_store, WatermarkTracker};
use crate::config::Config;
use crate::upstream::compute_window;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

/// Everything a run needs, built fresh for each invocation.
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<Config>,
    pub tracker: Arc<WatermarkTracker>,
    pub dry_run: bool,
}

impl RunContext {
    pub fn new(config: Config, tracker: Arc<WatermarkTracker>) -> Self {
        Self {
            config: Arc::new(config),
            tracker,
            dry_run: false,
        }
    }

    /// Open the configured checkpoint backend and wrap it in a tracker.
    pub fn from_config(config: Config) -> Result<Self, RunError> {
        let store = open_store(
            &config.checkpoint.connection,
            &config.checkpoint.share,
            &config.checkpoint.file,
        )?;
        Ok(Self::new(config, Arc::new(WatermarkTracker::new(store))))
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Drives one scheduled invocation: window, fan-out, barrier, checkpoint.
pub struct Orchestrator {
    ctx: RunContext,
}

impl Orchestrator {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) -> Result<RunReport, RunError> {
        self.run_at(Utc::now()).await
    }

    /// Run as if the clock read `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        let timeout = self.ctx.config.run.run_timeout;

        let result = match tokio::time::timeout(timeout, self.execute(run_id, now))
            .instrument(span.clone())
            .await
        {
            Ok(result) => result,
            Err(_) => Err(RunError::Timeout(timeout)),
        };

        if let Err(e) = &result {
            span.in_scope(|| {
                error!(phase = %RunPhase::Failed, error = %e, "Anomaly connector run failed");
            });
        }
        result
    }

    async fn execute(&self, run_id: Uuid, now: DateTime<Utc>) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let run = &self.ctx.config.run;
        debug!(phase = %RunPhase::Init, dry_run = self.ctx.dry_run, "Run phase");
        if let Some(schedule) = &self.ctx.config.schedule {
            debug!(schedule = %schedule, "Invoked by external schedule");
        }

        let checkpoint = self.ctx.tracker.load().await?;
        let window = compute_window(now, run.fetch_delay_minutes, run.past_days, checkpoint);
        info!(
            phase = %RunPhase::WindowComputed,
            start = %window.start,
            end = %window.end,
            fetch_delay_minutes = run.fetch_delay_minutes,
            "Computed poll window"
        );

        let segments = window.split(run.segments);
        let workers = pool_size(run.workers, segments.len());
        debug!(segments = segments.len(), workers, "Dispatching units");

        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for (index, segment) in segments.iter().copied().enumerate() {
            let unit = RunUnit {
                index,
                window: segment,
                config: self.ctx.config.clone(),
                tracker: self.ctx.tracker.clone(),
                live_checkpoint: index == 0,
                dry_run: self.ctx.dry_run,
            };
            let permits = permits.clone();
            tasks.spawn(
                async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| RunError::PoolClosed)?;
                    unit.execute().await
                }
                .in_current_span(),
            );
        }

        let mut units = Vec::with_capacity(segments.len());
        while let Some(joined) = tasks.join_next().await {
            units.push(joined??);
        }
        units.sort_by_key(|u| u.index);

        if !self.ctx.dry_run {
            self.commit_segments(&units).await?;
            debug!(phase = %RunPhase::Checkpointed, "Run phase");
        }

        let watermark = self.ctx.tracker.current().await;
        let report = RunReport::from_units(run_id, window, units, watermark, started.elapsed());

        info!(
            phase = %RunPhase::Done,
            fetched = report.fetched,
            succeeded = report.delivery.succeeded,
            failed = report.delivery.failed,
            chunks = report.chunks,
            watermark = ?report.watermark.map(|w| w.to_string()),
            api_ms = report.api_time.as_millis() as u64,
            sink_ms = report.sink_time.as_millis() as u64,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Total events processed successfully: {}, failed: {}",
            report.delivery.succeeded,
            report.delivery.failed
        );

        Ok(report)
    }

    /// Walk the segments in window order and advance the watermark as far
    /// as the first one that was not fully delivered allows.
    async fn commit_segments(&self, units: &[UnitReport]) -> Result<(), RunError> {
        for unit in units {
            let (limit, continue_past) = unit.commit_limit();
            if let Some(watermark) = limit {
                self.ctx.tracker.advance(watermark).await?;
            }
            if !continue_past {
                if !unit.is_drained() {
                    info!(
                        unit = unit.index,
                        fetch = ?unit.fetch,
                        failed = unit.delivery.failed,
                        "Window not fully delivered, checkpoint held"
                    );
                }
                break;
            }
        }
        Ok(())
    }
}

/// Bounded by the configured worker count, the machine's parallelism and the
/// number of units; never zero.
pub fn pool_size(workers: usize, units: usize) -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    workers.min(parallelism).min(units).max(1)
}
