use crate::checkpoint::Watermark;
use crate::sink::DeliveryOutcome;
use crate::upstream::Window;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// How a fetched batch is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Single,
    Chunked,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Single => write!(f, "single"),
            Route::Chunked => write!(f, "chunked"),
        }
    }
}

/// Batches up to `max_event_count` go out as one request, larger ones in
/// chunks.
pub fn choose_route(event_count: usize, max_event_count: usize) -> Route {
    if event_count <= max_event_count {
        Route::Single
    } else {
        Route::Chunked
    }
}

/// Steps a run moves through; `Failed` can follow any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    WindowComputed,
    Fetching,
    Routing(Route),
    Delivered,
    Checkpointed,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Init => write!(f, "init"),
            RunPhase::WindowComputed => write!(f, "window_computed"),
            RunPhase::Fetching => write!(f, "fetching"),
            RunPhase::Routing(route) => write!(f, "routing({})", route),
            RunPhase::Delivered => write!(f, "delivered"),
            RunPhase::Checkpointed => write!(f, "checkpointed"),
            RunPhase::Done => write!(f, "done"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Fetched,
    /// Fetched, but the response hit `max_results`.
    Truncated,
    UnsupportedPlan,
    Failed,
}

/// What one fetch+ship unit did.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub index: usize,
    pub window: Window,
    pub fetch: FetchStatus,
    pub fetched: usize,
    pub route: Option<Route>,
    pub delivery: DeliveryOutcome,
    pub chunks: usize,
    /// Every event before this watermark was delivered.
    pub committed: Option<Watermark>,
    pub api_time: Duration,
    pub sink_time: Duration,
}

impl UnitReport {
    pub fn new(index: usize, window: Window) -> Self {
        Self {
            index,
            window,
            fetch: FetchStatus::Failed,
            fetched: 0,
            route: None,
            delivery: DeliveryOutcome::default(),
            chunks: 0,
            committed: None,
            api_time: Duration::ZERO,
            sink_time: Duration::ZERO,
        }
    }

    /// The whole window was fetched and every event was delivered.
    pub fn is_drained(&self) -> bool {
        self.fetch == FetchStatus::Fetched && self.delivery.is_success()
    }

    /// How far the watermark may move because of this unit, and whether
    /// later units may move it further.
    pub fn commit_limit(&self) -> (Option<Watermark>, bool) {
        match self.fetch {
            FetchStatus::Fetched | FetchStatus::Truncated if self.is_drained() => {
                (Some(self.window.end), true)
            }
            FetchStatus::Fetched | FetchStatus::Truncated => (self.committed, false),
            FetchStatus::UnsupportedPlan | FetchStatus::Failed => (None, false),
        }
    }
}

/// Commit point for a fully delivered page that hit `max_results`.
///
/// The commit normally holds on the page's newest timestamp so events that
/// share it are fetched again. When that hold cannot move past the window
/// start, the next run would issue the same query and get the same page, so
/// the watermark steps past the newest timestamp instead (or to the window
/// end when the page carries no usable timestamps). Events beyond the cap
/// at that timestamp are skipped; this is logged as an error.
pub fn step_past_stalled_page(
    window: Window,
    committed: Option<Watermark>,
    newest: Option<Watermark>,
) -> Option<Watermark> {
    if committed.map_or(false, |c| c > window.start) {
        return committed;
    }

    let forced = newest
        .map(|ts| ts.plus_millis(1))
        .filter(|next| *next > window.start)
        .unwrap_or(window.end);
    tracing::error!(
        window_start = %window.start,
        newest = ?newest.map(|w| w.to_string()),
        forced = %forced,
        "Capped page cannot advance the checkpoint; stepping past it, events beyond max_results at this timestamp may be skipped"
    );
    Some(forced)
}

/// Aggregate of every unit in a run, merged after the join barrier.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub window: Window,
    pub units: Vec<UnitReport>,
    pub fetched: usize,
    pub delivery: DeliveryOutcome,
    pub chunks: usize,
    pub watermark: Option<Watermark>,
    pub api_time: Duration,
    pub sink_time: Duration,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn from_units(
        run_id: Uuid,
        window: Window,
        units: Vec<UnitReport>,
        watermark: Option<Watermark>,
        elapsed: Duration,
    ) -> Self {
        let mut delivery = DeliveryOutcome::default();
        let mut fetched = 0;
        let mut chunks = 0;
        let mut api_time = Duration::ZERO;
        let mut sink_time = Duration::ZERO;

        for unit in &units {
            delivery.merge(unit.delivery);
            fetched += unit.fetched;
            chunks += unit.chunks;
            api_time += unit.api_time;
            sink_time += unit.sink_time;
        }

        Self {
            run_id,
            window,
            units,
            fetched,
            delivery,
            chunks,
            watermark,
            api_time,
            sink_time,
            elapsed,
        }
    }

    pub fn is_drained(&self) -> bool {
        self.units.iter().all(UnitReport::is_drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window {
            start: Watermark::parse("2024-01-01T00:00:00.000Z").unwrap(),
            end: Watermark::parse("2024-01-01T01:00:00.000Z").unwrap(),
        }
    }

    #[test]
    fn test_route_boundaries() {
        assert_eq!(choose_route(0, 10_000), Route::Single);
        assert_eq!(choose_route(10_000, 10_000), Route::Single);
        assert_eq!(choose_route(10_001, 10_000), Route::Chunked);
        assert_eq!(choose_route(12_000, 10_000), Route::Chunked);
    }

    #[test]
    fn test_commit_limit_for_drained_unit_is_window_end() {
        let mut unit = UnitReport::new(0, window());
        unit.fetch = FetchStatus::Fetched;
        unit.delivery = DeliveryOutcome::accepted(3);
        assert_eq!(unit.commit_limit(), (Some(window().end), true));
    }

    #[test]
    fn test_commit_limit_for_partial_delivery() {
        let committed = Watermark::parse("2024-01-01T00:20:00.001Z").unwrap();
        let mut unit = UnitReport::new(0, window());
        unit.fetch = FetchStatus::Fetched;
        unit.delivery = DeliveryOutcome::rejected(5);
        unit.committed = Some(committed);
        assert_eq!(unit.commit_limit(), (Some(committed), false));
    }

    #[test]
    fn test_commit_limit_for_truncated_fetch() {
        let committed = Watermark::parse("2024-01-01T00:40:00.000Z").unwrap();
        let mut unit = UnitReport::new(0, window());
        unit.fetch = FetchStatus::Truncated;
        unit.delivery = DeliveryOutcome::accepted(100);
        unit.committed = Some(committed);
        assert_eq!(unit.commit_limit(), (Some(committed), false));
    }

    #[test]
    fn test_commit_limit_for_failed_fetch() {
        let mut unit = UnitReport::new(0, window());
        unit.fetch = FetchStatus::UnsupportedPlan;
        assert_eq!(unit.commit_limit(), (None, false));
    }

    #[test]
    fn test_stalled_page_steps_past_shared_timestamp() {
        let start = window().start;
        assert_eq!(
            step_past_stalled_page(window(), Some(start), Some(start)),
            Some(start.plus_millis(1))
        );
    }

    #[test]
    fn test_stalled_page_without_timestamps_jumps_to_window_end() {
        assert_eq!(step_past_stalled_page(window(), None, None), Some(window().end));
    }

    #[test]
    fn test_progressing_page_keeps_its_hold() {
        let held = Watermark::parse("2024-01-01T00:30:00.000Z").unwrap();
        assert_eq!(
            step_past_stalled_page(window(), Some(held), Some(held)),
            Some(held)
        );
    }

    #[test]
    fn test_run_report_sums_units() {
        let mut a = UnitReport::new(0, window());
        a.fetch = FetchStatus::Fetched;
        a.fetched = 10;
        a.chunks = 1;
        a.delivery = DeliveryOutcome::accepted(10);
        let mut b = UnitReport::new(1, window());
        b.fetch = FetchStatus::Fetched;
        b.fetched = 7;
        b.chunks = 1;
        b.delivery = DeliveryOutcome::rejected(7);

        let report = RunReport::from_units(Uuid::new_v4(), window(), vec![a, b], None, Duration::ZERO);
        assert_eq!(report.fetched, 17);
        assert_eq!(report.delivery.succeeded, 10);
        assert_eq!(report.delivery.failed, 7);
        assert_eq!(report.chunks, 2);
        assert!(!report.is_drained());
    }
}
