pub mod orchestrator;
pub mod report;
pub mod unit;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::sink::SinkError;
use crate::upstream::UpstreamError;
use std::time::Duration;
use thiserror::Error;

pub use orchestrator::{Orchestrator, RunContext};
pub use report::{choose_route, FetchStatus, Route, RunPhase, RunReport, UnitReport};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("worker pool closed")]
    PoolClosed,

    #[error("run exceeded its timeout of {0:?}")]
    Timeout(Duration),
}
