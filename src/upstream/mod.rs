pub mod client;
pub mod window;

pub use client::{FetchOutcome, Token, UpstreamClient, UpstreamError};
pub use window::{compute_window, Window};
