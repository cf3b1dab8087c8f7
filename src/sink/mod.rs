pub mod client;
pub mod shipper;
pub mod signature;

pub use client::{DeliveryOutcome, LogAnalyticsClient, SinkError};
pub use shipper::{split_chunks, BatchShipper, ShipReport};
pub use signature::{build_signature, SharedKeySigner, SignatureError};
