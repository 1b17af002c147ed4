//! Shared types, traits, and configuration for vizfeed.
//!
//! Capture vocabulary (`SourceType`, `AudioConstraints`, `CaptureStrategy`),
//! the spectrum types exchanged between the analyser and the feature
//! extractor, and the TOML config.

pub mod config;
pub mod error;
pub mod frame;
pub mod traits;

pub use config::VizConfig;
pub use error::CoreError;
pub use frame::{FeatureFrame, FeatureSet, Snapshot};
pub use traits::{AudioConstraints, CaptureStrategy, DenialReason, SourceType, StrategyDenied};
