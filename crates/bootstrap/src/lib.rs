//! Shared bootstrap utilities for the operator binary.
//!
//! Provides configuration loading, logging setup, manifest loading, and
//! manager assembly so the binary stays a thin composition root.
pub mod builder;
pub mod config;
pub mod logging;
pub mod manifest;

pub use builder::{OperatorBuilder, OperatorSetup};
pub use config::{LoggingConfig, OperatorConfig};
pub use manifest::{ApplySummary, Manifest, ManifestError};
