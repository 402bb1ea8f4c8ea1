//! Audio analysis module for Keydrop
//!
//! Provides the decoded PCM buffer type shared by the engine and loader,
//! envelope-based onset peak detection, BPM estimation and beat grids.

mod analyzer;
mod beatgrid;
mod bpm;
mod buffer;

pub use analyzer::{BeatAnalysis, BeatAnalyzer};
pub use beatgrid::BeatGrid;
pub use bpm::{fold_to_range, BpmEstimate, BpmEstimator};
pub use buffer::PcmBuffer;
