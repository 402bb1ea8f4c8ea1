//! Track library for Keydrop - decoding, resampling and config

mod config;
mod loader;

pub use config::Config;
pub use loader::{LoadError, LoadedTrack, TrackLoader};
