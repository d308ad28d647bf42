//! moisture-host: stores soil-moisture readings, serves downsampled history
//! and flags watering events.
//!
//! the analysis modules (`downsample`, `stats`, `detection`) are pure and know
//! nothing about storage or http.

pub mod config;
pub mod datastore;
pub mod detection;
pub mod domain;
pub mod downsample;
pub mod server;
pub mod stats;
pub mod storage;
