//! KSF Core - backend logic for Keo Shortform Factory
//!
//! Turns a long-form video plus an overlay audio/video pair into short
//! vertical clips: the overlay audio is aligned against the base audio,
//! the overlay is composited, and the master is sliced and exported.
//!
//! This crate contains all logic with zero CLI dependencies.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod logging;
pub mod media;
pub mod models;
pub mod orchestrator;
pub mod slicing;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
