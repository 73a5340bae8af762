//! Display models for CLI output
//!
//! Converts worker and cache types into CLI-friendly display formats.

pub mod display;

pub use display::{CacheDisplay, EntryDisplay, EventDisplay, ResponseDisplay};
