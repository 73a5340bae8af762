//! Display model implementations for table and JSON output
//!
//! Display models transform worker types into CLI-friendly formats with
//! appropriate column names and serialization.

mod cache;
mod common;
mod event;
mod response;

pub use cache::{CacheDisplay, EntryDisplay};
pub use common::{format_size, format_unix_timestamp, truncate_string};
pub use event::EventDisplay;
pub use response::ResponseDisplay;
