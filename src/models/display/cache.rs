//! Cache display models

use serde::Serialize;
use tabled::Tabled;

use super::common::{format_size, format_unix_timestamp, truncate_string};
use crate::cache::EntrySummary;

/// One named cache with its entry count
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct CacheDisplay {
    #[tabled(rename = "CACHE")]
    pub name: String,

    #[tabled(rename = "ENTRIES")]
    pub entries: usize,

    /// Whether the cache belongs to the configured generation
    #[tabled(rename = "CURRENT")]
    pub current: String,
}

impl CacheDisplay {
    pub fn new(name: &str, entries: usize, current: bool) -> Self {
        Self {
            name: name.to_string(),
            entries,
            current: if current { "yes" } else { "no" }.to_string(),
        }
    }
}

/// One cached response
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct EntryDisplay {
    #[tabled(rename = "URL")]
    pub url: String,

    #[tabled(rename = "STATUS")]
    pub status: u16,

    #[tabled(rename = "SIZE")]
    pub size: String,

    #[tabled(rename = "CACHED")]
    pub cached_at: String,
}

impl From<&EntrySummary> for EntryDisplay {
    fn from(entry: &EntrySummary) -> Self {
        Self {
            url: truncate_string(&entry.url, 80),
            status: entry.status,
            size: format_size(entry.size_bytes),
            cached_at: format_unix_timestamp(entry.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_display_flags_current() {
        assert_eq!(CacheDisplay::new("nhka-data-v3", 4, true).current, "yes");
        assert_eq!(CacheDisplay::new("nhka-data-v2", 1, false).current, "no");
    }

    #[test]
    fn test_entry_display_from_summary() {
        let entry = EntrySummary {
            url: "http://localhost:5173/rest/v1/gemeentes".to_string(),
            status: 200,
            size_bytes: 2048,
            created_at: 1_700_000_000,
        };

        let display = EntryDisplay::from(&entry);

        assert_eq!(display.url, "http://localhost:5173/rest/v1/gemeentes");
        assert_eq!(display.status, 200);
        assert_eq!(display.size, "2.00 KB");
        assert!(display.cached_at.starts_with("2023-11-1"));
    }
}
