//! Configuration management for the offline worker
//!
//! One configuration record holds every constant the worker needs: bucket
//! naming, the generation tag, the install-time asset list, the routing
//! patterns and the notification defaults. It is loaded once and shared by
//! `Arc` with every component.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the foreground application
    pub origin: String,

    /// Cache naming and install-time assets
    pub cache: CacheSettings,

    /// Request classification patterns
    pub routes: RouteSettings,

    /// Network behaviour
    pub network: NetworkSettings,

    /// Defaults merged under incoming push payloads
    pub notifications: NotificationDefaults,
}

/// Cache naming and install-time assets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Prefix shared by every application cache
    pub prefix: String,

    /// Generation tag appended to every cache name
    pub generation: String,

    /// Shell assets pre-cached on install
    pub shell_assets: Vec<String>,

    /// Well-known key for the daily-content snapshot
    pub snapshot_key: String,

    /// Override for the on-disk cache directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix: "nhka".to_string(),
            generation: "v3".to_string(),
            shell_assets: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
            ],
            snapshot_key: "/cached-dagstukkies".to_string(),
            dir: None,
        }
    }
}

/// Request classification patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    /// Backend resource path fragments treated as API data
    pub api_patterns: Vec<String>,

    /// Hostname fragment identifying the managed backend
    pub backend_host_marker: String,

    /// Path fragment identifying serverless function invocations
    pub function_marker: String,

    /// Document file extensions
    pub document_extensions: Vec<String>,

    /// Path fragments marking document storage
    pub document_markers: Vec<String>,

    /// Static web-asset extensions
    pub static_extensions: Vec<String>,
}

impl Default for RouteSettings {
    fn default() -> Self {
        let api_patterns = [
            "gemeentes",
            "gebruikers",
            "wyke",
            "besoekpunte",
            "pastorale_aksies",
            "krisis_verslae",
            "gemeente_program",
            "lms_kursusse",
            "dagstukkies",
        ]
        .iter()
        .map(|table| format!("/rest/v1/{}", table))
        .collect();

        Self {
            api_patterns,
            backend_host_marker: "supabase".to_string(),
            function_marker: "/functions/v1/".to_string(),
            document_extensions: strings(&[".pdf", ".doc", ".docx", ".xls", ".xlsx"]),
            document_markers: strings(&["/storage/", "/gemeente-dokumente/"]),
            static_extensions: strings(&[
                ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".woff", ".woff2", ".ico",
            ]),
        }
    }
}

/// Network behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Per-request timeout applied by the HTTP client
    pub request_timeout_secs: u64,

    /// Optional extra bound on background cache refreshes.
    ///
    /// Unset means a refresh is only bounded by `request_timeout_secs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_refresh_timeout_secs: Option<u64>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            background_refresh_timeout_secs: None,
        }
    }
}

/// Defaults merged under incoming push payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub url: String,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "NHKA Kennisgewing".to_string(),
            body: "Jy het 'n nuwe kennisgewing ontvang.".to_string(),
            icon: "/icon-192.png".to_string(),
            badge: "/badge-72.png".to_string(),
            tag: "nhka-notification".to_string(),
            url: "/".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173".to_string(),
            cache: CacheSettings::default(),
            routes: RouteSettings::default(),
            network: NetworkSettings::default(),
            notifications: NotificationDefaults::default(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// The four logical buckets the worker writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Static,
    Data,
    Documents,
    Default,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Static,
        Bucket::Data,
        Bucket::Documents,
        Bucket::Default,
    ];

    /// Logical name embedded in the cache name
    pub fn label(self) -> &'static str {
        match self {
            Bucket::Static => "static",
            Bucket::Data => "data",
            Bucket::Documents => "documents",
            Bucket::Default => "cache",
        }
    }

    pub fn parse(label: &str) -> Option<Bucket> {
        Bucket::ALL.into_iter().find(|b| b.label() == label)
    }
}

impl Config {
    /// Get the default config file path (~/.nhka/config.yaml)
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".nhka").join("config.yaml"))
    }

    /// Resolve an optional override to a concrete config path
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load from an optional path, falling back to built-in defaults when
    /// no file exists there.
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Check the invariants the worker relies on
    pub fn validate(&self) -> Result<()> {
        let origin = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid(format!("origin '{}': {}", self.origin, e)))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "origin must be http(s), got '{}'",
                origin.scheme()
            ))
            .into());
        }
        if self.cache.prefix.is_empty() {
            return Err(ConfigError::Invalid("cache.prefix must not be empty".to_string()).into());
        }
        // Generation is matched as a `-{generation}` suffix
        if self.cache.generation.is_empty() || self.cache.generation.contains('-') {
            return Err(ConfigError::Invalid(format!(
                "cache.generation must be non-empty and contain no '-', got '{}'",
                self.cache.generation
            ))
            .into());
        }
        Ok(())
    }

    /// Parsed origin URL
    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid(format!("origin '{}': {}", self.origin, e)).into())
    }

    /// Resolve an absolute or origin-relative URL
    pub fn resolve_url(&self, url: &str) -> Result<Url> {
        let base = self.origin_url()?;
        base.join(url)
            .map_err(|e| crate::error::NetworkError::InvalidUrl(format!("{}: {}", url, e)).into())
    }

    /// Full cache name of a bucket in the current generation
    pub fn bucket_name(&self, bucket: Bucket) -> String {
        format!(
            "{}-{}-{}",
            self.cache.prefix,
            bucket.label(),
            self.cache.generation
        )
    }

    /// Whether a cache name belongs to this application (any generation)
    pub fn is_app_cache(&self, name: &str) -> bool {
        name.starts_with(&format!("{}-", self.cache.prefix))
    }

    /// Whether a cache name belongs to this application but an old generation
    pub fn is_stale_cache(&self, name: &str) -> bool {
        self.is_app_cache(name) && !name.ends_with(&format!("-{}", self.cache.generation))
    }
}
