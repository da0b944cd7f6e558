use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tenant reported when neither configuration nor the host supplies one.
pub const UNKNOWN_TENANT: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
    pub cursor: CursorConfig,
    pub delivery: DeliveryConfig,
}

impl Config {
    /// Tenant identifier stamped on every record.
    pub fn tenant_id(&self) -> &str {
        self.delivery.tenant_id.as_deref().unwrap_or(UNKNOWN_TENANT)
    }

    pub fn has_auth_token(&self) -> bool {
        self.delivery
            .auth_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

/// Where session logs live and how often they are scanned.
///
/// Files are discovered at `root/<agent>/<sessions_dir>/*.<extension>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub root: PathBuf,
    pub sessions_dir: String,
    pub extension: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub max_concurrent_reads: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/data/agents"),
            sessions_dir: "sessions".to_string(),
            extension: "jsonl".to_string(),
            poll_interval: Duration::from_secs(3),
            max_concurrent_reads: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub path: PathBuf,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/data/log-cursor.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            auth_token: None,
            timeout: Duration::from_secs(10),
            tenant_id: None,
        }
    }
}
