use std::env;
use std::time::Duration;

/// Where uploaded bytes are persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local directory (default: "uploads")
    Local { root: String },
    /// S3-compatible object storage
    S3 {
        endpoint: String,
        access_key: String,
        secret_key: String,
        bucket: String,
        region: String,
    },
}

/// What the scanner records when a stored file cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadablePolicy {
    /// Scan the file as empty content, which always comes out clean
    TreatAsClean,
    /// Record `error` without scanning
    MarkError,
}

/// Upload validation limits
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum file size in bytes (default: 5 MiB)
    pub max_file_size: usize,

    /// Lower-cased extensions without the leading dot
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024, // 5 MiB
            allowed_extensions: ["pdf", "docx", "jpg", "jpeg", "png"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Scan worker behaviour
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Fixed part of the simulated scan latency
    pub base_delay: Duration,

    /// Upper bound of the random extra latency
    pub jitter: Duration,

    /// Outcome when the stored content cannot be fetched
    pub unreadable: UnreadablePolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
            jitter: Duration::from_millis(3000),
            unreadable: UnreadablePolicy::TreatAsClean,
        }
    }
}

impl ScanConfig {
    /// No artificial latency, used by tests and local tooling
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    /// Generic security webhook (SECURITY_WEBHOOK_URL)
    pub security_webhook_url: Option<String>,

    /// Chat webhook (SLACK_WEBHOOK_URL)
    pub slack_webhook_url: Option<String>,

    /// Additional endpoints (WEBHOOK_URLS, comma separated)
    pub extra_webhook_urls: Vec<String>,
}

impl NotifierConfig {
    pub fn endpoints(&self) -> Vec<String> {
        self.security_webhook_url
            .iter()
            .chain(self.slack_webhook_url.iter())
            .chain(self.extra_webhook_urls.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Re-enqueue records left pending by a previous process
    pub enabled: bool,

    /// Only records uploaded at least this long ago are recovered
    pub grace: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grace: Duration::ZERO,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageBackend,
    pub upload: UploadConfig,
    pub scan: ScanConfig,
    pub notifier: NotifierConfig,
    pub recovery: RecoveryConfig,
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            database_url: "sqlite://fileguard.db?mode=rwc".to_string(),
            storage: StorageBackend::Local {
                root: "uploads".to_string(),
            },
            upload: UploadConfig::default(),
            scan: ScanConfig::default(),
            notifier: NotifierConfig::default(),
            recovery: RecoveryConfig::default(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let default = Self::default();

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" | "disk" => StorageBackend::Local {
                root: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            },
            "s3" | "minio" => StorageBackend::S3 {
                endpoint: required("S3_ENDPOINT")?,
                access_key: required("S3_ACCESS_KEY")?,
                secret_key: required("S3_SECRET_KEY")?,
                bucket: required("S3_BUCKET")?,
                region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            },
            other => anyhow::bail!("Unknown STORAGE_BACKEND '{}'", other),
        };

        let unreadable = match env::var("UNREADABLE_FILE_RESULT") {
            Ok(v) => parse_unreadable_policy(&v)?,
            Err(_) => default.scan.unreadable,
        };

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(default.bind_addr),

            port: parsed("PORT").unwrap_or(default.port),

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            storage,

            upload: UploadConfig {
                max_file_size: parsed("MAX_FILE_SIZE").unwrap_or(default.upload.max_file_size),
                allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                    .map(|v| {
                        split_list(&v)
                            .into_iter()
                            .map(|e| e.trim_start_matches('.').to_lowercase())
                            .collect()
                    })
                    .unwrap_or(default.upload.allowed_extensions),
            },

            scan: ScanConfig {
                base_delay: parsed("SCAN_BASE_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(default.scan.base_delay),
                jitter: parsed("SCAN_JITTER_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(default.scan.jitter),
                unreadable,
            },

            notifier: NotifierConfig {
                security_webhook_url: non_empty("SECURITY_WEBHOOK_URL"),
                slack_webhook_url: non_empty("SLACK_WEBHOOK_URL"),
                extra_webhook_urls: env::var("WEBHOOK_URLS")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
            },

            recovery: RecoveryConfig {
                enabled: env::var("RECOVER_PENDING_ON_BOOT")
                    .map(|v| v.to_lowercase() != "false" && v != "0")
                    .unwrap_or(default.recovery.enabled),
                grace: parsed("RECOVERY_GRACE_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(default.recovery.grace),
            },

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or(default.allowed_origins),
        })
    }

    /// Create config for development (local disk, in-memory database, no scan delay)
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            scan: ScanConfig::immediate(),
            recovery: RecoveryConfig {
                enabled: false,
                grace: Duration::ZERO,
            },
            ..Self::default()
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    non_empty(key).ok_or_else(|| anyhow::anyhow!("{} must be set", key))
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_unreadable_policy(value: &str) -> anyhow::Result<UnreadablePolicy> {
    match value.trim().to_lowercase().as_str() {
        "clean" => Ok(UnreadablePolicy::TreatAsClean),
        "error" => Ok(UnreadablePolicy::MarkError),
        other => anyhow::bail!(
            "UNREADABLE_FILE_RESULT must be 'clean' or 'error', got '{}'",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.upload.max_file_size, 5 * 1024 * 1024);
        assert_eq!(
            config.upload.allowed_extensions,
            vec!["pdf", "docx", "jpg", "jpeg", "png"]
        );
        assert_eq!(config.scan.unreadable, UnreadablePolicy::TreatAsClean);
        assert!(config.notifier.endpoints().is_empty());
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.scan.base_delay, Duration::ZERO);
        assert_eq!(config.scan.jitter, Duration::ZERO);
        assert!(!config.recovery.enabled);
    }

    #[test]
    fn test_notifier_endpoints_order() {
        let config = NotifierConfig {
            security_webhook_url: Some("http://generic".to_string()),
            slack_webhook_url: Some("http://slack".to_string()),
            extra_webhook_urls: vec!["http://a".to_string(), "http://b".to_string()],
        };
        assert_eq!(
            config.endpoints(),
            vec!["http://generic", "http://slack", "http://a", "http://b"]
        );
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_parse_unreadable_policy() {
        assert_eq!(
            parse_unreadable_policy("CLEAN").unwrap(),
            UnreadablePolicy::TreatAsClean
        );
        assert_eq!(
            parse_unreadable_policy("error").unwrap(),
            UnreadablePolicy::MarkError
        );
        assert!(parse_unreadable_policy("infected").is_err());
    }
}
