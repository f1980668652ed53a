use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "bullhorn.toml",
    "config/bullhorn.toml",
    "crates/config/bullhorn.toml",
    "../bullhorn.toml",
    "../config/bullhorn.toml",
    "../crates/config/bullhorn.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub platform: PlatformConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

/// Locations of everything the console persists: the credential record, the
/// QR artifact, the two flat-file JSON stores, uploaded media, and the static
/// console assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub auth_file: PathBuf,
    pub qr_file: PathBuf,
    pub templates_file: PathBuf,
    pub failed_messages_file: PathBuf,
    pub uploads_dir: PathBuf,
    pub public_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            auth_file: PathBuf::from("auth.json"),
            qr_file: PathBuf::from("qr.png"),
            templates_file: PathBuf::from("templates.json"),
            failed_messages_file: PathBuf::from("failed.json"),
            uploads_dir: PathBuf::from("uploads"),
            public_dir: PathBuf::from("public"),
        }
    }
}

/// How group metadata is resolved during a roster sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupFetchMode {
    /// One metadata call per group id; failures are logged and the group is
    /// skipped.
    Individual,
    /// A single batched metadata call; a failure yields zero groups.
    Batch,
}

/// Configuration for the chat-platform bridge connection and the QR login
/// handshake timings.
///
/// ```
/// use bullhorn_config::PlatformConfig;
///
/// let platform = PlatformConfig::default();
/// assert_eq!(platform.qr_login_timeout_seconds, 30);
/// assert_eq!(platform.qr_settle_delay_ms, 500);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub bridge_url: String,
    #[serde(default = "PlatformConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "PlatformConfig::default_qr_login_timeout")]
    pub qr_login_timeout_seconds: u64,
    #[serde(default = "PlatformConfig::default_qr_settle_delay")]
    pub qr_settle_delay_ms: u64,
    #[serde(default = "PlatformConfig::default_group_fetch")]
    pub group_fetch: GroupFetchMode,
}

impl PlatformConfig {
    fn default_bridge_url() -> String {
        "http://127.0.0.1:8921".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_qr_login_timeout() -> u64 {
        30
    }

    const fn default_qr_settle_delay() -> u64 {
        500
    }

    const fn default_group_fetch() -> GroupFetchMode {
        GroupFetchMode::Individual
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            bridge_url: Self::default_bridge_url(),
            request_timeout_seconds: Self::default_request_timeout(),
            qr_login_timeout_seconds: Self::default_qr_login_timeout(),
            qr_settle_delay_ms: Self::default_qr_settle_delay(),
            group_fetch: Self::default_group_fetch(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_credential_max_age")]
    pub credential_max_age_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credential_max_age_seconds: 86_400,
        }
    }
}

impl AuthConfig {
    const fn default_credential_max_age() -> u64 {
        86_400
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use bullhorn_config::load;
///
/// std::env::remove_var("BULLHORN_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())
        .unwrap()
        .set_default("http.port", i64::from(defaults.http.port))
        .unwrap()
        .set_default(
            "storage.auth_file",
            defaults.storage.auth_file.to_string_lossy().to_string(),
        )
        .unwrap()
        .set_default(
            "storage.qr_file",
            defaults.storage.qr_file.to_string_lossy().to_string(),
        )
        .unwrap()
        .set_default(
            "storage.templates_file",
            defaults.storage.templates_file.to_string_lossy().to_string(),
        )
        .unwrap()
        .set_default(
            "storage.failed_messages_file",
            defaults
                .storage
                .failed_messages_file
                .to_string_lossy()
                .to_string(),
        )
        .unwrap()
        .set_default(
            "storage.uploads_dir",
            defaults.storage.uploads_dir.to_string_lossy().to_string(),
        )
        .unwrap()
        .set_default(
            "storage.public_dir",
            defaults.storage.public_dir.to_string_lossy().to_string(),
        )
        .unwrap()
        .set_default("platform.bridge_url", defaults.platform.bridge_url.clone())
        .unwrap()
        .set_default(
            "platform.request_timeout_seconds",
            i64::try_from(defaults.platform.request_timeout_seconds).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "platform.qr_login_timeout_seconds",
            i64::try_from(defaults.platform.qr_login_timeout_seconds).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "platform.qr_settle_delay_ms",
            i64::try_from(defaults.platform.qr_settle_delay_ms).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default("platform.group_fetch", "individual")
        .unwrap()
        .set_default(
            "auth.credential_max_age_seconds",
            i64::try_from(defaults.auth.credential_max_age_seconds).unwrap_or(i64::MAX),
        )
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("BULLHORN").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("BULLHORN_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via BULLHORN_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
