use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

pub use blob_store::BlobStoreConfig;
use common::prelude::UploadConfig;
use common::upload::{DEFAULT_MAX_IN_FLIGHT, MIN_PART_SIZE};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DELEGATION_TTL_SECS: u64 = 3600;

/// An original key the service accepts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyConfig {
    pub key: String,
    /// label reported for the caller, if any
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    /// address for the API server to listen on.
    ///  if not set then 0.0.0.0:3000 will be used
    pub listen_addr: SocketAddr,

    // storage configuration
    pub blob_store: BlobStoreConfig,
    pub upload: UploadConfig,

    // identity configuration
    /// secret bucket ids are derived with
    pub bucket_secret: String,
    /// original keys known to the service
    pub keys: Vec<KeyConfig>,
    /// how long a per-request key lives
    pub delegation_ttl: Duration,

    // misc
    pub log_level: tracing::Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), DEFAULT_PORT),
            blob_store: BlobStoreConfig::default(),
            upload: UploadConfig::default(),
            bucket_secret: String::new(),
            keys: Vec::new(),
            delegation_ttl: Duration::from_secs(DEFAULT_DELEGATION_TTL_SECS),
            log_level: tracing::Level::INFO,
        }
    }
}

impl Config {
    /// Load a TOML config file. Anything it leaves out keeps its default.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;
        file.try_into()
    }
}

/// On-disk shape of `stash.toml`.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    listen_addr: String,
    blob_store: BlobStoreConfig,
    bucket_secret: String,
    keys: Vec<KeyConfig>,
    delegation_ttl_secs: u64,
    part_size: usize,
    max_in_flight: usize,
    log_level: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            blob_store: BlobStoreConfig::default(),
            bucket_secret: String::new(),
            keys: Vec::new(),
            delegation_ttl_secs: DEFAULT_DELEGATION_TTL_SECS,
            part_size: MIN_PART_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            log_level: "info".to_string(),
        }
    }
}

impl TryFrom<ConfigFile> for Config {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        let log_level = file
            .log_level
            .parse()
            .map_err(|_| ConfigError::InvalidLogLevel(file.log_level.clone()))?;
        if file.part_size == 0 || file.max_in_flight == 0 {
            return Err(ConfigError::InvalidUpload);
        }
        // S3 rejects any part but the last below this size
        if matches!(file.blob_store, BlobStoreConfig::S3 { .. }) && file.part_size < MIN_PART_SIZE {
            return Err(ConfigError::PartSizeTooSmall(file.part_size));
        }

        Ok(Self {
            listen_addr: file.listen_addr.parse()?,
            blob_store: file.blob_store,
            upload: UploadConfig {
                part_size: file.part_size,
                max_in_flight: file.max_in_flight,
            },
            bucket_secret: file.bucket_secret,
            keys: file.keys,
            delegation_ttl: Duration::from_secs(file.delegation_ttl_secs),
            log_level,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid Socket Address: {0}")]
    ListenAddr(#[from] std::net::AddrParseError),
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("part size and max in-flight parts must be positive")]
    InvalidUpload,
    #[error("part size {0} is below the {min} byte minimum for S3", min = MIN_PART_SIZE)]
    PartSizeTooSmall(usize),
}
