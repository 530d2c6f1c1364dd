//! Server configuration for Border Maker
//!
//! Handles loading/saving of the XML configuration file and environment overrides.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an XML config file
pub const CONFIG_ENV: &str = "BORDER_MAKER_CONFIG";

/// Default upload limit (10MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

fn default_port() -> u16 {
    3000
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_state_dir() -> PathBuf {
    dirs::config_dir()
        .map(|mut p| {
            p.push("BorderMaker");
            p.push("state");
            p
        })
        .unwrap_or_else(|| PathBuf::from(".border-maker"))
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

/// Server configuration stored in `border-maker.xml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "BorderMakerConfig")]
pub struct ServerConfig {
    /// HTTP listen port
    #[serde(rename = "port", default = "default_port")]
    pub port: u16,

    /// Directory uploaded images are written to and served from
    #[serde(rename = "uploadsDir", default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// Directory holding the persisted gallery state
    #[serde(rename = "stateDir", default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Prefix used to build absolute URLs in image listings
    #[serde(rename = "publicBaseUrl", default = "default_public_base_url")]
    pub public_base_url: String,

    /// Read-only deployment: uploads are not persisted, listings are empty
    /// and `/uploads/*` answers with a 404 stub.
    #[serde(rename = "readOnly", default)]
    pub read_only: bool,

    /// Maximum accepted upload size in bytes
    #[serde(rename = "maxUploadBytes", default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            uploads_dir: default_uploads_dir(),
            state_dir: default_state_dir(),
            public_base_url: default_public_base_url(),
            read_only: false,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut config: Self = from_str(&contents).map_err(ConfigError::XmlParse)?;
        config.public_base_url = config.public_base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Save configuration to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let xml = to_string(self).map_err(ConfigError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(ConfigError::Io)?;
            }
        }
        fs::write(path, formatted).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// Load from `BORDER_MAKER_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                tracing::info!("Loading config from {}", path.display());
                Self::load_from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    ///
    /// `VERCEL=1` or any `VERCEL_ENV` value forces read-only mode, matching
    /// serverless hosts where the filesystem cannot be written.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("BORDER_MAKER_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "BORDER_MAKER_PORT", value: port })?;
        }
        if let Some(dir) = lookup("BORDER_MAKER_UPLOADS_DIR") {
            self.uploads_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("BORDER_MAKER_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("BORDER_MAKER_PUBLIC_URL") {
            self.public_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(flag) = lookup("BORDER_MAKER_READ_ONLY") {
            self.read_only = parse_flag(&flag).ok_or(ConfigError::InvalidValue {
                key: "BORDER_MAKER_READ_ONLY",
                value: flag,
            })?;
        }
        if lookup("VERCEL").as_deref() == Some("1") || lookup("VERCEL_ENV").is_some_and(|v| !v.is_empty()) {
            self.read_only = true;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    XmlParse(quick_xml::DeError),
    XmlWrite(quick_xml::SeError),
    InvalidValue { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::XmlParse(e) => write!(f, "XML parse error: {}", e),
            ConfigError::XmlWrite(e) => write!(f, "XML write error: {}", e),
            ConfigError::InvalidValue { key, value } => write!(f, "Invalid value for {}: {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}
