use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryBackend {
    /// One JSON document holding every book record.
    Json,
    /// Embedded redb database under `data_dir`.
    Redb,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: LibraryBackend,
    pub data_dir: PathBuf,
    /// Library document for the JSON backend
    pub library_file: PathBuf,
    /// Directory holding uploaded book binaries
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: LibraryBackend::Json,
            data_dir: PathBuf::from("./data"),
            library_file: PathBuf::from("./data/library.json"),
            upload_dir: PathBuf::from("./public/uploads"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address = std::env::var("BIND_ADDRESS")
            .ok()
            .or_else(|| {
                std::env::var("PORT")
                    .ok()
                    .map(|port| format!("0.0.0.0:{}", port.trim()))
            })
            .unwrap_or_else(|| ServerConfig::default().bind_address);

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let library_file = std::env::var("LIBRARY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("library.json"));

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public/uploads"));

        let backend = match std::env::var("LIBRARY_BACKEND")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LibraryBackend::Json,
            "redb" => LibraryBackend::Redb,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "LIBRARY_BACKEND must be 'json' or 'redb', got '{other}'"
                )))
            }
        };

        let max_upload_size = match std::env::var("MAX_UPLOAD_SIZE") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "MAX_UPLOAD_SIZE must be a byte count, got '{raw}'"
                ))
            })?,
            Err(_) => Config::default().max_upload_size,
        };

        let config = Config {
            server: ServerConfig { bind_address },
            storage: StorageConfig {
                backend,
                data_dir,
                library_file,
                upload_dir,
            },
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "BIND_ADDRESS cannot be empty".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if usize::try_from(self.max_upload_size).is_err() {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE does not fit in memory on this platform".to_string(),
            ));
        }

        if self.storage.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "UPLOAD_DIR cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
