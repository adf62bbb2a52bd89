use serde::Deserialize;
use std::path::PathBuf;

use crate::models::DeviceType;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the master's sync transport listens on
    pub port: u16,
    /// Human-readable name announced in beacons and pairing
    pub device_name: String,
    /// Role of this device
    pub device_type: DeviceType,
    /// Directory for the device id, token and snapshots
    pub data_dir: PathBuf,
    /// Shared id scoping discovery to one dojo's network
    pub network_id: String,
    /// Pairing code the master requires (master only)
    pub pairing_code: Option<String>,
    /// Master URL; set explicitly or learned via discovery
    pub server_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self {
            port: 8080,
            device_name: hostname_or("dojosync-device"),
            device_type: DeviceType::MemberTablet,
            data_dir: PathBuf::from(&home).join(".dojosync"),
            network_id: "default".to_string(),
            pairing_code: None,
            server_url: None,
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Ok(port) = std::env::var("DOJOSYNC_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DOJOSYNC_PORT", port))?;
        }
        if let Ok(name) = std::env::var("DOJOSYNC_DEVICE_NAME") {
            config.device_name = name;
        }
        if let Ok(device_type) = std::env::var("DOJOSYNC_DEVICE_TYPE") {
            config.device_type = serde_yaml::from_str(&device_type)
                .map_err(|_| ConfigError::InvalidValue("DOJOSYNC_DEVICE_TYPE", device_type))?;
        }
        if let Ok(data_dir) = std::env::var("DOJOSYNC_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(network_id) = std::env::var("DOJOSYNC_NETWORK_ID") {
            config.network_id = network_id;
        }
        if let Ok(code) = std::env::var("DOJOSYNC_PAIRING_CODE") {
            config.pairing_code = Some(code);
        }
        if let Ok(url) = std::env::var("DOJOSYNC_SERVER_URL") {
            config.server_url = Some(url);
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/dojosync/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dojosync")
            .join("config.yaml")
    }

    /// Path the pairing token is persisted to between runs.
    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join("token")
    }
}

fn hostname_or(fallback: &str) -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| fallback.to_string())
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
            ConfigError::InvalidValue(var, value) => {
                write!(f, "Invalid value for {}: '{}'", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // Env vars are process-global; tests that read or set them must not
    // interleave across threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.network_id, "default");
        assert!(config.pairing_code.is_none());
        assert!(config.data_dir.to_string_lossy().contains(".dojosync"));
    }

    #[test]
    fn test_load_no_file_uses_defaults() {
        let _guard = env_guard();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_load_from_file() {
        let _guard = env_guard();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "port: 9090").unwrap();
        writeln!(file, "device_name: front-desk").unwrap();
        writeln!(file, "device_type: ADMIN_TABLET").unwrap();
        writeln!(file, "network_id: dojo-busan").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.device_name, "front-desk");
        assert_eq!(config.device_type, DeviceType::AdminTablet);
        assert_eq!(config.network_id, "dojo-busan");
    }

    #[test]
    fn test_env_var_overrides_file() {
        let _guard = env_guard();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "network_id: fromfile").unwrap();

        // Set env var
        std::env::set_var("DOJOSYNC_NETWORK_ID", "fromenv");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.network_id, "fromenv");

        // Clean up
        std::env::remove_var("DOJOSYNC_NETWORK_ID");
    }

    #[test]
    fn test_invalid_port_env() {
        let _guard = env_guard();
        std::env::set_var("DOJOSYNC_PORT", "not-a-port");
        let result = Config::load(Some(PathBuf::from("/nonexistent")));
        std::env::remove_var("DOJOSYNC_PORT");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue("DOJOSYNC_PORT", _))
        ));
    }

    #[test]
    fn test_invalid_yaml_error() {
        let _guard = env_guard();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_token_path() {
        let config = Config {
            data_dir: PathBuf::from("/data"),
            ..Default::default()
        };
        assert_eq!(config.token_path(), PathBuf::from("/data/token"));
    }
}
