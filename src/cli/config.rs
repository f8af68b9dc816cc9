//! tioverlap configuration file handling
//!
//! Provides default configuration generation and loading for the operator CLI.
//! Configuration files are TOML format and live under the user config
//! directory (`~/.config/tioverlap/config.toml` on Linux).
//!
//! Every section has defaults, so a partial file loads. Command-line flags
//! override whatever the file says.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tioverlap::bloom::BloomParams;
use tioverlap::crypto::SchemeParameters;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Operator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bloom filter geometry shared by both parties
    #[serde(default)]
    pub bloom_filter: BloomFilterConfig,

    /// Homomorphic scheme parameters
    #[serde(default)]
    pub encryption: EncryptionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloomFilterConfig {
    #[serde(default = "default_bloom_size")]
    pub size: usize,

    #[serde(default = "default_hash_count")]
    pub hash_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Plaintext modulus; must exceed the Bloom filter size
    #[serde(default = "default_plain_modulus")]
    pub plain_modulus: u64,

    /// Ring degree (power of two)
    #[serde(default = "default_poly_modulus_degree")]
    pub poly_modulus_degree: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_bloom_size() -> usize {
    BloomParams::DEFAULT_SIZE
}

fn default_hash_count() -> usize {
    BloomParams::DEFAULT_HASH_COUNT
}

fn default_plain_modulus() -> u64 {
    SchemeParameters::DEFAULT_PLAIN_MODULUS
}

fn default_poly_modulus_degree() -> usize {
    SchemeParameters::DEFAULT_POLY_MODULUS_DEGREE
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for BloomFilterConfig {
    fn default() -> Self {
        Self {
            size: default_bloom_size(),
            hash_count: default_hash_count(),
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            plain_modulus: default_plain_modulus(),
            poly_modulus_degree: default_poly_modulus_degree(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply command-line overrides and re-validate.
    pub fn apply_overrides(
        &mut self,
        bloom_size: Option<usize>,
        hash_count: Option<usize>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(size) = bloom_size {
            self.bloom_filter.size = size;
        }
        if let Some(hash_count) = hash_count {
            self.bloom_filter.hash_count = hash_count;
        }
        self.validate()
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.bloom_params()?;
        self.scheme_parameters(self.bloom_filter.size)?;

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "Invalid log level '{}' (expected one of: {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )
            .into());
        }
        Ok(())
    }

    pub fn bloom_params(&self) -> Result<BloomParams, Box<dyn std::error::Error>> {
        Ok(BloomParams::new(
            self.bloom_filter.size,
            self.bloom_filter.hash_count,
        )?)
    }

    /// Scheme parameters able to carry a filter of `bloom_size` bits.
    pub fn scheme_parameters(
        &self,
        bloom_size: usize,
    ) -> Result<SchemeParameters, Box<dyn std::error::Error>> {
        Ok(SchemeParameters::for_vector_len(
            bloom_size,
            self.encryption.plain_modulus,
            self.encryption.poly_modulus_degree,
        )?)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        format!(
            r#"# tioverlap Configuration
#
# Command-line flags override every value in this file.

[bloom_filter]
# Bit-vector length; both parties must use the same value
size = {size}

# Hash rounds per indicator
hash_count = {hash_count}

[encryption]
# Plaintext modulus; must be larger than the Bloom filter size so the
# overlap-bit count never wraps
plain_modulus = {plain_modulus}

# Ring degree (power of two)
poly_modulus_degree = {poly_modulus_degree}

[logging]
# Log level: trace, debug, info, warn, error
# RUST_LOG takes precedence when set
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/tioverlap/tioverlap.log"
"#,
            size = BloomParams::DEFAULT_SIZE,
            hash_count = BloomParams::DEFAULT_HASH_COUNT,
            plain_modulus = SchemeParameters::DEFAULT_PLAIN_MODULUS,
            poly_modulus_degree = SchemeParameters::DEFAULT_POLY_MODULUS_DEGREE,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml();

        // Create parent directory if needed
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tioverlap")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.bloom_filter.size, 10_000);
        assert_eq!(config.bloom_filter.hash_count, 5);
        assert_eq!(config.encryption.plain_modulus, 1_032_193);
        assert_eq!(config.encryption.poly_modulus_degree, 8192);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialized_config_loads_back() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.bloom_filter.size = 2048;
        config.logging.file = Some(PathBuf::from("/tmp/tioverlap.log"));
        fs::write(&config_path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = AppConfig::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_create_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        AppConfig::create_default(&config_path).unwrap();
        assert!(config_path.exists());

        // Generated file loads back to the built-in defaults
        let config = AppConfig::load(&config_path).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_config_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let minimal_config = r#"
[bloom_filter]
size = 4096
"#;
        fs::write(&config_path, minimal_config).unwrap();

        let config = AppConfig::load(&config_path).unwrap();
        assert_eq!(config.bloom_filter.size, 4096);
        assert_eq!(config.bloom_filter.hash_count, 5);
        assert_eq!(config.encryption.plain_modulus, 1_032_193);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.bloom_filter.hash_count = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.encryption.plain_modulus = 100;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.encryption.poly_modulus_degree = 1000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some(2048), None).unwrap();
        assert_eq!(config.bloom_filter.size, 2048);
        assert_eq!(config.bloom_filter.hash_count, 5);

        // Larger than the plain modulus can count
        let mut config = AppConfig::default();
        assert!(config.apply_overrides(Some(2_000_000), Some(3)).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[bloom_filter]\nsize = 0\n").unwrap();

        assert!(AppConfig::load(&config_path).is_err());
    }

    #[test]
    fn test_load_or_default_with_explicit_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        let err = AppConfig::load_or_default(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("tioverlap/config.toml"));
    }
}
