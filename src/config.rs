//! Configuration management for the London housing dashboard
//!
//! Handles loading configuration from files, environment variables and the
//! secrets settings file, and provides validation for all settings.

use crate::HousingError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Root configuration structure for the dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HousingConfig {
    /// Input and output file locations
    #[serde(default)]
    pub data: DataConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Model training settings
    #[serde(default)]
    pub training: TrainingConfig,
}

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Property dataset (CSV)
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    /// Directory containing one TopoJSON file per borough
    #[serde(default = "default_boroughs_dir")]
    pub boroughs_dir: PathBuf,
    /// Trained price model
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Flat TOML file holding `google_maps_api_key` and `mapbox_key`
    #[serde(default = "default_secrets_path")]
    pub secrets_path: PathBuf,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Static front end directory
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// PEM certificate, enables HTTPS together with `tls_key`
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,
    /// PEM private key
    #[serde(default)]
    pub tls_key: Option<PathBuf>,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Disable to always rebuild the dataset from the CSV
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Cache TTL in hours
    #[serde(default = "default_cache_ttl")]
    pub ttl_hours: u32,
    /// Cache directory location
    #[serde(default = "default_cache_location")]
    pub location: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Hyperparameter search settings for the price model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of rows held out for the final evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Fraction of the remaining rows used as the validation split
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
    /// Number of sampled candidates
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    /// Cross-validation folds per candidate
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    /// Seed for splits, candidate sampling and tree sampling
    #[serde(default = "default_seed")]
    pub seed: u64,
}

// Default value functions
fn default_csv_path() -> PathBuf {
    PathBuf::from("data/kaggle_london_house_price_data.csv")
}

fn default_boroughs_dir() -> PathBuf {
    PathBuf::from("data/london_boroughs")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model/price_estimator.bin")
}

fn default_secrets_path() -> PathBuf {
    PathBuf::from("secrets.toml")
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8501
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u32 {
    24
}

fn default_cache_location() -> PathBuf {
    PathBuf::from(".cache/london-housing")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_validation_fraction() -> f64 {
    0.25
}

fn default_n_iter() -> usize {
    20
}

fn default_cv_folds() -> usize {
    3
}

fn default_seed() -> u64 {
    42
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            boroughs_dir: default_boroughs_dir(),
            model_path: default_model_path(),
            secrets_path: default_secrets_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            assets_dir: default_assets_dir(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_hours: default_cache_ttl(),
            location: default_cache_location(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            validation_fraction: default_validation_fraction(),
            n_iter: default_n_iter(),
            cv_folds: default_cv_folds(),
            seed: default_seed(),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime as a `Duration`
    #[must_use]
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.ttl_hours) * 3600)
    }
}

impl HousingConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.or_else(|| {
            let local = PathBuf::from("config.toml");
            if local.exists() {
                Some(local)
            } else {
                Self::get_config_path()
            }
        });

        if let Some(config_file) = config_file.filter(|path| path.exists()) {
            tracing::debug!("Using config file {}", config_file.display());
            builder = builder.add_source(
                File::from(config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // HOUSING_SERVER__PORT=9000 overrides server.port
        builder = builder.add_source(
            Environment::with_prefix("HOUSING")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: HousingConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("london-housing").join("config.toml"))
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(HousingError::config("Server port cannot be 0").into());
        }

        if self.cache.ttl_hours > 720 {
            return Err(HousingError::config("Cache TTL cannot exceed 720 hours (30 days)").into());
        }

        if self.training.n_iter == 0 {
            return Err(HousingError::config("Training n_iter must be at least 1").into());
        }

        if self.training.cv_folds < 2 {
            return Err(HousingError::config("Training cv_folds must be at least 2").into());
        }

        for (name, fraction) in [
            ("test_fraction", self.training.test_fraction),
            ("validation_fraction", self.training.validation_fraction),
        ] {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(HousingError::config(format!(
                    "Training {name} must lie strictly between 0 and 1"
                ))
                .into());
            }
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(HousingError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(HousingError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if self.server.tls_cert.is_some() != self.server.tls_key.is_some() {
            return Err(HousingError::config(
                "Both server.tls_cert and server.tls_key must be set to enable HTTPS",
            )
            .into());
        }

        Ok(())
    }
}

/// Externally issued API keys
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Secrets {
    /// Google Maps key, used for Street View thumbnails
    #[serde(default)]
    pub google_maps_api_key: Option<String>,
    /// Mapbox token, handed to the front end for the basemap
    #[serde(default)]
    pub mapbox_key: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |value: &Option<String>| if value.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("google_maps_api_key", &mask(&self.google_maps_api_key))
            .field("mapbox_key", &mask(&self.mapbox_key))
            .finish()
    }
}

impl Secrets {
    /// Load secrets from the settings file, with `HOUSING_GOOGLE_MAPS_API_KEY`
    /// and `HOUSING_MAPBOX_KEY` taking precedence
    pub fn load(path: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        if path.exists() {
            builder = builder.add_source(
                File::from(path.to_path_buf())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        } else {
            tracing::warn!(
                "Secrets file {} not found, map tiles and street view images are disabled",
                path.display()
            );
        }

        builder = builder.add_source(Environment::with_prefix("HOUSING").prefix_separator("_"));

        let secrets: Secrets = builder
            .build()
            .with_context(|| format!("Failed to read secrets from {}", path.display()))?
            .try_deserialize()
            .with_context(|| "Failed to deserialize secrets")?;

        Ok(secrets.normalized())
    }

    /// Treat blank keys as absent
    #[must_use]
    pub fn normalized(self) -> Self {
        let keep = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            google_maps_api_key: keep(self.google_maps_api_key),
            mapbox_key: keep(self.mapbox_key),
        }
    }
}
