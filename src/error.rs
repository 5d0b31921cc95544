//! Error types and handling for the London housing dashboard

use thiserror::Error;

/// Main error type for the dashboard
#[derive(Error, Debug)]
pub enum HousingError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Dataset loading and cleaning errors
    #[error("Data error: {message}")]
    Data { message: String },

    /// Borough geometry errors
    #[error("Geometry error: {message}")]
    Geo { message: String },

    /// Training, persistence or prediction errors
    #[error("Model error: {message}")]
    Model { message: String },

    /// No trained model has been loaded
    #[error("No price model loaded")]
    ModelNotLoaded,

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Lookup of an unknown entity
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl HousingError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new data error
    pub fn data<S: Into<String>>(message: S) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Create a new geometry error
    pub fn geo<S: Into<String>>(message: S) -> Self {
        Self::Geo {
            message: message.into(),
        }
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(message: S) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            HousingError::Config { .. } => {
                "Configuration error. Please check your config file and secrets.".to_string()
            }
            HousingError::Data { message } => format!("Dataset problem: {message}"),
            HousingError::Geo { .. } => {
                "Borough boundaries could not be loaded. Please check the borough folder."
                    .to_string()
            }
            HousingError::Model { message } => format!("Price model error: {message}"),
            HousingError::ModelNotLoaded => {
                "The price model is unavailable. Train it with the `train` command.".to_string()
            }
            HousingError::Validation { message } => format!("Invalid input: {message}"),
            HousingError::NotFound { message } => format!("Not found: {message}"),
            HousingError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            HousingError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

impl From<csv::Error> for HousingError {
    fn from(err: csv::Error) -> Self {
        HousingError::data(err.to_string())
    }
}

impl From<postcard::Error> for HousingError {
    fn from(err: postcard::Error) -> Self {
        HousingError::model(format!("serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = HousingError::config("missing mapbox key");
        assert!(matches!(config_err, HousingError::Config { .. }));

        let geo_err = HousingError::geo("no shapes");
        assert!(matches!(geo_err, HousingError::Geo { .. }));

        let validation_err = HousingError::validation("bedrooms out of range");
        assert!(matches!(validation_err, HousingError::Validation { .. }));
    }

    #[test]
    fn test_user_messages() {
        let config_err = HousingError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        assert!(HousingError::ModelNotLoaded.user_message().contains("`train` command"));

        let model_err = HousingError::model("model expects 9 features but lists 8 columns");
        assert_eq!(
            model_err.user_message(),
            "Price model error: model expects 9 features but lists 8 columns"
        );

        let validation_err = HousingError::validation("floor area too small");
        assert!(validation_err.user_message().contains("floor area too small"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let housing_err: HousingError = io_err.into();
        assert!(matches!(housing_err, HousingError::Io { .. }));
    }
}
