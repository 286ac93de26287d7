//! Error handling module for iATW

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Main error type for iATW operations
#[derive(Error, Debug)]
pub enum IatwError {
    /// Alignment domain error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Problem file could not be interpreted
    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    /// Problem file has an extension we cannot parse
    #[error("Unsupported problem file format: {path}. Expected .toml, .yaml or .yml")]
    UnsupportedFormat { path: String },

    /// Optimization failed before producing a result
    #[error("Optimization failed: {message}")]
    OptimizationError { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for iATW operations
pub type IatwResult<T> = std::result::Result<T, IatwError>;
