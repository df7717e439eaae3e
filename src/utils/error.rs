use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("File not found: {id}")]
    NotFound { id: String },

    #[error("Transport error during {operation}: {message}")]
    TransportError { operation: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    NotFound,
    Transport,
}

impl TransferError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingConfigError {
            field: field.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn transport(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::TransportError {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Maps an IO error to `NotFound` when the file is absent, `TransportError` otherwise.
    pub fn from_io(operation: &str, id: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(id)
        } else {
            Self::transport(format!("{} '{}'", operation, id), err)
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::TransportError { .. } | Self::IoError(_) => ErrorCategory::Transport,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::NotFound => format!("A file disappeared during the transfer: {}", self),
            ErrorCategory::Transport => format!("Could not reach a storage backend: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::MissingConfigError { .. } => "Add the missing value to the config file or environment",
            Self::InvalidConfigValueError { .. } => "Fix the value; boolean flags accept only true or false",
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Check the storage type names and the enabled cargo features"
            }
            Self::NotFound { .. } => "Another process may be draining the same source; rerun to pick up the rest",
            Self::TransportError { .. } | Self::IoError(_) => {
                "Check connectivity and credentials for the backend, then rerun"
            }
        }
    }

    /// Process exit code used by the binary.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 1,
            ErrorCategory::NotFound => 2,
            ErrorCategory::Transport => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
