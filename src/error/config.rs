// Configuration persistence error types

use crate::error::ErrorCode;
use std::fmt;
use std::path::PathBuf;

/// Configuration error code constants
///
/// Error code range: 5001-5003
pub struct ConfigErrorCodes;

impl ConfigErrorCodes {
    pub const IO: i32 = 5001;
    pub const PARSE: i32 = 5002;
    pub const SERIALIZE: i32 = 5003;
}

/// Errors raised while reading or writing the JSON configuration file
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Serialize { source: serde_json::Error },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::Io { .. } => ConfigErrorCodes::IO,
            ConfigError::Parse { .. } => ConfigErrorCodes::PARSE,
            ConfigError::Serialize { .. } => ConfigErrorCodes::SERIALIZE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::Io { path, source } => {
                format!("Config file {} not accessible: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                format!("Config file {} is not valid JSON: {}", path.display(), source)
            }
            ConfigError::Serialize { source } => {
                format!("Config could not be serialized: {}", source)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Serialize { source } => Some(source),
        }
    }
}
