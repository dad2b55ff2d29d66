//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration loading and lookup
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading, validating or resolving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid YAML or does not match the schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two entries of the same section share a name
    #[error("Duplicate {section} name '{name}'")]
    DuplicateName { section: &'static str, name: String },

    /// A parameter is out of range
    #[error("Invalid {field} in {section} '{name}': {reason}")]
    InvalidValue {
        section: &'static str,
        name: String,
        field: &'static str,
        reason: String,
    },

    /// No entry with the requested name
    #[error("Unknown {section} '{name}' (available: {})", available.join(", "))]
    UnknownName {
        section: &'static str,
        name: String,
        available: Vec<String>,
    },

    /// The entry cannot be built on this platform or build
    #[error("{section} '{name}' is not supported: {reason}")]
    Unsupported {
        section: &'static str,
        name: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_name_lists_available() {
        let error = ConfigError::UnknownName {
            section: "scenario",
            name: "heavy".to_string(),
            available: vec!["default".to_string(), "read-10".to_string()],
        };

        assert_eq!(
            error.to_string(),
            "Unknown scenario 'heavy' (available: default, read-10)"
        );
    }
}
