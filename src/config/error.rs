//! Errors raised while loading or validating `kiln.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid kiln.toml")]
    Toml(#[from] toml::de::Error),

    /// A required directory is absent.
    #[error("[build.{field}] directory not found: {path}")]
    MissingDir { field: &'static str, path: PathBuf },

    #[error("invalid config: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_error_names_file() {
        let err = ConfigError::Io(
            PathBuf::from("kiln.toml"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        assert_eq!(err.to_string(), "cannot read config `kiln.toml`");
    }

    #[test]
    fn test_missing_dir_names_field() {
        let err = ConfigError::MissingDir {
            field: "templates",
            path: PathBuf::from("/site/templates"),
        };
        assert_eq!(
            err.to_string(),
            "[build.templates] directory not found: /site/templates"
        );
    }
}
