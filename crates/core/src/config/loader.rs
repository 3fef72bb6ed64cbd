//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Configuration wrapper
#[derive(Debug, Clone)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path or use defaults
    ///
    /// An explicit path must exist; the standard locations are optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::config_not_found(p));
            }
        }

        let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

        let schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };

        schema.validate()?;

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Load with defaults only (no file)
    pub fn default() -> Self {
        Self {
            schema: ConfigSchema::default(),
            path: None,
        }
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        ".shrinkray.toml",
        "shrinkray.toml",
        ".config/shrinkray.toml",
    ];

    for candidate in candidates {
        let candidate = Path::new(candidate);
        if candidate.exists() {
            return Some(candidate.to_path_buf());
        }
    }

    None
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::from(e).with_context(format!("Parsing config file {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert_eq!(config.schema.search.max_dimension, 8192);
    }

    #[test]
    fn test_config_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\ncodec = \"webp\"\ntarget_kb = 120\n").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.schema.defaults.codec, "webp");
        assert_eq!(config.schema.defaults.target_kb, Some(120));
        assert_eq!(config.path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_config_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/shrinkray.toml"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_config_load_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\ntolerance = 0.0\n").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_config_load_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search\nquality_floor = ").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_config_load_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"shrink\xffray.toml"));
        std::fs::write(&path, "[defaults]\ntarget_kb = 64\n").unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.schema.defaults.target_kb, Some(64));
        assert_eq!(config.path.as_deref(), Some(path.as_path()));

        let missing = dir.path().join(OsStr::from_bytes(b"gone\xff.toml"));
        let err = Config::load(Some(missing.as_path())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }
}
