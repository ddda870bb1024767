//! Configuration for the userdb library
//!
//! This module defines the database locations and policy knobs used by the
//! record stores and the account manager. Defaults match the fixed paths of
//! the target embedded environment; a TOML file can override any of them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{UserDbError, UserDbResult};

/// Default location of the identity database
pub const DEFAULT_IDENTITY_PATH: &str = "/mnt/internal/config/passwd";

/// Default location of the credential database
pub const DEFAULT_CREDENTIAL_PATH: &str = "/mnt/internal/config/shadow";

/// Fixed salt used to perturb the secret-hashing function
pub const DEFAULT_SALT: &str = "212021918";

/// Command interpreter assigned to every new account
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Default upper bound on a single encoded record line, in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Default advisory-lock acquisition timeout in seconds
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 5;

/// Suffix appended to a database path to form its rewrite temp file
const TEMP_SUFFIX: &str = "_tmp";

/// Database paths and policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Path of the identity (passwd-format) database file
    pub identity_path: PathBuf,

    /// Path of the credential (shadow-format) database file
    pub credential_path: PathBuf,

    /// Salt fed to the secret-hashing function
    pub salt: String,

    /// Shell assigned to newly created accounts
    pub shell: String,

    /// Maximum accepted length of one record line in bytes; longer lines
    /// are rejected, never truncated
    pub max_line_length: usize,

    /// Seconds to keep retrying an advisory lock before giving up
    pub lock_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            identity_path: PathBuf::from(DEFAULT_IDENTITY_PATH),
            credential_path: PathBuf::from(DEFAULT_CREDENTIAL_PATH),
            salt: DEFAULT_SALT.to_string(),
            shell: DEFAULT_SHELL.to_string(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }
}

impl DbConfig {
    /// Create a configuration with explicit database paths and default
    /// policy values. Used heavily by tests pointing at temp directories.
    pub fn with_paths(
        identity_path: impl Into<PathBuf>,
        credential_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identity_path: identity_path.into(),
            credential_path: credential_path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file and validate it
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> UserDbResult<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {:?}", path);

        let contents = fs::read_to_string(path).map_err(|e| UserDbError::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;

        let config: DbConfig = toml::from_str(&contents).map_err(|e| UserDbError::Config {
            message: format!("failed to parse {}: {e}", path.display()),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> UserDbResult<()> {
        if self.identity_path.as_os_str().is_empty() {
            return Err(UserDbError::Config {
                message: "identity_path must not be empty".to_string(),
            });
        }
        if self.credential_path.as_os_str().is_empty() {
            return Err(UserDbError::Config {
                message: "credential_path must not be empty".to_string(),
            });
        }
        if self.identity_path == self.credential_path {
            return Err(UserDbError::Config {
                message: "identity_path and credential_path must differ".to_string(),
            });
        }
        if self.max_line_length == 0 {
            return Err(UserDbError::Config {
                message: "max_line_length must be non-zero".to_string(),
            });
        }
        if self.shell.is_empty() {
            return Err(UserDbError::Config {
                message: "shell must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Temp-file path used by rewrites of the identity database
    pub fn identity_temp_path(&self) -> PathBuf {
        temp_sibling(&self.identity_path)
    }

    /// Temp-file path used by rewrites of the credential database
    pub fn credential_temp_path(&self) -> PathBuf {
        temp_sibling(&self.credential_path)
    }
}

/// Fixed sibling temp path for a database file: `<path>_tmp` in the same
/// directory, so the final rename never crosses a filesystem boundary.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.identity_path, PathBuf::from(DEFAULT_IDENTITY_PATH));
        assert_eq!(config.credential_path, PathBuf::from(DEFAULT_CREDENTIAL_PATH));
        assert_eq!(config.salt, DEFAULT_SALT);
        assert_eq!(config.shell, DEFAULT_SHELL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_temp_sibling_paths() {
        let config = DbConfig::default();
        assert_eq!(
            config.identity_temp_path(),
            PathBuf::from("/mnt/internal/config/passwd_tmp")
        );
        assert_eq!(
            config.credential_temp_path(),
            PathBuf::from("/mnt/internal/config/shadow_tmp")
        );
    }

    #[test]
    fn test_validation_rejects_shared_path() {
        let config = DbConfig::with_paths("/tmp/db", "/tmp/db");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_line_length() {
        let mut config = DbConfig::with_paths("/tmp/passwd", "/tmp/shadow");
        config.max_line_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("userdb.toml");
        std::fs::write(
            &config_path,
            r#"
identity_path = "/data/passwd"
credential_path = "/data/shadow"
salt = "999"
shell = "/bin/ash"
max_line_length = 2048
lock_timeout_secs = 10
"#,
        )
        .unwrap();

        let config = DbConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.identity_path, PathBuf::from("/data/passwd"));
        assert_eq!(config.salt, "999");
        assert_eq!(config.max_line_length, 2048);
    }

    #[test]
    fn test_load_missing_file() {
        let result = DbConfig::load_from_file("/nonexistent/userdb.toml");
        assert!(matches!(result, Err(UserDbError::Config { .. })));
    }
}
