//! Account management over the identity and credential databases
//!
//! `AccountManager` composes the two databases into the public compound
//! operations: existence check, account creation, account deletion, and
//! credential rotation. A compound operation touches the identity database
//! first, then the credential database, and holds an internal mutex for
//! its whole duration so two in-process operations on the same name cannot
//! interleave between check and append. The per-file advisory locks remain
//! the only cross-process coordination, exactly as with any external tool
//! editing the files directly.
//!
//! The two halves of a compound operation are not transactional: if the
//! second half fails, the first is not rolled back. The failure is logged
//! naming the committed half, and `audit` reports any resulting orphans so
//! operators can reconcile.

use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::crypto::hash_secret;
use crate::db::{CredentialDatabase, IdentityDatabase};
use crate::error::{UserDbError, UserDbResult};
use crate::models::{validate_name, AgingFields, CredentialRecord, IdentityRecord};

/// Parameters for creating one account
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Account name, the unique key of both databases
    pub name: String,
    /// Plaintext secret
    pub secret: String,
    /// Numeric user id; uniqueness is the caller's responsibility
    pub uid: u32,
    /// Numeric group id; uniqueness is the caller's responsibility
    pub gid: u32,
    /// Free-text info field (may be empty)
    pub info: String,
    /// Home directory path
    pub home_dir: String,
    /// When false, the secret is stored verbatim instead of hashed
    pub encrypt_secret: bool,
}

/// Cross-database consistency report produced by [`AccountManager::audit`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Names with an identity record but no credential record
    pub missing_credential: Vec<String>,
    /// Names with a credential record but no identity record
    pub missing_identity: Vec<String>,
}

impl AuditReport {
    /// Whether the two databases are mutually consistent
    pub fn is_consistent(&self) -> bool {
        self.missing_credential.is_empty() && self.missing_identity.is_empty()
    }
}

/// Manager for compound operations across both databases
#[derive(Debug)]
pub struct AccountManager {
    identity: IdentityDatabase,
    credential: CredentialDatabase,
    salt: String,
    shell: String,
    // Serializes compound operations within this process; held across the
    // whole check/append (or remove/append) sequence.
    op_lock: Mutex<()>,
}

impl AccountManager {
    /// Create a manager over the databases described by `config`
    pub fn new(config: &DbConfig) -> Self {
        Self {
            identity: IdentityDatabase::new(config),
            credential: CredentialDatabase::new(config),
            salt: config.salt.clone(),
            shell: config.shell.clone(),
            op_lock: Mutex::new(()),
        }
    }

    /// The identity database
    pub fn identity(&self) -> &IdentityDatabase {
        &self.identity
    }

    /// The credential database
    pub fn credential(&self) -> &CredentialDatabase {
        &self.credential
    }

    /// Startup recovery: resolve any rewrite interrupted by a crash, then
    /// create either database file if still absent. Store recovery must
    /// run first: when a crash hit between remove and rename, the temp
    /// file holds the only copy of the database and is renamed into
    /// place — creating an empty file beforehand would discard it.
    pub fn recover(&self) -> UserDbResult<()> {
        for store in [self.identity.store(), self.credential.store()] {
            store.recover()?;
            if !store.path().exists() {
                info!("Creating empty database file: {:?}", store.path());
                std::fs::write(store.path(), b"")?;
            }
        }
        Ok(())
    }

    /// Check whether an account with this exact name exists
    pub fn check_exists(&self, name: &str) -> UserDbResult<bool> {
        validate_name(name)?;
        self.identity.exists(name)
    }

    /// Create an account: append an identity record, then a credential
    /// record with the hashed secret (or the raw secret when hashing is
    /// disabled by the spec).
    pub fn create_account(&self, spec: &NewAccount) -> UserDbResult<()> {
        validate_name(&spec.name)?;
        if spec.secret.is_empty() {
            return Err(UserDbError::invalid("secret must not be empty"));
        }

        let _guard = self.op_lock.lock().expect("account op lock poisoned");

        if self.identity.exists(&spec.name)? {
            return Err(UserDbError::AlreadyExists {
                name: spec.name.clone(),
            });
        }

        let identity = IdentityRecord {
            name: spec.name.clone(),
            uid: spec.uid,
            gid: spec.gid,
            info: spec.info.clone(),
            home_dir: spec.home_dir.clone(),
            shell: self.shell.clone(),
        };
        self.identity.append(&identity)?;

        let secret_hash = if spec.encrypt_secret {
            hash_secret(&spec.secret, &self.salt)
        } else {
            spec.secret.clone()
        };
        let credential = CredentialRecord {
            name: spec.name.clone(),
            secret_hash,
            aging: AgingFields::default(),
        };
        if let Err(e) = self.credential.append(&credential) {
            warn!(
                "Account '{}' half-committed: identity record written, credential append failed: {e}",
                spec.name
            );
            return Err(e);
        }

        info!("Created account '{}'", spec.name);
        Ok(())
    }

    /// Delete an account from both databases
    pub fn delete_account(&self, name: &str) -> UserDbResult<()> {
        validate_name(name)?;

        let _guard = self.op_lock.lock().expect("account op lock poisoned");

        if !self.identity.remove_by_name(name)? {
            return Err(UserDbError::NotFound {
                name: name.to_string(),
            });
        }
        match self.credential.remove_by_name(name) {
            Ok(true) => {}
            Ok(false) => {
                // Pre-existing orphan: the identity half is now gone, the
                // credential record never existed.
                warn!("Account '{name}' had no credential record to delete");
            }
            Err(e) => {
                warn!(
                    "Account '{name}' half-deleted: identity record removed, credential removal failed: {e}"
                );
                return Err(e);
            }
        }

        info!("Deleted account '{name}'");
        Ok(())
    }

    /// Replace an account's secret: remove the credential record and
    /// re-append it with the new hash, preserving its aging fields.
    pub fn rotate_credential(&self, name: &str, new_secret: &str) -> UserDbResult<()> {
        validate_name(name)?;
        if new_secret.is_empty() {
            return Err(UserDbError::invalid("secret must not be empty"));
        }

        let _guard = self.op_lock.lock().expect("account op lock poisoned");

        let existing = self.credential.find(name)?.ok_or_else(|| UserDbError::NotFound {
            name: name.to_string(),
        })?;

        let replacement = existing.with_secret_hash(hash_secret(new_secret, &self.salt));

        self.credential.remove_by_name(name)?;
        if let Err(e) = self.credential.append(&replacement) {
            warn!(
                "Credential rotation for '{name}' half-committed: old record removed, new append failed: {e}"
            );
            return Err(e);
        }

        debug!("Rotated credential for '{name}'");
        Ok(())
    }

    /// Reconciliation scan: report every name present in one database but
    /// not the other. A non-empty report means a compound operation was
    /// interrupted between its two halves, or an external tool edited one
    /// file directly.
    pub fn audit(&self) -> UserDbResult<AuditReport> {
        let identity_names = self.identity.names()?;
        let credential_names = self.credential.names()?;

        let report = AuditReport {
            missing_credential: identity_names
                .iter()
                .filter(|n| !credential_names.contains(n))
                .cloned()
                .collect(),
            missing_identity: credential_names
                .iter()
                .filter(|n| !identity_names.contains(n))
                .cloned()
                .collect(),
        };

        if !report.is_consistent() {
            warn!(
                "Databases inconsistent: {} identity record(s) without credentials, {} credential record(s) without identities",
                report.missing_credential.len(),
                report.missing_identity.len()
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> AccountManager {
        let config = DbConfig::with_paths(dir.path().join("passwd"), dir.path().join("shadow"));
        let manager = AccountManager::new(&config);
        manager.recover().unwrap();
        manager
    }

    fn alice() -> NewAccount {
        NewAccount {
            name: "alice".to_string(),
            secret: "pw1".to_string(),
            uid: 1000,
            gid: 1000,
            info: "Alice".to_string(),
            home_dir: "/home/alice".to_string(),
            encrypt_secret: true,
        }
    }

    #[test]
    fn test_check_exists_rejects_empty_name() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        assert_matches!(
            manager.check_exists(""),
            Err(UserDbError::InvalidArgument { .. })
        );
    }

    #[test]
    fn test_create_rejects_empty_secret() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let mut spec = alice();
        spec.secret = String::new();
        assert_matches!(
            manager.create_account(&spec),
            Err(UserDbError::InvalidArgument { .. })
        );
    }

    #[test]
    fn test_create_rejects_name_with_delimiter() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let mut spec = alice();
        spec.name = "ali:ce".to_string();
        assert_matches!(
            manager.create_account(&spec),
            Err(UserDbError::InvalidArgument { .. })
        );
    }

    #[test]
    fn test_recover_creates_missing_files() {
        let dir = TempDir::new().unwrap();
        let config = DbConfig::with_paths(dir.path().join("passwd"), dir.path().join("shadow"));
        let manager = AccountManager::new(&config);

        assert!(!config.identity_path.exists());
        manager.recover().unwrap();
        assert!(config.identity_path.exists());
        assert!(config.credential_path.exists());
        assert!(!manager.check_exists("alice").unwrap());
    }

    #[test]
    fn test_audit_clean_after_create() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        manager.create_account(&alice()).unwrap();
        assert!(manager.audit().unwrap().is_consistent());
    }

    #[test]
    fn test_audit_reports_orphaned_identity() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        manager.create_account(&alice()).unwrap();

        // Simulate an interrupted create by removing the credential half
        // directly.
        manager.credential().remove_by_name("alice").unwrap();

        let report = manager.audit().unwrap();
        assert_eq!(report.missing_credential, vec!["alice"]);
        assert!(report.missing_identity.is_empty());
        assert!(!report.is_consistent());
    }

    #[test]
    fn test_audit_reports_orphaned_credential() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        manager.create_account(&alice()).unwrap();
        manager.identity().remove_by_name("alice").unwrap();

        let report = manager.audit().unwrap();
        assert_eq!(report.missing_identity, vec!["alice"]);
    }
}
