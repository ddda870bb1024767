//! Typed databases over record stores
//!
//! `IdentityDatabase` and `CredentialDatabase` translate between the
//! domain record types and the raw lines of their backing `RecordStore`.
//! Lookup and removal are keyed on the decoded name field compared for
//! exact equality. A raw substring match would silently hit unrelated
//! records (deleting "al" must never touch "alice"), so no raw-line
//! matching ever happens here.

use std::time::Duration;

use crate::config::DbConfig;
use crate::error::UserDbResult;
use crate::models::{name_of_line, CredentialRecord, IdentityRecord};
use crate::store::RecordStore;

/// The identity (passwd-format) database
#[derive(Debug, Clone)]
pub struct IdentityDatabase {
    store: RecordStore,
}

impl IdentityDatabase {
    /// Open the identity database described by `config`
    pub fn new(config: &DbConfig) -> Self {
        Self {
            store: RecordStore::new(
                &config.identity_path,
                config.max_line_length,
                Duration::from_secs(config.lock_timeout_secs),
            ),
        }
    }

    /// The underlying record store
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Append a record, validating and encoding it first
    pub fn append(&self, record: &IdentityRecord) -> UserDbResult<()> {
        let line = record.encode()?;
        self.store.append(&line)
    }

    /// Find the record whose name field equals `name` exactly
    pub fn find(&self, name: &str) -> UserDbResult<Option<IdentityRecord>> {
        for line in self.store.scan()? {
            let line = line?;
            if name_of_line(&line) == name {
                return IdentityRecord::parse(&line).map(Some);
            }
        }
        Ok(None)
    }

    /// Whether a record with this exact name exists
    pub fn exists(&self, name: &str) -> UserDbResult<bool> {
        Ok(self.find(name)?.is_some())
    }

    /// Remove the record whose name field equals `name` exactly.
    /// Returns whether a record was removed.
    pub fn remove_by_name(&self, name: &str) -> UserDbResult<bool> {
        let outcome = self
            .store
            .rewrite_excluding(|line| name_of_line(line) == name)?;
        Ok(outcome.removed_any())
    }

    /// All account names currently in the database, in file order
    pub fn names(&self) -> UserDbResult<Vec<String>> {
        self.store
            .scan()?
            .map(|line| line.map(|l| name_of_line(&l).to_string()))
            .collect()
    }
}

/// The credential (shadow-format) database
#[derive(Debug, Clone)]
pub struct CredentialDatabase {
    store: RecordStore,
}

impl CredentialDatabase {
    /// Open the credential database described by `config`
    pub fn new(config: &DbConfig) -> Self {
        Self {
            store: RecordStore::new(
                &config.credential_path,
                config.max_line_length,
                Duration::from_secs(config.lock_timeout_secs),
            ),
        }
    }

    /// The underlying record store
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Append a record, validating and encoding it first
    pub fn append(&self, record: &CredentialRecord) -> UserDbResult<()> {
        let line = record.encode()?;
        self.store.append(&line)
    }

    /// Find the record whose name field equals `name` exactly
    pub fn find(&self, name: &str) -> UserDbResult<Option<CredentialRecord>> {
        for line in self.store.scan()? {
            let line = line?;
            if name_of_line(&line) == name {
                return CredentialRecord::parse(&line).map(Some);
            }
        }
        Ok(None)
    }

    /// Whether a record with this exact name exists
    pub fn exists(&self, name: &str) -> UserDbResult<bool> {
        Ok(self.find(name)?.is_some())
    }

    /// Remove the record whose name field equals `name` exactly.
    /// Returns whether a record was removed.
    pub fn remove_by_name(&self, name: &str) -> UserDbResult<bool> {
        let outcome = self
            .store
            .rewrite_excluding(|line| name_of_line(line) == name)?;
        Ok(outcome.removed_any())
    }

    /// All account names currently in the database, in file order
    pub fn names(&self) -> UserDbResult<Vec<String>> {
        self.store
            .scan()?
            .map(|line| line.map(|l| name_of_line(&l).to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgingFields;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> DbConfig {
        let config = DbConfig::with_paths(dir.path().join("passwd"), dir.path().join("shadow"));
        std::fs::write(&config.identity_path, "").unwrap();
        std::fs::write(&config.credential_path, "").unwrap();
        config
    }

    fn identity(name: &str, uid: u32) -> IdentityRecord {
        IdentityRecord {
            name: name.to_string(),
            uid,
            gid: uid,
            info: String::new(),
            home_dir: format!("/home/{name}"),
            shell: "/bin/sh".to_string(),
        }
    }

    fn credential(name: &str, hash: &str) -> CredentialRecord {
        CredentialRecord {
            name: name.to_string(),
            secret_hash: hash.to_string(),
            aging: AgingFields::default(),
        }
    }

    #[test]
    fn test_identity_append_and_find() {
        let dir = TempDir::new().unwrap();
        let db = IdentityDatabase::new(&config_in(&dir));

        db.append(&identity("alice", 1000)).unwrap();
        db.append(&identity("bob", 1001)).unwrap();

        let found = db.find("bob").unwrap().unwrap();
        assert_eq!(found.uid, 1001);
        assert!(db.find("carol").unwrap().is_none());
        assert!(db.exists("alice").unwrap());
    }

    #[test]
    fn test_find_is_exact_not_substring() {
        let dir = TempDir::new().unwrap();
        let db = IdentityDatabase::new(&config_in(&dir));

        db.append(&identity("alice", 1000)).unwrap();
        assert!(!db.exists("al").unwrap());
        assert!(!db.exists("lice").unwrap());
        assert!(db.exists("alice").unwrap());
    }

    #[test]
    fn test_remove_is_exact_not_substring() {
        let dir = TempDir::new().unwrap();
        let db = IdentityDatabase::new(&config_in(&dir));

        db.append(&identity("al", 999)).unwrap();
        db.append(&identity("alice", 1000)).unwrap();

        assert!(db.remove_by_name("alice").unwrap());
        assert!(db.exists("al").unwrap());
        assert!(!db.exists("alice").unwrap());

        assert!(db.remove_by_name("al").unwrap());
        assert!(!db.exists("al").unwrap());
    }

    #[test]
    fn test_remove_absent_returns_false() {
        let dir = TempDir::new().unwrap();
        let db = IdentityDatabase::new(&config_in(&dir));
        db.append(&identity("alice", 1000)).unwrap();
        assert!(!db.remove_by_name("bob").unwrap());
        assert!(db.exists("alice").unwrap());
    }

    #[test]
    fn test_credential_append_and_find() {
        let dir = TempDir::new().unwrap();
        let db = CredentialDatabase::new(&config_in(&dir));

        db.append(&credential("alice", "H4sh")).unwrap();
        let found = db.find("alice").unwrap().unwrap();
        assert_eq!(found.secret_hash, "H4sh");
    }

    #[test]
    fn test_names_in_file_order() {
        let dir = TempDir::new().unwrap();
        let db = CredentialDatabase::new(&config_in(&dir));
        db.append(&credential("carol", "a")).unwrap();
        db.append(&credential("alice", "b")).unwrap();
        assert_eq!(db.names().unwrap(), vec!["carol", "alice"]);
    }

    #[test]
    fn test_corrupt_unrelated_line_does_not_break_lookup() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let db = IdentityDatabase::new(&config);

        std::fs::write(&config.identity_path, "garbage line without fields\n").unwrap();
        db.append(&identity("alice", 1000)).unwrap();

        // Lookup keyed on the name field ignores lines for other names,
        // parseable or not.
        assert!(db.exists("alice").unwrap());
    }
}
