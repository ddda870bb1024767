//! userdb - flat-file user account database management
//!
//! This crate manages local user-account records held in two parallel
//! flat-file databases: an identity database in the conventional passwd
//! line format, and a credential database in the shadow line format. It
//! targets embedded Linux environments where both files live at fixed
//! paths and must stay mutually consistent.
//!
//! # Layers
//!
//! - **[`store::RecordStore`]**: durable append / scan / filtered-rewrite
//!   of one-per-line text records under per-file advisory locks, with
//!   atomic replacement through a sibling temp file.
//! - **[`db::IdentityDatabase`] / [`db::CredentialDatabase`]**: typed
//!   encode/decode over a record store, with exact name-field matching.
//! - **[`manager::AccountManager`]**: compound create / delete / rotate /
//!   audit operations across both databases.
//!
//! # Usage
//!
//! ```no_run
//! use userdb::{AccountManager, DbConfig, NewAccount};
//!
//! let config = DbConfig::default();
//! let manager = AccountManager::new(&config);
//! manager.recover()?;
//!
//! manager.create_account(&NewAccount {
//!     name: "alice".to_string(),
//!     secret: "pw1".to_string(),
//!     uid: 1000,
//!     gid: 1000,
//!     info: "Alice".to_string(),
//!     home_dir: "/home/alice".to_string(),
//!     encrypt_secret: true,
//! })?;
//!
//! assert!(manager.check_exists("alice")?);
//! # Ok::<(), userdb::UserDbError>(())
//! ```

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod logging;
pub mod manager;
pub mod models;
pub mod store;

// Re-export commonly used types for convenience
pub use config::DbConfig;
pub use db::{CredentialDatabase, IdentityDatabase};
pub use error::{UserDbError, UserDbResult};
pub use manager::{AccountManager, AuditReport, NewAccount};
pub use models::{AgingFields, CredentialRecord, IdentityRecord};
pub use store::{RecordStore, RecordScanner, RewriteOutcome};

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
