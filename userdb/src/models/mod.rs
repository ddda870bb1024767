//! Record types for the identity and credential databases
//!
//! This module defines the two domain record types and their translation
//! to and from the colon-delimited line formats used on disk. Identity
//! lines use the conventional 7-field passwd encoding; credential lines
//! use the 9-field shadow encoding. Encoding validates that no field value
//! contains the delimiter or a newline, so a record can never corrupt the
//! line structure of its database.

use serde::{Deserialize, Serialize};

use crate::error::{UserDbError, UserDbResult};

/// Field delimiter of both database formats
pub const FIELD_DELIMITER: char = ':';

/// Placeholder stored in the identity hash slot; the real hash lives in
/// the credential database
pub const HASH_PLACEHOLDER: &str = "x";

const IDENTITY_FIELD_COUNT: usize = 7;
const CREDENTIAL_FIELD_COUNT: usize = 9;

/// An account's non-secret profile, one line of the identity database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Account name, the unique key of both databases
    pub name: String,
    /// Numeric user id
    pub uid: u32,
    /// Numeric group id
    pub gid: u32,
    /// Free-text info field (may be empty)
    pub info: String,
    /// Home directory path
    pub home_dir: String,
    /// Command interpreter
    pub shell: String,
}

/// Password-aging metadata of a credential record. Carried through
/// verbatim; never computed or interpreted by this library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingFields {
    /// Days since epoch of the last secret change
    pub last_change: Option<i64>,
    /// Minimum days between secret changes
    pub min_days: Option<i64>,
    /// Maximum days the secret is valid
    pub max_days: Option<i64>,
    /// Days of warning before expiry
    pub warn_days: Option<i64>,
    /// Days of inactivity allowed after expiry
    pub inactive_days: Option<i64>,
    /// Account expiry date, days since epoch
    pub expire_date: Option<i64>,
    /// Reserved flag field
    pub flag: Option<u64>,
}

/// An account's secret material, one line of the credential database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Account name, matching an identity record's name
    pub name: String,
    /// Hash-function output, or the raw secret when hashing was disabled
    pub secret_hash: String,
    /// Aging metadata, stored but not managed
    pub aging: AgingFields,
}

impl IdentityRecord {
    /// Validate the record's fields for encoding
    pub fn validate(&self) -> UserDbResult<()> {
        validate_name(&self.name)?;
        for (label, value) in [
            ("info", &self.info),
            ("home_dir", &self.home_dir),
            ("shell", &self.shell),
        ] {
            validate_field(label, value)?;
        }
        Ok(())
    }

    /// Encode the record as one identity-database line (no trailing newline)
    pub fn encode(&self) -> UserDbResult<String> {
        self.validate()?;
        Ok(format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.name, HASH_PLACEHOLDER, self.uid, self.gid, self.info, self.home_dir, self.shell
        ))
    }

    /// Parse one identity-database line
    pub fn parse(line: &str) -> UserDbResult<Self> {
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != IDENTITY_FIELD_COUNT {
            return Err(UserDbError::invalid(format!(
                "identity line has {} fields, expected {IDENTITY_FIELD_COUNT}",
                fields.len()
            )));
        }

        let record = Self {
            name: fields[0].to_string(),
            uid: parse_id(fields[2], "uid")?,
            gid: parse_id(fields[3], "gid")?,
            info: fields[4].to_string(),
            home_dir: fields[5].to_string(),
            shell: fields[6].to_string(),
        };
        validate_name(&record.name)?;
        Ok(record)
    }
}

impl CredentialRecord {
    /// Validate the record's fields for encoding
    pub fn validate(&self) -> UserDbResult<()> {
        validate_name(&self.name)?;
        validate_field("secret_hash", &self.secret_hash)?;
        Ok(())
    }

    /// Build a new record carrying this record's aging fields but a
    /// different secret hash. Rotation uses this instead of mutating in
    /// place, so the original value stays untouched until the re-append.
    pub fn with_secret_hash(&self, secret_hash: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            secret_hash: secret_hash.into(),
            aging: self.aging.clone(),
        }
    }

    /// Encode the record as one credential-database line (no trailing newline)
    pub fn encode(&self) -> UserDbResult<String> {
        self.validate()?;
        let a = &self.aging;
        Ok(format!(
            "{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.name,
            self.secret_hash,
            encode_opt(a.last_change),
            encode_opt(a.min_days),
            encode_opt(a.max_days),
            encode_opt(a.warn_days),
            encode_opt(a.inactive_days),
            encode_opt(a.expire_date),
            encode_opt(a.flag),
        ))
    }

    /// Parse one credential-database line
    pub fn parse(line: &str) -> UserDbResult<Self> {
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != CREDENTIAL_FIELD_COUNT {
            return Err(UserDbError::invalid(format!(
                "credential line has {} fields, expected {CREDENTIAL_FIELD_COUNT}",
                fields.len()
            )));
        }

        let record = Self {
            name: fields[0].to_string(),
            secret_hash: fields[1].to_string(),
            aging: AgingFields {
                last_change: parse_opt(fields[2], "last_change")?,
                min_days: parse_opt(fields[3], "min_days")?,
                max_days: parse_opt(fields[4], "max_days")?,
                warn_days: parse_opt(fields[5], "warn_days")?,
                inactive_days: parse_opt(fields[6], "inactive_days")?,
                expire_date: parse_opt(fields[7], "expire_date")?,
                flag: parse_opt(fields[8], "flag")?,
            },
        };
        validate_name(&record.name)?;
        Ok(record)
    }
}

/// Extract the name field of a raw database line without a full parse.
/// Both formats put the name first, so this is the text before the first
/// delimiter. Used by exact-match removal predicates.
pub fn name_of_line(line: &str) -> &str {
    line.split(FIELD_DELIMITER).next().unwrap_or("")
}

/// Validate an account name: non-empty, no delimiter, no newline
pub fn validate_name(name: &str) -> UserDbResult<()> {
    if name.is_empty() {
        return Err(UserDbError::invalid("name must not be empty"));
    }
    validate_field("name", name)
}

fn validate_field(label: &str, value: &str) -> UserDbResult<()> {
    if value.contains(FIELD_DELIMITER) {
        return Err(UserDbError::invalid(format!(
            "field '{label}' contains the delimiter character"
        )));
    }
    if value.contains('\n') || value.contains('\r') {
        return Err(UserDbError::invalid(format!(
            "field '{label}' contains a line break"
        )));
    }
    Ok(())
}

fn parse_id(value: &str, label: &str) -> UserDbResult<u32> {
    value
        .parse()
        .map_err(|_| UserDbError::invalid(format!("field '{label}' is not a valid id: '{value}'")))
}

fn encode_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_opt<T: std::str::FromStr>(value: &str, label: &str) -> UserDbResult<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| {
        UserDbError::invalid(format!("field '{label}' is not numeric: '{value}'"))
    })
}
