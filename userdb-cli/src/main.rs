//! Command-line front end for the userdb account databases
//!
//! Thin glue over [`userdb::AccountManager`]: each subcommand maps to one
//! library operation, and library errors map to distinct exit codes so
//! scripts can branch on the outcome.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use userdb::{AccountManager, DbConfig, NewAccount, UserDbError};

#[derive(Parser)]
#[command(name = "userdb", version, about = "Manage flat-file user account databases")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the identity database path
    #[arg(long, global = true)]
    identity_file: Option<PathBuf>,

    /// Override the credential database path
    #[arg(long, global = true)]
    credential_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether an account exists
    Check {
        /// Account name
        name: String,
    },
    /// Create an account in both databases
    Add {
        /// Account name
        name: String,
        /// Plaintext secret
        secret: String,
        /// Numeric user id
        #[arg(long)]
        uid: u32,
        /// Numeric group id
        #[arg(long)]
        gid: u32,
        /// Free-text info field
        #[arg(long, default_value = "")]
        info: String,
        /// Home directory
        #[arg(long)]
        home: String,
        /// Store the secret verbatim instead of hashing it
        #[arg(long)]
        no_encrypt: bool,
    },
    /// Delete an account from both databases
    Del {
        /// Account name
        name: String,
    },
    /// Rotate an account's secret
    Passwd {
        /// Account name
        name: String,
        /// New plaintext secret
        secret: String,
    },
    /// Report names present in one database but not the other
    Audit,
}

fn main() -> ExitCode {
    userdb::logging::init_default_logging();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match DbConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                return ExitCode::from(exit_code(&e));
            }
        },
        None => DbConfig::default(),
    };
    if let Some(path) = cli.identity_file {
        config.identity_path = path;
    }
    if let Some(path) = cli.credential_file {
        config.credential_path = path;
    }

    let manager = AccountManager::new(&config);
    if let Err(e) = manager.recover() {
        error!("recovery failed: {e}");
        return ExitCode::from(exit_code(&e));
    }

    match run(&manager, cli.command) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(manager: &AccountManager, command: Command) -> Result<ExitCode, UserDbError> {
    match command {
        Command::Check { name } => {
            if manager.check_exists(&name)? {
                println!("{name}: exists");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{name}: not found");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Add {
            name,
            secret,
            uid,
            gid,
            info,
            home,
            no_encrypt,
        } => {
            manager.create_account(&NewAccount {
                name: name.clone(),
                secret,
                uid,
                gid,
                info,
                home_dir: home,
                encrypt_secret: !no_encrypt,
            })?;
            println!("created {name}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Del { name } => {
            manager.delete_account(&name)?;
            println!("deleted {name}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Passwd { name, secret } => {
            manager.rotate_credential(&name, &secret)?;
            println!("rotated credential for {name}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Audit => {
            let report = manager.audit()?;
            if report.is_consistent() {
                println!("databases consistent");
                Ok(ExitCode::SUCCESS)
            } else {
                for name in &report.missing_credential {
                    println!("missing credential record: {name}");
                }
                for name in &report.missing_identity {
                    println!("missing identity record: {name}");
                }
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Map library errors to stable process exit codes
fn exit_code(err: &UserDbError) -> u8 {
    match err {
        UserDbError::InvalidArgument { .. } => 2,
        UserDbError::AccessDenied { .. } => 3,
        UserDbError::AlreadyExists { .. } => 4,
        UserDbError::NotFound { .. } => 5,
        UserDbError::RecordTooLong { .. } => 6,
        UserDbError::Io(_) | UserDbError::Config { .. } => 7,
    }
}
