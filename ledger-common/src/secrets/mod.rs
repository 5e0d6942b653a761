use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

mod cipher;
mod db_store;
mod env_store;

pub use cipher::{SecretCipher, ENCRYPTED_PREFIX, SECRET_KEY_SIZE};
pub use db_store::{DbSecretStore, SecretRows};
pub use env_store::EnvSecretStore;

use crate::db::DaoError;
use crate::error::LedgerError;

/// Written into a credential column when the value itself lives in the process environment.
pub const ENV_MARKER: &str = "[stored in environment variables]";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SecretKind {
    ApiToken,
    BudgetId,
    AccountId,
}

impl SecretKind {
    pub fn env_var_name(&self, user_id: &str) -> String {
        match self {
            SecretKind::ApiToken => format!("YNAB_TOKEN_USER_{user_id}"),
            SecretKind::BudgetId => format!("YNAB_BUDGET_ID_USER_{user_id}"),
            SecretKind::AccountId => format!("YNAB_ACCOUNT_ID_USER_{user_id}"),
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretKind::ApiToken => write!(f, "API token"),
            SecretKind::BudgetId => write!(f, "budget ID"),
            SecretKind::AccountId => write!(f, "account ID"),
        }
    }
}

#[derive(Debug)]
pub enum SecretError {
    NotFound,
    Cipher(String),
    Store(DaoError),
}

impl std::error::Error for SecretError {}

impl fmt::Display for SecretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretError::NotFound => write!(f, "SecretError: Not found"),
            SecretError::Cipher(msg) => write!(f, "SecretError: Cipher failure: {msg}"),
            SecretError::Store(e) => write!(f, "SecretError: {e}"),
        }
    }
}

impl From<DaoError> for SecretError {
    fn from(e: DaoError) -> Self {
        SecretError::Store(e)
    }
}

impl From<SecretError> for LedgerError {
    fn from(e: SecretError) -> Self {
        match e {
            SecretError::NotFound => {
                LedgerError::Config(String::from("YNAB credentials are not configured"))
            }
            SecretError::Cipher(msg) => LedgerError::Config(msg),
            SecretError::Store(e) => e.into(),
        }
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn put(&self, user_id: &str, kind: SecretKind, value: &str) -> Result<(), SecretError>;

    async fn get(&self, user_id: &str, kind: SecretKind)
        -> Result<Zeroizing<String>, SecretError>;
}

/// Picks the environment-backed store on hosted deployments and the row-backed store
/// otherwise. Called once at startup.
pub fn select_secret_store(
    env_mode: bool,
    cipher: SecretCipher,
    rows: Arc<dyn SecretRows>,
) -> Arc<dyn SecretStore> {
    if env_mode {
        log::info!("Reading YNAB credentials from environment variables");
        Arc::new(EnvSecretStore::from_process_env(rows))
    } else {
        log::info!("Reading YNAB credentials from encrypted database columns");
        Arc::new(DbSecretStore::new(cipher, rows))
    }
}
