use async_trait::async_trait;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::secrets::{SecretError, SecretKind, SecretRows, SecretStore, ENV_MARKER};

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Credentials provisioned as per-user environment variables by the hosting platform. Values
/// cannot be written at runtime; `put` only records that they live in the environment.
pub struct EnvSecretStore {
    lookup: Box<EnvLookup>,
    rows: Arc<dyn SecretRows>,
}

impl EnvSecretStore {
    pub fn from_process_env(rows: Arc<dyn SecretRows>) -> Self {
        Self::with_lookup(rows, |name| std::env::var(name).ok())
    }

    pub fn with_lookup<F>(rows: Arc<dyn SecretRows>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
            rows,
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn put(&self, user_id: &str, kind: SecretKind, _value: &str) -> Result<(), SecretError> {
        log::warn!(
            "YNAB {} for user {} must be provisioned as {}; the submitted value was not stored",
            kind,
            user_id,
            kind.env_var_name(user_id),
        );

        self.rows
            .write_secret_column(user_id, kind, ENV_MARKER)
            .await?;

        Ok(())
    }

    async fn get(
        &self,
        user_id: &str,
        kind: SecretKind,
    ) -> Result<Zeroizing<String>, SecretError> {
        match (self.lookup)(&kind.env_var_name(user_id)) {
            Some(value) if !value.trim().is_empty() => Ok(Zeroizing::new(value)),
            _ => Err(SecretError::NotFound),
        }
    }
}
