use async_trait::async_trait;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::db::DaoError;
use crate::secrets::{SecretCipher, SecretError, SecretKind, SecretStore, ENV_MARKER};

/// Per-user credential columns the secret stores persist into.
#[async_trait]
pub trait SecretRows: Send + Sync {
    /// Writes one column, creating the user's row if needed. Writing the API token also sets
    /// `has_credentials`.
    async fn write_secret_column(
        &self,
        user_id: &str,
        kind: SecretKind,
        stored_value: &str,
    ) -> Result<(), DaoError>;

    async fn read_secret_column(
        &self,
        user_id: &str,
        kind: SecretKind,
    ) -> Result<Option<String>, DaoError>;
}

pub struct DbSecretStore {
    cipher: SecretCipher,
    rows: Arc<dyn SecretRows>,
}

impl DbSecretStore {
    pub fn new(cipher: SecretCipher, rows: Arc<dyn SecretRows>) -> Self {
        Self { cipher, rows }
    }
}

#[async_trait]
impl SecretStore for DbSecretStore {
    async fn put(&self, user_id: &str, kind: SecretKind, value: &str) -> Result<(), SecretError> {
        let sealed = self.cipher.seal(value)?;
        self.rows.write_secret_column(user_id, kind, &sealed).await?;

        Ok(())
    }

    async fn get(
        &self,
        user_id: &str,
        kind: SecretKind,
    ) -> Result<Zeroizing<String>, SecretError> {
        let stored = match self.rows.read_secret_column(user_id, kind).await? {
            Some(s) => Zeroizing::new(s),
            None => return Err(SecretError::NotFound),
        };

        if stored.is_empty() || stored.as_str() == ENV_MARKER {
            return Err(SecretError::NotFound);
        }

        Ok(self.cipher.open_stored(&stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::secrets::{ENCRYPTED_PREFIX, SECRET_KEY_SIZE};
    use crate::test_stores::MemoryStore;

    fn store_with(rows: &Arc<MemoryStore>) -> DbSecretStore {
        let cipher = SecretCipher::new(&[3u8; SECRET_KEY_SIZE]).unwrap();
        DbSecretStore::new(cipher, rows.clone())
    }

    #[tokio::test]
    async fn test_get_returns_put_value() {
        let rows = Arc::new(MemoryStore::new());
        let store = store_with(&rows);

        store
            .put("u1", SecretKind::ApiToken, "token-abc")
            .await
            .unwrap();
        store
            .put("u1", SecretKind::BudgetId, "budget-1")
            .await
            .unwrap();

        assert_eq!(
            store.get("u1", SecretKind::ApiToken).await.unwrap().as_str(),
            "token-abc"
        );
        assert_eq!(
            store.get("u1", SecretKind::BudgetId).await.unwrap().as_str(),
            "budget-1"
        );
        assert!(matches!(
            store.get("u1", SecretKind::AccountId).await,
            Err(SecretError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_put_stores_ciphertext_and_flags_credentials() {
        let rows = Arc::new(MemoryStore::new());
        let store = store_with(&rows);

        store
            .put("u1", SecretKind::BudgetId, "budget-1")
            .await
            .unwrap();
        assert!(!rows.has_credentials("u1"));

        store
            .put("u1", SecretKind::ApiToken, "token-abc")
            .await
            .unwrap();
        assert!(rows.has_credentials("u1"));

        let raw = rows
            .read_secret_column("u1", SecretKind::ApiToken)
            .await
            .unwrap()
            .unwrap();
        assert!(raw.starts_with(ENCRYPTED_PREFIX));
        assert!(!raw.contains("token-abc"));
    }

    #[tokio::test]
    async fn test_env_marker_and_missing_rows_are_not_found() {
        let rows = Arc::new(MemoryStore::new());
        let store = store_with(&rows);

        assert!(matches!(
            store.get("nobody", SecretKind::ApiToken).await,
            Err(SecretError::NotFound)
        ));

        rows.write_secret_column("u1", SecretKind::ApiToken, ENV_MARKER)
            .await
            .unwrap();
        assert!(matches!(
            store.get("u1", SecretKind::ApiToken).await,
            Err(SecretError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_reads_legacy_plaintext() {
        let rows = Arc::new(MemoryStore::new());
        let store = store_with(&rows);

        rows.write_secret_column("u1", SecretKind::ApiToken, "plain-token")
            .await
            .unwrap();
        assert_eq!(
            store.get("u1", SecretKind::ApiToken).await.unwrap().as_str(),
            "plain-token"
        );
    }
}
