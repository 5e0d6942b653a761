use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

mod plan;
mod retry;
mod single_flight;

pub use plan::{
    MirrorPlan, PlannedCategory, PlannedGroup, PlannedLocalCategory, CATEGORY_PALETTE,
    SYNCED_DESCRIPTION,
};
pub use retry::RetryPolicy;
pub use single_flight::SingleFlight;

use crate::db::DaoError;
use crate::error::LedgerError;
use crate::models::user_ynab_settings::UserYnabSettings;
use crate::models::ynab_category::YnabCategory;
use crate::models::ynab_category_group::YnabCategoryGroup;
use crate::secrets::{SecretCipher, SecretError, SecretKind, SecretStore, ENV_MARKER};
use crate::ynab::CategoryFetcher;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub has_credentials: bool,
    pub sync_enabled: bool,
    pub last_sync_time: Option<SystemTime>,
    pub sync_frequency_mins: Option<i32>,
}

#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn get_legacy_settings(
        &self,
        user_id: &str,
    ) -> Result<Option<UserYnabSettings>, DaoError>;

    /// Replaces the user's mirror with `plan` and stamps the sync time, all in one
    /// transaction.
    async fn replace_mirror(
        &self,
        user_id: &str,
        plan: &MirrorPlan,
        synced_at: SystemTime,
    ) -> Result<(), DaoError>;

    async fn mark_credentials_rejected(&self, user_id: &str) -> Result<(), DaoError>;

    /// Users with legacy sync enabled or with credentials on file.
    async fn get_sync_candidate_user_ids(&self) -> Result<Vec<String>, DaoError>;

    async fn get_sync_status(&self, user_id: &str) -> Result<SyncStatus, DaoError>;

    async fn get_mirror(
        &self,
        user_id: &str,
    ) -> Result<Vec<(YnabCategoryGroup, Vec<YnabCategory>)>, DaoError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    pub group_count: usize,
    pub category_count: usize,
    pub local_category_count: usize,
    pub synced_at: SystemTime,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub succeeded: usize,
    pub failed: usize,
}

struct SyncEngineInner {
    secrets: Arc<dyn SecretStore>,
    legacy_cipher: SecretCipher,
    store: Arc<dyn SyncStore>,
    fetcher: Arc<dyn CategoryFetcher>,
    fetch_timeout: Duration,
    retry: RetryPolicy,
}

/// Mirrors a user's YNAB category taxonomy into the ledger.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncEngineInner>,
    in_flight: Arc<SingleFlight<Option<String>, SyncOutcome>>,
}

impl SyncEngine {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        legacy_cipher: SecretCipher,
        store: Arc<dyn SyncStore>,
        fetcher: Arc<dyn CategoryFetcher>,
        fetch_timeout: Duration,
    ) -> Self {
        Self::with_retry_policy(
            secrets,
            legacy_cipher,
            store,
            fetcher,
            fetch_timeout,
            RetryPolicy::default(),
        )
    }

    pub fn with_retry_policy(
        secrets: Arc<dyn SecretStore>,
        legacy_cipher: SecretCipher,
        store: Arc<dyn SyncStore>,
        fetcher: Arc<dyn CategoryFetcher>,
        fetch_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(SyncEngineInner {
                secrets,
                legacy_cipher,
                store,
                fetcher,
                fetch_timeout,
                retry,
            }),
            in_flight: Arc::new(SingleFlight::new()),
        }
    }

    pub async fn sync_user(&self, user_id: &str) -> Result<SyncOutcome, LedgerError> {
        self.sync(user_id, None).await
    }

    pub async fn sync_user_with_budget(
        &self,
        user_id: &str,
        budget_id: &str,
    ) -> Result<SyncOutcome, LedgerError> {
        if budget_id.trim().is_empty() {
            return Err(LedgerError::Validation(String::from(
                "Budget ID must not be empty",
            )));
        }

        self.sync(user_id, Some(String::from(budget_id))).await
    }

    /// Syncs every candidate user in turn. Failures are logged and do not stop the run.
    pub async fn sync_all(&self) -> Result<SyncReport, LedgerError> {
        let user_ids = self.inner.store.get_sync_candidate_user_ids().await?;
        let mut report = SyncReport::default();

        for user_id in user_ids {
            match self.sync_user(&user_id).await {
                Ok(outcome) => {
                    log::info!(
                        "Synced {} YNAB categories in {} groups for user {}",
                        outcome.category_count,
                        outcome.group_count,
                        user_id
                    );
                    report.succeeded += 1;
                }
                Err(e) => {
                    log::error!("YNAB category sync failed for user {}: {}", user_id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    pub async fn status(&self, user_id: &str) -> Result<SyncStatus, LedgerError> {
        Ok(self.inner.store.get_sync_status(user_id).await?)
    }

    pub async fn mirror(
        &self,
        user_id: &str,
    ) -> Result<Vec<(YnabCategoryGroup, Vec<YnabCategory>)>, LedgerError> {
        Ok(self.inner.store.get_mirror(user_id).await?)
    }

    async fn sync(
        &self,
        user_id: &str,
        budget_override: Option<String>,
    ) -> Result<SyncOutcome, LedgerError> {
        let inner = Arc::clone(&self.inner);
        let owned_user_id = String::from(user_id);
        let override_for_run = budget_override.clone();

        self.in_flight
            .run(user_id, budget_override, move || {
                run_sync(
                    Arc::clone(&inner),
                    owned_user_id.clone(),
                    override_for_run.clone(),
                )
            })
            .await
    }
}

async fn run_sync(
    inner: Arc<SyncEngineInner>,
    user_id: String,
    budget_override: Option<String>,
) -> Result<SyncOutcome, LedgerError> {
    let legacy = inner.store.get_legacy_settings(&user_id).await?;

    let token = resolve_secret(&inner, &user_id, SecretKind::ApiToken, legacy.as_ref())
        .await?
        .ok_or_else(|| LedgerError::Config(String::from("No YNAB API token is configured")))?;

    let budget_id = match budget_override {
        Some(b) => Zeroizing::new(b),
        None => resolve_secret(&inner, &user_id, SecretKind::BudgetId, legacy.as_ref())
            .await?
            .ok_or_else(|| LedgerError::Config(String::from("No YNAB budget ID is configured")))?,
    };

    let fetched = inner
        .retry
        .run("YNAB category fetch", || async {
            inner
                .fetcher
                .fetch_category_groups(&token, &budget_id, inner.fetch_timeout)
                .await
                .map_err(LedgerError::from)
        })
        .await;

    let groups = match fetched {
        Ok(g) => g,
        Err(e @ LedgerError::Unauthorized(_)) => {
            log::warn!("YNAB rejected the API token of user {}", user_id);
            if let Err(mark_err) = inner.store.mark_credentials_rejected(&user_id).await {
                log::error!(
                    "Failed to mark YNAB credentials of user {} as rejected: {}",
                    user_id,
                    mark_err
                );
            }
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let synced_at = SystemTime::now();
    let clock_seed = synced_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let plan = MirrorPlan::build(&groups, clock_seed);

    inner
        .retry
        .run("YNAB mirror write", || async {
            inner
                .store
                .replace_mirror(&user_id, &plan, synced_at)
                .await
                .map_err(LedgerError::from)
        })
        .await?;

    Ok(SyncOutcome {
        group_count: plan.groups.len(),
        category_count: plan.categories.len(),
        local_category_count: plan.local_categories.len(),
        synced_at,
    })
}

/// Secret store first, then the legacy settings row.
async fn resolve_secret(
    inner: &SyncEngineInner,
    user_id: &str,
    kind: SecretKind,
    legacy: Option<&UserYnabSettings>,
) -> Result<Option<Zeroizing<String>>, LedgerError> {
    match inner.secrets.get(user_id, kind).await {
        Ok(value) => return Ok(Some(value)),
        Err(SecretError::NotFound) => (),
        Err(e) => return Err(e.into()),
    }

    let legacy_value = legacy.and_then(|settings| match kind {
        SecretKind::ApiToken => settings.token.as_deref(),
        SecretKind::BudgetId => settings.budget_id.as_deref(),
        SecretKind::AccountId => settings.account_id.as_deref(),
    });

    Ok(legacy_value
        .filter(|v| !v.trim().is_empty() && *v != ENV_MARKER)
        .map(|v| inner.legacy_cipher.open_stored(v)))
}
