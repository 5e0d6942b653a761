//! In-memory stand-ins for the database and YNAB, for tests that exercise the engines without
//! PostgreSQL or network access.

use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::db::category::CategoryDirectory;
use crate::db::user::UserDirectory;
use crate::db::DaoError;
use crate::models::category::Category;
use crate::models::permission::Permission;
use crate::models::user::User;
use crate::models::user_ynab_settings::UserYnabSettings;
use crate::models::ynab_category::YnabCategory;
use crate::models::ynab_category_group::YnabCategoryGroup;
use crate::models::ynab_config::{YnabConfig, DEFAULT_SYNC_FREQUENCY_MINS};
use crate::permissions::{GrantKey, PermissionStore, Role, UserStanding, UserStatus};
use crate::secrets::{SecretKind, SecretRows};
use crate::sync::{MirrorPlan, SyncStatus, SyncStore, SYNCED_DESCRIPTION};
use crate::ynab::{CategoryFetcher, FetchError, RemoteCategoryGroup};

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<String, User>,
    grants: Vec<Permission>,
    next_grant_id: i32,
    ynab_configs: HashMap<String, YnabConfig>,
    legacy_settings: HashMap<String, UserYnabSettings>,
    groups: Vec<YnabCategoryGroup>,
    categories: Vec<YnabCategory>,
    local_categories: Vec<Category>,
    next_category_id: i32,
    replace_failures: VecDeque<(DatabaseErrorKind, &'static str)>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: &str, role: Option<&str>, status: &str) {
        let is_admin = Role::from_stored(role).is_admin_or_higher();

        self.state.lock().unwrap().users.insert(
            String::from(id),
            User {
                id: String::from(id),
                username: String::from(id),
                name: format!("User {id}"),
                role: role.map(String::from),
                status: String::from(status),
                is_admin,
            },
        );
    }

    pub fn insert_grant(
        &self,
        grantee: &str,
        owner: &str,
        resource_type: &str,
        permission_type: &str,
        expires_at: Option<SystemTime>,
    ) {
        let mut state = self.state.lock().unwrap();
        state.next_grant_id += 1;

        let id = state.next_grant_id;
        state.grants.push(Permission {
            id,
            granted_user_id: String::from(grantee),
            owner_user_id: String::from(owner),
            resource_type: String::from(resource_type),
            permission_type: String::from(permission_type),
            created_at: SystemTime::now(),
            expires_at,
        });
    }

    pub fn grant_count(&self) -> usize {
        self.state.lock().unwrap().grants.len()
    }

    pub fn is_admin_flag(&self, user_id: &str) -> bool {
        self.state.lock().unwrap().users[user_id].is_admin
    }

    pub fn has_credentials(&self, user_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .ynab_configs
            .get(user_id)
            .is_some_and(|c| c.has_credentials)
    }

    pub fn set_legacy_settings(&self, settings: UserYnabSettings) {
        self.state
            .lock()
            .unwrap()
            .legacy_settings
            .insert(settings.user_id.clone(), settings);
    }

    pub fn legacy_last_synced(&self, user_id: &str) -> Option<SystemTime> {
        self.state
            .lock()
            .unwrap()
            .legacy_settings
            .get(user_id)
            .and_then(|s| s.last_synced)
    }

    pub fn add_local_category(&self, user_id: &str, name: &str, color: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.next_category_id += 1;

        let id = state.next_category_id;
        state.local_categories.push(Category {
            id,
            name: String::from(name),
            description: None,
            user_id: String::from(user_id),
            color: color.map(String::from),
        });
    }

    pub fn local_categories(&self, user_id: &str) -> Vec<Category> {
        self.state
            .lock()
            .unwrap()
            .local_categories
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn seed_mirror_group(&self, user_id: &str, group_id: &str, name: &str) {
        self.state.lock().unwrap().groups.push(YnabCategoryGroup {
            id: String::from(group_id),
            name: String::from(name),
            user_id: String::from(user_id),
            last_updated: SystemTime::now(),
        });
    }

    /// Group ids and category ids currently mirrored for the user.
    pub fn mirror_ids(&self, user_id: &str) -> (Vec<String>, Vec<String>) {
        let state = self.state.lock().unwrap();

        let groups = state
            .groups
            .iter()
            .filter(|g| g.user_id == user_id)
            .map(|g| g.id.clone())
            .collect();
        let categories = state
            .categories
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id.clone())
            .collect();

        (groups, categories)
    }

    /// Makes the next mirror write fail with a database error of the given kind and message.
    pub fn fail_next_replace(&self, kind: DatabaseErrorKind, message: &'static str) {
        self.state
            .lock()
            .unwrap()
            .replace_failures
            .push_back((kind, message));
    }

    fn config_entry<'a>(state: &'a mut MemoryState, user_id: &str) -> &'a mut YnabConfig {
        state
            .ynab_configs
            .entry(String::from(user_id))
            .or_insert_with(|| YnabConfig {
                user_id: String::from(user_id),
                encrypted_api_token: None,
                encrypted_budget_id: None,
                encrypted_account_id: None,
                last_sync_time: None,
                sync_frequency: DEFAULT_SYNC_FREQUENCY_MINS,
                has_credentials: false,
            })
    }

    fn active_grants<'a>(
        state: &'a MemoryState,
        granted_user_id: &'a str,
        resource_types: &'a [&'a str],
        permission_types: &'a [&'a str],
        now: SystemTime,
    ) -> impl Iterator<Item = &'a Permission> + 'a {
        state.grants.iter().filter(move |g| {
            g.granted_user_id == granted_user_id
                && resource_types.contains(&g.resource_type.as_str())
                && permission_types.contains(&g.permission_type.as_str())
                && g.expires_at.map_or(true, |exp| exp > now)
        })
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_user_standing(&self, user_id: &str) -> Result<Option<UserStanding>, DaoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .get(user_id)
            .map(|u| UserStanding {
                role: Role::from_stored(u.role.as_deref()),
                status: UserStatus::from_stored(&u.status),
            }))
    }

    async fn set_user_role(&self, user_id: &str, role: &Role) -> Result<bool, DaoError> {
        let mut state = self.state.lock().unwrap();

        match state.users.get_mut(user_id) {
            Some(user) => {
                user.role = Some(String::from(role.as_str()));
                user.is_admin = role.is_admin_or_higher();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_grant(
        &self,
        key: &GrantKey<'_>,
        expires_at: Option<SystemTime>,
        created_at: SystemTime,
    ) -> Result<(), DaoError> {
        let mut state = self.state.lock().unwrap();

        let existing = state.grants.iter_mut().find(|g| {
            g.granted_user_id == key.granted_user_id
                && g.owner_user_id == key.owner_user_id
                && g.resource_type == key.resource_type.as_str()
                && g.permission_type == key.permission_type.as_str()
        });

        match existing {
            Some(grant) => grant.expires_at = expires_at,
            None => {
                state.next_grant_id += 1;
                let id = state.next_grant_id;
                state.grants.push(Permission {
                    id,
                    granted_user_id: String::from(key.granted_user_id),
                    owner_user_id: String::from(key.owner_user_id),
                    resource_type: String::from(key.resource_type.as_str()),
                    permission_type: String::from(key.permission_type.as_str()),
                    created_at,
                    expires_at,
                });
            }
        }

        Ok(())
    }

    async fn delete_grant(&self, key: &GrantKey<'_>) -> Result<(), DaoError> {
        self.state.lock().unwrap().grants.retain(|g| {
            !(g.granted_user_id == key.granted_user_id
                && g.owner_user_id == key.owner_user_id
                && g.resource_type == key.resource_type.as_str()
                && g.permission_type == key.permission_type.as_str())
        });

        Ok(())
    }

    async fn has_active_grant(
        &self,
        granted_user_id: &str,
        owner_user_id: &str,
        resource_types: &[&str],
        permission_types: &[&str],
        now: SystemTime,
    ) -> Result<bool, DaoError> {
        let state = self.state.lock().unwrap();

        let found = Self::active_grants(
            &state,
            granted_user_id,
            resource_types,
            permission_types,
            now,
        )
        .any(|g| g.owner_user_id == owner_user_id);

        Ok(found)
    }

    async fn owners_with_active_grants(
        &self,
        granted_user_id: &str,
        resource_types: &[&str],
        permission_types: &[&str],
        now: SystemTime,
    ) -> Result<Vec<String>, DaoError> {
        let state = self.state.lock().unwrap();

        let owners = Self::active_grants(
            &state,
            granted_user_id,
            resource_types,
            permission_types,
            now,
        )
        .map(|g| g.owner_user_id.clone())
        .collect();

        Ok(owners)
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, DaoError> {
        Ok(self.state.lock().unwrap().users.keys().cloned().collect())
    }

    async fn list_grants_involving(&self, user_id: &str) -> Result<Vec<Permission>, DaoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .grants
            .iter()
            .filter(|g| g.granted_user_id == user_id || g.owner_user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SecretRows for MemoryStore {
    async fn write_secret_column(
        &self,
        user_id: &str,
        kind: SecretKind,
        stored_value: &str,
    ) -> Result<(), DaoError> {
        let mut state = self.state.lock().unwrap();
        let config = Self::config_entry(&mut state, user_id);

        let value = Some(String::from(stored_value));
        match kind {
            SecretKind::ApiToken => {
                config.encrypted_api_token = value;
                config.has_credentials = true;
            }
            SecretKind::BudgetId => config.encrypted_budget_id = value,
            SecretKind::AccountId => config.encrypted_account_id = value,
        }

        Ok(())
    }

    async fn read_secret_column(
        &self,
        user_id: &str,
        kind: SecretKind,
    ) -> Result<Option<String>, DaoError> {
        let state = self.state.lock().unwrap();

        Ok(state.ynab_configs.get(user_id).and_then(|c| match kind {
            SecretKind::ApiToken => c.encrypted_api_token.clone(),
            SecretKind::BudgetId => c.encrypted_budget_id.clone(),
            SecretKind::AccountId => c.encrypted_account_id.clone(),
        }))
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn get_legacy_settings(
        &self,
        user_id: &str,
    ) -> Result<Option<UserYnabSettings>, DaoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .legacy_settings
            .get(user_id)
            .cloned())
    }

    async fn replace_mirror(
        &self,
        user_id: &str,
        plan: &MirrorPlan,
        synced_at: SystemTime,
    ) -> Result<(), DaoError> {
        let mut state = self.state.lock().unwrap();

        if let Some((kind, message)) = state.replace_failures.pop_front() {
            return Err(DaoError::from(DieselError::DatabaseError(
                kind,
                Box::new(String::from(message)),
            )));
        }

        state.categories.retain(|c| c.user_id != user_id);
        state.groups.retain(|g| g.user_id != user_id);

        for group in &plan.groups {
            state.groups.push(YnabCategoryGroup {
                id: group.id.clone(),
                name: group.name.clone(),
                user_id: String::from(user_id),
                last_updated: synced_at,
            });
        }

        for category in &plan.categories {
            state.categories.push(YnabCategory {
                id: category.id.clone(),
                group_id: category.group_id.clone(),
                name: category.name.clone(),
                user_id: String::from(user_id),
                last_updated: synced_at,
            });
        }

        for local in &plan.local_categories {
            let existing = state
                .local_categories
                .iter_mut()
                .find(|c| c.user_id == user_id && c.name == local.name);

            match existing {
                Some(category) => {
                    category.description = Some(String::from(SYNCED_DESCRIPTION));
                    if category.color.is_none() {
                        category.color = Some(String::from(local.color));
                    }
                }
                None => {
                    state.next_category_id += 1;
                    let id = state.next_category_id;
                    state.local_categories.push(Category {
                        id,
                        name: local.name.clone(),
                        description: Some(String::from(SYNCED_DESCRIPTION)),
                        user_id: String::from(user_id),
                        color: Some(String::from(local.color)),
                    });
                }
            }
        }

        Self::config_entry(&mut state, user_id).last_sync_time = Some(synced_at);
        if let Some(legacy) = state.legacy_settings.get_mut(user_id) {
            legacy.last_synced = Some(synced_at);
        }

        Ok(())
    }

    async fn mark_credentials_rejected(&self, user_id: &str) -> Result<(), DaoError> {
        let mut state = self.state.lock().unwrap();
        if let Some(config) = state.ynab_configs.get_mut(user_id) {
            config.has_credentials = false;
        }

        Ok(())
    }

    async fn get_sync_candidate_user_ids(&self) -> Result<Vec<String>, DaoError> {
        let state = self.state.lock().unwrap();

        let mut ids: Vec<String> = state
            .legacy_settings
            .values()
            .filter(|s| s.sync_enabled)
            .map(|s| s.user_id.clone())
            .chain(
                state
                    .ynab_configs
                    .values()
                    .filter(|c| c.has_credentials)
                    .map(|c| c.user_id.clone()),
            )
            .collect();

        ids.sort();
        ids.dedup();

        Ok(ids)
    }

    async fn get_sync_status(&self, user_id: &str) -> Result<SyncStatus, DaoError> {
        let state = self.state.lock().unwrap();
        let config = state.ynab_configs.get(user_id);
        let legacy = state.legacy_settings.get(user_id);

        Ok(SyncStatus {
            has_credentials: config.is_some_and(|c| c.has_credentials),
            sync_enabled: legacy.is_some_and(|s| s.sync_enabled),
            last_sync_time: config
                .and_then(|c| c.last_sync_time)
                .or_else(|| legacy.and_then(|s| s.last_synced)),
            sync_frequency_mins: config.map(|c| c.sync_frequency),
        })
    }

    async fn get_mirror(
        &self,
        user_id: &str,
    ) -> Result<Vec<(YnabCategoryGroup, Vec<YnabCategory>)>, DaoError> {
        let state = self.state.lock().unwrap();

        Ok(state
            .groups
            .iter()
            .filter(|g| g.user_id == user_id)
            .map(|g| {
                let categories = state
                    .categories
                    .iter()
                    .filter(|c| c.user_id == user_id && c.group_id == g.id)
                    .cloned()
                    .collect();
                (g.clone(), categories)
            })
            .collect())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn get_users_by_ids(&self, user_ids: &[String]) -> Result<Vec<User>, DaoError> {
        let state = self.state.lock().unwrap();

        Ok(user_ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl CategoryDirectory for MemoryStore {
    async fn get_categories_for_owners(
        &self,
        owner_ids: &[String],
    ) -> Result<Vec<Category>, DaoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .local_categories
            .iter()
            .filter(|c| owner_ids.contains(&c.user_id))
            .cloned()
            .collect())
    }
}

/// Replays queued responses in order. Calls beyond the queue fail with a transport error.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<Vec<RemoteCategoryGroup>, FetchError>>>,
    requests: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn push(&self, response: Result<Vec<RemoteCategoryGroup>, FetchError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Token and budget id of every call so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CategoryFetcher for ScriptedFetcher {
    async fn fetch_category_groups(
        &self,
        token: &str,
        budget_id: &str,
        _timeout: Duration,
    ) -> Result<Vec<RemoteCategoryGroup>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((String::from(token), String::from(budget_id)));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport(String::from("No scripted response"))))
    }
}
