use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::SystemTime;

pub mod gateway;
mod types;

pub use gateway::AuthorizationGateway;
pub use types::{PermissionType, ResourceType, Role, UserStatus};

use crate::db::DaoError;
use crate::error::LedgerError;
use crate::models::permission::Permission;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserStanding {
    pub role: Role,
    pub status: Option<UserStatus>,
}

impl UserStanding {
    pub fn is_approved(&self) -> bool {
        self.status == Some(UserStatus::Approved)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GrantKey<'a> {
    pub granted_user_id: &'a str,
    pub owner_user_id: &'a str,
    pub resource_type: ResourceType,
    pub permission_type: PermissionType,
}

#[derive(Clone, Debug)]
pub struct GrantRequest {
    pub granter_user_id: String,
    pub granted_user_id: String,
    pub owner_user_id: String,
    pub resource_type: ResourceType,
    pub permission_type: PermissionType,
    pub expires_at: Option<SystemTime>,
}

/// Reads and writes the user and grant rows the permission engine decides over.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_user_standing(&self, user_id: &str) -> Result<Option<UserStanding>, DaoError>;

    /// Writes the role together with its `is_admin` mirror. Returns `false` if the user does
    /// not exist.
    async fn set_user_role(&self, user_id: &str, role: &Role) -> Result<bool, DaoError>;

    async fn upsert_grant(
        &self,
        key: &GrantKey<'_>,
        expires_at: Option<SystemTime>,
        created_at: SystemTime,
    ) -> Result<(), DaoError>;

    async fn delete_grant(&self, key: &GrantKey<'_>) -> Result<(), DaoError>;

    async fn has_active_grant(
        &self,
        granted_user_id: &str,
        owner_user_id: &str,
        resource_types: &[&str],
        permission_types: &[&str],
        now: SystemTime,
    ) -> Result<bool, DaoError>;

    async fn owners_with_active_grants(
        &self,
        granted_user_id: &str,
        resource_types: &[&str],
        permission_types: &[&str],
        now: SystemTime,
    ) -> Result<Vec<String>, DaoError>;

    async fn list_user_ids(&self) -> Result<Vec<String>, DaoError>;

    async fn list_grants_involving(&self, user_id: &str) -> Result<Vec<Permission>, DaoError>;
}

#[derive(Clone)]
pub struct PermissionEngine {
    store: Arc<dyn PermissionStore>,
}

impl PermissionEngine {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    pub async fn role(&self, user_id: &str) -> Result<Role, LedgerError> {
        Ok(self
            .store
            .get_user_standing(user_id)
            .await?
            .map(|s| s.role)
            .unwrap_or(Role::User))
    }

    pub async fn set_role(
        &self,
        actor_user_id: &str,
        target_user_id: &str,
        new_role: Role,
    ) -> Result<(), LedgerError> {
        let actor_role = self.acting_role(actor_user_id).await?;
        let is_self = actor_user_id == target_user_id;

        let target = self
            .store
            .get_user_standing(target_user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User '{target_user_id}'")))?;

        if !actor_role.is_admin_or_higher() && !(is_self && new_role == Role::User) {
            return Err(LedgerError::Forbidden(String::from(
                "Users may not change roles",
            )));
        }

        if new_role == Role::Superadmin && actor_role != Role::Superadmin {
            return Err(LedgerError::Forbidden(String::from(
                "Only a superadmin may promote to superadmin",
            )));
        }

        if is_self {
            if let (Some(current), Some(requested)) = (actor_role.level(), new_role.level()) {
                if requested < current {
                    return Err(LedgerError::Forbidden(String::from(
                        "Users may not reduce their own role",
                    )));
                }
            }
        }

        if actor_role == Role::Admin && !is_self && target.role.is_admin_or_higher() {
            return Err(LedgerError::Forbidden(String::from(
                "Admins may not modify other admins",
            )));
        }

        if !self.store.set_user_role(target_user_id, &new_role).await? {
            return Err(LedgerError::NotFound(format!("User '{target_user_id}'")));
        }

        log::info!(
            "User {} set role of user {} to {}",
            actor_user_id,
            target_user_id,
            new_role
        );

        Ok(())
    }

    pub async fn grant(&self, request: &GrantRequest) -> Result<(), LedgerError> {
        let granter_role = self.acting_role(&request.granter_user_id).await?;

        if !granter_role.is_admin_or_higher() && request.granter_user_id != request.owner_user_id
        {
            return Err(LedgerError::Forbidden(String::from(
                "Only the owner or an admin may grant access",
            )));
        }

        if !request.permission_type.is_grantable() {
            return Err(LedgerError::Validation(format!(
                "Permission '{}' cannot be granted; expected read or write",
                request.permission_type
            )));
        }

        for user_id in [&request.granted_user_id, &request.owner_user_id] {
            if self.store.get_user_standing(user_id).await?.is_none() {
                return Err(LedgerError::NotFound(format!("User '{user_id}'")));
            }
        }

        let key = GrantKey {
            granted_user_id: &request.granted_user_id,
            owner_user_id: &request.owner_user_id,
            resource_type: request.resource_type,
            permission_type: request.permission_type,
        };

        self.store
            .upsert_grant(&key, request.expires_at, SystemTime::now())
            .await?;

        log::info!(
            "User {} granted {} {} on data of {} to {}",
            request.granter_user_id,
            request.permission_type,
            request.resource_type,
            request.owner_user_id,
            request.granted_user_id,
        );

        Ok(())
    }

    pub async fn revoke(&self, actor_user_id: &str, key: &GrantKey<'_>) -> Result<(), LedgerError> {
        let actor_role = self.acting_role(actor_user_id).await?;

        if !actor_role.is_admin_or_higher() && actor_user_id != key.owner_user_id {
            return Err(LedgerError::Forbidden(String::from(
                "Only the owner or an admin may revoke access",
            )));
        }

        self.store.delete_grant(key).await?;
        Ok(())
    }

    pub async fn check(
        &self,
        user_id: &str,
        owner_user_id: &str,
        resource_type: ResourceType,
        permission_type: PermissionType,
    ) -> Result<bool, LedgerError> {
        if user_id == owner_user_id {
            return Ok(true);
        }

        let standing = match self.store.get_user_standing(user_id).await? {
            Some(s) if s.is_approved() => s,
            _ => return Ok(false),
        };

        if standing.role.is_admin_or_higher() {
            return Ok(true);
        }

        Ok(self
            .store
            .has_active_grant(
                user_id,
                owner_user_id,
                &resource_type.satisfying(),
                &permission_type.satisfying(),
                SystemTime::now(),
            )
            .await?)
    }

    pub async fn accessible_owners(
        &self,
        user_id: &str,
        resource_type: ResourceType,
        permission_type: PermissionType,
    ) -> Result<BTreeSet<String>, LedgerError> {
        let standing = match self.store.get_user_standing(user_id).await? {
            Some(s) if s.is_approved() => s,
            _ => return Ok(BTreeSet::from([String::from(user_id)])),
        };

        let mut owners: BTreeSet<String> = if standing.role.is_admin_or_higher() {
            self.store.list_user_ids().await?.into_iter().collect()
        } else {
            self.store
                .owners_with_active_grants(
                    user_id,
                    &resource_type.satisfying(),
                    &permission_type.satisfying(),
                    SystemTime::now(),
                )
                .await?
                .into_iter()
                .collect()
        };

        owners.insert(String::from(user_id));
        Ok(owners)
    }

    /// Grants held by or issued on behalf of `user_id`, including expired ones.
    pub async fn list_grants(
        &self,
        actor_user_id: &str,
        user_id: &str,
    ) -> Result<Vec<Permission>, LedgerError> {
        if actor_user_id != user_id && !self.acting_role(actor_user_id).await?.is_admin_or_higher()
        {
            return Err(LedgerError::Forbidden(String::from(
                "Only the user or an admin may list grants",
            )));
        }

        Ok(self.store.list_grants_involving(user_id).await?)
    }

    async fn acting_role(&self, actor_user_id: &str) -> Result<Role, LedgerError> {
        match self.store.get_user_standing(actor_user_id).await? {
            Some(s) if s.is_approved() => Ok(s.role),
            Some(_) => Err(LedgerError::Forbidden(String::from(
                "User has not been approved",
            ))),
            None => Err(LedgerError::Forbidden(String::from("Unknown user"))),
        }
    }
}
