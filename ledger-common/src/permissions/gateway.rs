use crate::error::LedgerError;
use crate::permissions::{PermissionEngine, PermissionType, ResourceType};

/// Request-level guard in front of the permission engine. Denials surface as `Forbidden`.
#[derive(Clone)]
pub struct AuthorizationGateway {
    engine: PermissionEngine,
}

impl AuthorizationGateway {
    pub fn new(engine: PermissionEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &PermissionEngine {
        &self.engine
    }

    pub async fn authorize(
        &self,
        caller_user_id: &str,
        owner_user_id: &str,
        resource_type: ResourceType,
        permission_type: PermissionType,
    ) -> Result<(), LedgerError> {
        let allowed = self
            .engine
            .check(caller_user_id, owner_user_id, resource_type, permission_type)
            .await?;

        if allowed {
            Ok(())
        } else {
            log::debug!(
                "Denied {} {} on data of {} to {}",
                permission_type,
                resource_type,
                owner_user_id,
                caller_user_id
            );

            Err(LedgerError::Forbidden(format!(
                "No {permission_type} access to {resource_type} of this user"
            )))
        }
    }

    /// Owners whose rows a list endpoint may return to the caller. With `requested_owner` the
    /// result is that single owner, provided the caller is authorized for it.
    pub async fn owner_filter(
        &self,
        caller_user_id: &str,
        resource_type: ResourceType,
        permission_type: PermissionType,
        requested_owner: Option<&str>,
    ) -> Result<Vec<String>, LedgerError> {
        match requested_owner {
            Some(owner) => {
                self.authorize(caller_user_id, owner, resource_type, permission_type)
                    .await?;
                Ok(vec![String::from(owner)])
            }
            None => Ok(self
                .engine
                .accessible_owners(caller_user_id, resource_type, permission_type)
                .await?
                .into_iter()
                .collect()),
        }
    }
}
