use async_trait::async_trait;
use diesel::{dsl, BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::RunQueryDsl;
use std::time::SystemTime;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::permission::{NewPermission, Permission};
use crate::permissions::{GrantKey, PermissionStore, Role, UserStanding, UserStatus};

use crate::schema::permissions as permission_fields;
use crate::schema::permissions::dsl::permissions;
use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }
}

#[async_trait]
impl PermissionStore for Dao {
    async fn get_user_standing(&self, user_id: &str) -> Result<Option<UserStanding>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let row = users
            .select((user_fields::role, user_fields::status))
            .find(user_id)
            .first::<(Option<String>, String)>(&mut conn)
            .await
            .optional()?;

        Ok(row.map(|(role, status)| UserStanding {
            role: Role::from_stored(role.as_deref()),
            status: UserStatus::from_stored(&status),
        }))
    }

    async fn set_user_role(&self, user_id: &str, role: &Role) -> Result<bool, DaoError> {
        let role_name = role.as_str();
        let is_admin = role.is_admin_or_higher();

        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let existing = users
                        .select(user_fields::id)
                        .find(user_id)
                        .for_update()
                        .first::<String>(conn)
                        .await
                        .optional()?;

                    if existing.is_none() {
                        return Ok(false);
                    }

                    dsl::update(users.find(user_id))
                        .set((
                            user_fields::role.eq(role_name),
                            user_fields::is_admin.eq(is_admin),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(true)
                })
            })
            .await
    }

    async fn upsert_grant(
        &self,
        key: &GrantKey<'_>,
        expires_at: Option<SystemTime>,
        created_at: SystemTime,
    ) -> Result<(), DaoError> {
        let new_permission = NewPermission {
            granted_user_id: key.granted_user_id,
            owner_user_id: key.owner_user_id,
            resource_type: key.resource_type.as_str(),
            permission_type: key.permission_type.as_str(),
            created_at,
            expires_at,
        };

        dsl::insert_into(permissions)
            .values(&new_permission)
            .on_conflict((
                permission_fields::granted_user_id,
                permission_fields::owner_user_id,
                permission_fields::resource_type,
                permission_fields::permission_type,
            ))
            .do_update()
            .set(permission_fields::expires_at.eq(expires_at))
            .execute(&mut self.db_async_pool.get().await?)
            .await?;

        Ok(())
    }

    async fn delete_grant(&self, key: &GrantKey<'_>) -> Result<(), DaoError> {
        dsl::delete(
            permissions
                .filter(permission_fields::granted_user_id.eq(key.granted_user_id))
                .filter(permission_fields::owner_user_id.eq(key.owner_user_id))
                .filter(permission_fields::resource_type.eq(key.resource_type.as_str()))
                .filter(permission_fields::permission_type.eq(key.permission_type.as_str())),
        )
        .execute(&mut self.db_async_pool.get().await?)
        .await?;

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
        Ok(dsl::select(dsl::exists(
            permissions
                .filter(permission_fields::granted_user_id.eq(granted_user_id))
                .filter(permission_fields::owner_user_id.eq(owner_user_id))
                .filter(permission_fields::resource_type.eq_any(resource_types.to_vec()))
                .filter(permission_fields::permission_type.eq_any(permission_types.to_vec()))
                .filter(
                    permission_fields::expires_at
                        .is_null()
                        .or(permission_fields::expires_at.gt(now)),
                ),
        ))
        .get_result::<bool>(&mut self.db_async_pool.get().await?)
        .await?)
    }

    async fn owners_with_active_grants(
        &self,
        granted_user_id: &str,
        resource_types: &[&str],
        permission_types: &[&str],
        now: SystemTime,
    ) -> Result<Vec<String>, DaoError> {
        Ok(permissions
            .select(permission_fields::owner_user_id)
            .filter(permission_fields::granted_user_id.eq(granted_user_id))
            .filter(permission_fields::resource_type.eq_any(resource_types.to_vec()))
            .filter(permission_fields::permission_type.eq_any(permission_types.to_vec()))
            .filter(
                permission_fields::expires_at
                    .is_null()
                    .or(permission_fields::expires_at.gt(now)),
            )
            .distinct()
            .load::<String>(&mut self.db_async_pool.get().await?)
            .await?)
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, DaoError> {
        Ok(users
            .select(user_fields::id)
            .load::<String>(&mut self.db_async_pool.get().await?)
            .await?)
    }

    async fn list_grants_involving(&self, user_id: &str) -> Result<Vec<Permission>, DaoError> {
        Ok(permissions
            .filter(
                permission_fields::granted_user_id
                    .eq(user_id)
                    .or(permission_fields::owner_user_id.eq(user_id)),
            )
            .order(permission_fields::id.asc())
            .load::<Permission>(&mut self.db_async_pool.get().await?)
            .await?)
    }
}
