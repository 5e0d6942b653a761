use async_trait::async_trait;
use diesel::dsl::sql;
use diesel::sql_types::{Nullable, Text};
use diesel::upsert::excluded;
use diesel::{dsl, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::RunQueryDsl;
use std::collections::HashMap;
use std::time::SystemTime;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::category::NewCategory;
use crate::models::user_ynab_settings::UserYnabSettings;
use crate::models::ynab_category::{NewYnabCategory, YnabCategory};
use crate::models::ynab_category_group::{NewYnabCategoryGroup, YnabCategoryGroup};
use crate::models::ynab_config::{NewYnabConfig, DEFAULT_SYNC_FREQUENCY_MINS};
use crate::secrets::{SecretKind, SecretRows};
use crate::sync::{MirrorPlan, SyncStatus, SyncStore, SYNCED_DESCRIPTION};

use crate::schema::categories as category_fields;
use crate::schema::categories::dsl::categories;
use crate::schema::user_ynab_settings as legacy_fields;
use crate::schema::user_ynab_settings::dsl::user_ynab_settings;
use crate::schema::ynab_categories as ynab_category_fields;
use crate::schema::ynab_categories::dsl::ynab_categories;
use crate::schema::ynab_category_groups as ynab_group_fields;
use crate::schema::ynab_category_groups::dsl::ynab_category_groups;
use crate::schema::ynab_config as ynab_config_fields;
use crate::schema::ynab_config::dsl::ynab_config;

fn empty_config(user_id: &str) -> NewYnabConfig<'_> {
    NewYnabConfig {
        user_id,
        encrypted_api_token: None,
        encrypted_budget_id: None,
        encrypted_account_id: None,
        sync_frequency: DEFAULT_SYNC_FREQUENCY_MINS,
        has_credentials: false,
    }
}

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
impl SecretRows for Dao {
    async fn write_secret_column(
        &self,
        user_id: &str,
        kind: SecretKind,
        stored_value: &str,
    ) -> Result<(), DaoError> {
        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    dsl::insert_into(ynab_config)
                        .values(&empty_config(user_id))
                        .on_conflict_do_nothing()
                        .execute(conn)
                        .await?;

                    let row = ynab_config.find(user_id);

                    match kind {
                        SecretKind::ApiToken => {
                            dsl::update(row)
                                .set((
                                    ynab_config_fields::encrypted_api_token.eq(stored_value),
                                    ynab_config_fields::has_credentials.eq(true),
                                ))
                                .execute(conn)
                                .await?
                        }
                        SecretKind::BudgetId => {
                            dsl::update(row)
                                .set(ynab_config_fields::encrypted_budget_id.eq(stored_value))
                                .execute(conn)
                                .await?
                        }
                        SecretKind::AccountId => {
                            dsl::update(row)
                                .set(ynab_config_fields::encrypted_account_id.eq(stored_value))
                                .execute(conn)
                                .await?
                        }
                    };

                    Ok(())
                })
            })
            .await
    }

    async fn read_secret_column(
        &self,
        user_id: &str,
        kind: SecretKind,
    ) -> Result<Option<String>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let row = ynab_config.find(user_id);

        let value = match kind {
            SecretKind::ApiToken => {
                row.select(ynab_config_fields::encrypted_api_token)
                    .first::<Option<String>>(&mut conn)
                    .await
            }
            SecretKind::BudgetId => {
                row.select(ynab_config_fields::encrypted_budget_id)
                    .first::<Option<String>>(&mut conn)
                    .await
            }
            SecretKind::AccountId => {
                row.select(ynab_config_fields::encrypted_account_id)
                    .first::<Option<String>>(&mut conn)
                    .await
            }
        };

        Ok(value.optional()?.flatten())
    }
}

#[async_trait]
impl SyncStore for Dao {
    async fn get_legacy_settings(
        &self,
        user_id: &str,
    ) -> Result<Option<UserYnabSettings>, DaoError> {
        Ok(user_ynab_settings
            .find(user_id)
            .first::<UserYnabSettings>(&mut self.db_async_pool.get().await?)
            .await
            .optional()?)
    }

    async fn replace_mirror(
        &self,
        user_id: &str,
        plan: &MirrorPlan,
        synced_at: SystemTime,
    ) -> Result<(), DaoError> {
        let new_groups = plan
            .groups
            .iter()
            .map(|g| NewYnabCategoryGroup {
                id: &g.id,
                name: &g.name,
                user_id,
                last_updated: synced_at,
            })
            .collect::<Vec<_>>();

        let new_categories = plan
            .categories
            .iter()
            .map(|c| NewYnabCategory {
                id: &c.id,
                group_id: &c.group_id,
                name: &c.name,
                user_id,
                last_updated: synced_at,
            })
            .collect::<Vec<_>>();

        let new_local_categories = plan
            .local_categories
            .iter()
            .map(|c| NewCategory {
                name: &c.name,
                description: Some(SYNCED_DESCRIPTION),
                user_id,
                color: Some(c.color),
            })
            .collect::<Vec<_>>();

        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    dsl::delete(ynab_categories.filter(ynab_category_fields::user_id.eq(user_id)))
                        .execute(conn)
                        .await?;

                    dsl::delete(ynab_category_groups.filter(ynab_group_fields::user_id.eq(user_id)))
                        .execute(conn)
                        .await?;

                    if !new_groups.is_empty() {
                        dsl::insert_into(ynab_category_groups)
                            .values(&new_groups)
                            .on_conflict((ynab_group_fields::id, ynab_group_fields::user_id))
                            .do_update()
                            .set((
                                ynab_group_fields::name.eq(excluded(ynab_group_fields::name)),
                                ynab_group_fields::last_updated
                                    .eq(excluded(ynab_group_fields::last_updated)),
                            ))
                            .execute(conn)
                            .await?;
                    }

                    if !new_categories.is_empty() {
                        dsl::insert_into(ynab_categories)
                            .values(&new_categories)
                            .on_conflict((ynab_category_fields::id, ynab_category_fields::user_id))
                            .do_update()
                            .set((
                                ynab_category_fields::group_id
                                    .eq(excluded(ynab_category_fields::group_id)),
                                ynab_category_fields::name.eq(excluded(ynab_category_fields::name)),
                                ynab_category_fields::last_updated
                                    .eq(excluded(ynab_category_fields::last_updated)),
                            ))
                            .execute(conn)
                            .await?;
                    }

                    if !new_local_categories.is_empty() {
                        dsl::insert_into(categories)
                            .values(&new_local_categories)
                            .on_conflict((category_fields::name, category_fields::user_id))
                            .do_update()
                            .set((
                                category_fields::description
                                    .eq(excluded(category_fields::description)),
                                category_fields::color.eq(sql::<Nullable<Text>>(
                                    "COALESCE(categories.color, excluded.color)",
                                )),
                            ))
                            .execute(conn)
                            .await?;
                    }

                    dsl::insert_into(ynab_config)
                        .values(&empty_config(user_id))
                        .on_conflict_do_nothing()
                        .execute(conn)
                        .await?;

                    dsl::update(ynab_config.find(user_id))
                        .set(ynab_config_fields::last_sync_time.eq(synced_at))
                        .execute(conn)
                        .await?;

                    dsl::update(user_ynab_settings.find(user_id))
                        .set(legacy_fields::last_synced.eq(synced_at))
                        .execute(conn)
                        .await?;

                    Ok(())
                })
            })
            .await
    }

    async fn mark_credentials_rejected(&self, user_id: &str) -> Result<(), DaoError> {
        dsl::update(ynab_config.find(user_id))
            .set(ynab_config_fields::has_credentials.eq(false))
            .execute(&mut self.db_async_pool.get().await?)
            .await?;

        Ok(())
    }

    async fn get_sync_candidate_user_ids(&self) -> Result<Vec<String>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let mut user_ids = user_ynab_settings
            .select(legacy_fields::user_id)
            .filter(legacy_fields::sync_enabled.eq(true))
            .load::<String>(&mut conn)
            .await?;

        user_ids.extend(
            ynab_config
                .select(ynab_config_fields::user_id)
                .filter(ynab_config_fields::has_credentials.eq(true))
                .load::<String>(&mut conn)
                .await?,
        );

        user_ids.sort();
        user_ids.dedup();

        Ok(user_ids)
    }

    async fn get_sync_status(&self, user_id: &str) -> Result<SyncStatus, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let config = ynab_config
            .select((
                ynab_config_fields::has_credentials,
                ynab_config_fields::last_sync_time,
                ynab_config_fields::sync_frequency,
            ))
            .find(user_id)
            .first::<(bool, Option<SystemTime>, i32)>(&mut conn)
            .await
            .optional()?;

        let legacy = user_ynab_settings
            .select((legacy_fields::sync_enabled, legacy_fields::last_synced))
            .find(user_id)
            .first::<(bool, Option<SystemTime>)>(&mut conn)
            .await
            .optional()?;

        Ok(SyncStatus {
            has_credentials: config.is_some_and(|(has_credentials, _, _)| has_credentials),
            sync_enabled: legacy.is_some_and(|(sync_enabled, _)| sync_enabled),
            last_sync_time: config
                .and_then(|(_, last_sync_time, _)| last_sync_time)
                .or_else(|| legacy.and_then(|(_, last_synced)| last_synced)),
            sync_frequency_mins: config.map(|(_, _, sync_frequency)| sync_frequency),
        })
    }

    async fn get_mirror(
        &self,
        user_id: &str,
    ) -> Result<Vec<(YnabCategoryGroup, Vec<YnabCategory>)>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let groups = ynab_category_groups
            .filter(ynab_group_fields::user_id.eq(user_id))
            .order(ynab_group_fields::name.asc())
            .load::<YnabCategoryGroup>(&mut conn)
            .await?;

        let mut categories_by_group: HashMap<String, Vec<YnabCategory>> = HashMap::new();
        for category in ynab_categories
            .filter(ynab_category_fields::user_id.eq(user_id))
            .order(ynab_category_fields::name.asc())
            .load::<YnabCategory>(&mut conn)
            .await?
        {
            categories_by_group
                .entry(category.group_id.clone())
                .or_default()
                .push(category);
        }

        Ok(groups
            .into_iter()
            .map(|g| {
                let group_categories = categories_by_group.remove(&g.id).unwrap_or_default();
                (g, group_categories)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::db::test_utils::{db_async_pool, insert_user};
    use crate::models::category::Category;
    use crate::sync::{PlannedCategory, PlannedGroup, PlannedLocalCategory};

    fn plan(group_id: &str, category_id: &str, category_name: &str) -> MirrorPlan {
        MirrorPlan {
            groups: vec![PlannedGroup {
                id: String::from(group_id),
                name: String::from("Bills"),
            }],
            categories: vec![PlannedCategory {
                id: String::from(category_id),
                group_id: String::from(group_id),
                name: String::from(category_name),
            }],
            local_categories: vec![PlannedLocalCategory {
                name: String::from(category_name),
                color: "#4e79a7",
            }],
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_secret_columns() {
        let dao = Dao::new(db_async_pool().await);
        let user_id = insert_user(None, "approved").await;

        assert_eq!(
            dao.read_secret_column(&user_id, SecretKind::ApiToken)
                .await
                .unwrap(),
            None
        );

        dao.write_secret_column(&user_id, SecretKind::BudgetId, "enc:abc")
            .await
            .unwrap();
        assert!(!dao.get_sync_status(&user_id).await.unwrap().has_credentials);

        dao.write_secret_column(&user_id, SecretKind::ApiToken, "enc:def")
            .await
            .unwrap();
        assert_eq!(
            dao.read_secret_column(&user_id, SecretKind::ApiToken)
                .await
                .unwrap()
                .as_deref(),
            Some("enc:def")
        );
        assert!(dao.get_sync_status(&user_id).await.unwrap().has_credentials);
        assert!(dao
            .get_sync_candidate_user_ids()
            .await
            .unwrap()
            .contains(&user_id));

        dao.mark_credentials_rejected(&user_id).await.unwrap();
        assert!(!dao.get_sync_status(&user_id).await.unwrap().has_credentials);
    }

    #[tokio::test]
    #[ignore]
    async fn test_replace_mirror_rewrites_rows_and_keeps_colors() {
        let dao = Dao::new(db_async_pool().await);
        let user_id = insert_user(None, "approved").await;

        let first_sync = SystemTime::now();
        dao.replace_mirror(&user_id, &plan("g1", "c1", "Rent"), first_sync)
            .await
            .unwrap();

        dsl::update(
            categories
                .filter(category_fields::user_id.eq(&user_id))
                .filter(category_fields::name.eq("Rent")),
        )
        .set(category_fields::color.eq("#000000"))
        .execute(&mut db_async_pool().await.get().await.unwrap())
        .await
        .unwrap();

        dao.replace_mirror(&user_id, &plan("g2", "c2", "Rent"), SystemTime::now())
            .await
            .unwrap();

        let mirror = dao.get_mirror(&user_id).await.unwrap();
        assert_eq!(mirror.len(), 1);
        assert_eq!(mirror[0].0.id, "g2");
        assert_eq!(mirror[0].1.len(), 1);
        assert_eq!(mirror[0].1[0].id, "c2");

        let local = categories
            .filter(category_fields::user_id.eq(&user_id))
            .load::<Category>(&mut db_async_pool().await.get().await.unwrap())
            .await
            .unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].color.as_deref(), Some("#000000"));
        assert_eq!(local[0].description.as_deref(), Some(SYNCED_DESCRIPTION));

        let status = dao.get_sync_status(&user_id).await.unwrap();
        assert!(status.last_sync_time.unwrap() >= first_sync - Duration::from_secs(1));
    }
}
