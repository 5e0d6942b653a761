use async_trait::async_trait;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::category::Category;

use crate::schema::categories as category_fields;
use crate::schema::categories::dsl::categories;

#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    async fn get_categories_for_owners(
        &self,
        owner_ids: &[String],
    ) -> Result<Vec<Category>, DaoError>;
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
impl CategoryDirectory for Dao {
    async fn get_categories_for_owners(
        &self,
        owner_ids: &[String],
    ) -> Result<Vec<Category>, DaoError> {
        Ok(categories
            .filter(category_fields::user_id.eq_any(owner_ids))
            .order((category_fields::user_id.asc(), category_fields::name.asc()))
            .load::<Category>(&mut self.db_async_pool.get().await?)
            .await?)
    }
}
