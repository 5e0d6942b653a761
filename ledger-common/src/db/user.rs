use async_trait::async_trait;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::user::User;

use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_users_by_ids(&self, user_ids: &[String]) -> Result<Vec<User>, DaoError>;
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
impl UserDirectory for Dao {
    async fn get_users_by_ids(&self, user_ids: &[String]) -> Result<Vec<User>, DaoError> {
        Ok(users
            .filter(user_fields::id.eq_any(user_ids))
            .order(user_fields::username.asc())
            .load::<User>(&mut self.db_async_pool.get().await?)
            .await?)
    }
}
