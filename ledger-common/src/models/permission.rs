use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::schema::permissions;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = permissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Permission {
    pub id: i32,
    pub granted_user_id: String,
    pub owner_user_id: String,
    pub resource_type: String,
    pub permission_type: String,
    pub created_at: SystemTime,
    pub expires_at: Option<SystemTime>,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = permissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPermission<'a> {
    pub granted_user_id: &'a str,
    pub owner_user_id: &'a str,
    pub resource_type: &'a str,
    pub permission_type: &'a str,
    pub created_at: SystemTime,
    pub expires_at: Option<SystemTime>,
}
