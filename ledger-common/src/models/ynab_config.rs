use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::schema::ynab_config;

pub const DEFAULT_SYNC_FREQUENCY_MINS: i32 = 60;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = ynab_config, primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct YnabConfig {
    pub user_id: String,
    pub encrypted_api_token: Option<String>,
    pub encrypted_budget_id: Option<String>,
    pub encrypted_account_id: Option<String>,
    pub last_sync_time: Option<SystemTime>,
    pub sync_frequency: i32,
    pub has_credentials: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ynab_config, primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewYnabConfig<'a> {
    pub user_id: &'a str,
    pub encrypted_api_token: Option<&'a str>,
    pub encrypted_budget_id: Option<&'a str>,
    pub encrypted_account_id: Option<&'a str>,
    pub sync_frequency: i32,
    pub has_credentials: bool,
}
