use diesel::Queryable;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::schema::user_ynab_settings;

/// Flat per-user credential row that predates `ynab_config`. Values may be raw or carry the
/// `enc:` marker.
#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = user_ynab_settings, primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserYnabSettings {
    pub user_id: String,
    pub token: Option<String>,
    pub budget_id: Option<String>,
    pub account_id: Option<String>,
    pub sync_enabled: bool,
    pub last_synced: Option<SystemTime>,
}
