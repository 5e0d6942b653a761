use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::schema::ynab_categories;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = ynab_categories, primary_key(id, user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct YnabCategory {
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub user_id: String,
    pub last_updated: SystemTime,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = ynab_categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewYnabCategory<'a> {
    pub id: &'a str,
    pub group_id: &'a str,
    pub name: &'a str,
    pub user_id: &'a str,
    pub last_updated: SystemTime,
}
