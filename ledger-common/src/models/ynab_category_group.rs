use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::schema::ynab_category_groups;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = ynab_category_groups, primary_key(id, user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct YnabCategoryGroup {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub last_updated: SystemTime,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = ynab_category_groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewYnabCategoryGroup<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub user_id: &'a str,
    pub last_updated: SystemTime,
}
