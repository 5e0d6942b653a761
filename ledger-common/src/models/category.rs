use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::schema::categories;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub user_id: String,
    pub color: Option<String>,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub user_id: &'a str,
    pub color: Option<&'a str>,
}
