pub mod category;
pub mod permission;
pub mod user;
pub mod user_ynab_settings;
pub mod ynab_category;
pub mod ynab_category_group;
pub mod ynab_config;
