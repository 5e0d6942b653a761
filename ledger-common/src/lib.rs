#![cfg(not(doctest))]

#[macro_use]
extern crate diesel;

pub mod db;
pub mod env;
pub mod error;
pub mod models;
pub mod permissions;
pub mod schema;
pub mod secrets;
pub mod sync;
pub mod ynab;

#[cfg(any(test, feature = "test-util"))]
pub mod test_stores;
