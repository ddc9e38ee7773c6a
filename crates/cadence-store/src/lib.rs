pub mod activities;
pub mod database;
pub mod error;
pub mod row_helpers;
pub mod schema;

pub use activities::{ActivityFilter, ActivityRepo};
pub use database::Database;
pub use error::StoreError;
