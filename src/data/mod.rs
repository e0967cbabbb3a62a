//! Data layer module
//!
//! Handles user persistence:
//! - SQLite database operations
//! - The `UserStore` lookup used by session refresh

mod database;
mod models;
mod store;

pub use database::Database;
pub use models::*;
pub use store::UserStore;

#[cfg(test)]
pub use store::MockUserStore;
