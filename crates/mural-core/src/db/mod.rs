//! Local storage for Mural

mod cache;
mod connection;
mod migrations;

pub use cache::LocalCache;
pub use connection::Database;
