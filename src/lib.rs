pub mod api;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod events;
pub mod payments;
