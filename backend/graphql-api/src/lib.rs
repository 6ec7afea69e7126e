//! Storefront GraphQL API
//! Re-exports modules for testing and integration

pub mod bus;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;
pub mod security;
