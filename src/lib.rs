pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
