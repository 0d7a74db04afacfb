pub mod api;
pub mod clients;
pub mod config;
pub mod models;
pub mod rate_limiter;
pub mod service;
pub mod store;
pub mod utils;
pub mod worker;
