pub mod cache;
pub mod config;
pub mod http;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod service;
pub mod store;
pub mod synthetic;
pub mod utils;
