pub mod analytics;
pub mod config;
pub mod data_provider;
pub mod error;
pub mod local_store;
pub mod model;
pub mod remote_store;
pub mod report;
