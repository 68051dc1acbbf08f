pub mod client;
pub mod error;
pub mod file_cache;
pub mod methods;
pub mod service;

