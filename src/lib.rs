pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod handlers;
pub mod lookup;
pub mod middleware;
pub mod models;
pub mod pdf;
pub mod report;
pub mod services;
pub mod utils;

// Note: avoid glob re-exports to prevent ambiguous symbol re-exports
// Consumers should reference items through their module paths, e.g.:
// `crate::models::Registration` or `crate::services::RegistrationService`.
