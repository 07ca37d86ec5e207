// Accounts module - user documents, posting quotas, ban state.

pub mod account_models;
pub mod account_service;

pub use account_models::*;
pub use account_service::*;
