// Posts module - the board surface: creation with quotas, listing,
// editing, admin deletion.

pub mod post_models;
pub mod post_service;

pub use post_models::*;
pub use post_service::*;
