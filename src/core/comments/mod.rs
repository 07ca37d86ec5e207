// Comments module - single-slot commenting (one live comment per author per
// post). Following the same pattern as the voting module.

pub mod comment_models;
pub mod comment_service;

pub use comment_models::*;
pub use comment_service::*;
