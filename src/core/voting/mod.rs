// Voting module - one-vote-per-user tally keeping for posts and comments.

pub mod voting_models;
pub mod voting_service;

pub use voting_models::*;
pub use voting_service::*;
