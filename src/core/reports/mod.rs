// Reports module - abuse reporting, dedup and automatic escalation.

pub mod report_models;
pub mod report_service;

pub use report_models::*;
pub use report_service::*;
