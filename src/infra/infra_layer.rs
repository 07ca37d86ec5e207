// The infra module contains implementations of core traits.

#[path = "store/store_layer.rs"]
pub mod store;
