// Storage adapters. Each one backs every core port with the same logical
// document model, so a single instance can serve the whole `Forum`.
#![allow(unused_imports)]

pub mod in_memory;
pub mod sqlite_store;

// Re-export for convenience
pub use in_memory::MemoryForumStore;
pub use sqlite_store::SqliteForumStore;
