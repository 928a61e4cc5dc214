//! Caching layer for the server.
//!
//! [`CacheClient`] is the single entry point: it owns the optional
//! connection to the backing [`CacheStore`] and turns every operation into a
//! no-op when caching is not configured. Redis is the production backend;
//! [`MemoryStore`] provides the same semantics in process.

pub mod client;
pub mod keys;
pub mod memory;
pub mod redis;
pub mod store;

pub use client::CacheClient;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;
pub use store::{CacheError, CacheResult, CacheStore};
