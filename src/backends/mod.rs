// src/backends/mod.rs
//! Production implementations of the health probe seams.
mod cache;
mod postgres;
mod redis;

pub use self::cache::{create_cache_store, MemoryStore, NullStore};
pub use self::postgres::PostgresProbe;
pub use self::redis::{RedisCacheStore, RedisProbe};
