// Database layer module
// Read-only access to missions, drones and operators, plus the pools shared with the lock backends

pub mod pool;
pub mod redis;
pub mod repositories;

pub use pool::DbPool;
pub use redis::RedisPool;
