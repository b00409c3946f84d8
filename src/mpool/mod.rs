// Mpool module - WHAT IS WAITING
// In-memory pool of pending signed messages

mod pool;

pub use pool::{InsertOutcome, MessagePool, PoolError, PoolStats};
