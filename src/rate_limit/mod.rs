//! Per-source login attempt limiting.
//!
//! [`LoginRateLimiter`] keeps one [`AttemptRecord`] per source address in a
//! [`RateLimitStore`]. [`InMemoryStore`] is process-local; for several
//! instances behind a load balancer use a shared store such as
//! `SqliteRateLimitStore` (feature `sqlx_sqlite`) or your own implementation.

mod limiter;
mod store;

pub use limiter::{LoginRateLimiter, RateLimitStatus};
pub use store::{AttemptRecord, InMemoryStore, RateLimitStore};
