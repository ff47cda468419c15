//! Failsafe mechanisms: bounded retry with backoff

mod retry;

pub use retry::{RetryPolicy, with_retry};
