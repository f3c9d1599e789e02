pub mod decimal_serde;
pub mod retry;
pub mod time_utils;

pub use retry::{with_retry, RetryPolicy};
