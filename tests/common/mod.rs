// tests/common/mod.rs

#![allow(unused_imports)]

pub use watchpool_test_utils::builders;
pub use watchpool_test_utils::fake_pool;
pub use watchpool_test_utils::{init_tracing, wait_until, with_timeout};
