//! Runtime abstraction for process-level operations.
//!
//! Environment lookups, the wall clock and sleeping go through [`Runtime`]
//! so configuration loading, token expiry and retry waits can be driven
//! from tests.
//!
//! # Structure
//!
//! - `env` - Environment variables
//! - `clock` - Wall-clock time and sleeping

mod clock;
mod env;

use async_trait::async_trait;
use std::env as std_env;
use std::time::{Duration, SystemTime};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    // Time
    fn now(&self) -> SystemTime;

    /// Suspend the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealRuntime;

#[async_trait]
impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn now(&self) -> SystemTime {
        self.now_impl()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleep_impl(duration).await
    }
}
