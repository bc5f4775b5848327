//! Environment-based tuning for the coroutine runtime.
//!
//! `MIMICD_STACK_SIZE` sets the stack size used for request coroutines.
//! Accepts decimal (`16384`) or hex (`0x4000`) values; defaults to 16 KB.
//! Memory cost is `stack_size × concurrent requests`, so tune this down for
//! very high concurrency and up if deep schema recursion overflows.

use std::env;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for request coroutines in bytes (default: 16 KB / 0x4000)
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stack_size = match env::var("MIMICD_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x4000)
                } else {
                    val.parse().unwrap_or(0x4000)
                }
            }
            Err(_) => 0x4000,
        };
        RuntimeConfig { stack_size }
    }

    /// Apply the configuration to the global `may` runtime.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
    }
}
