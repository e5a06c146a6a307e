//! 弹性模式模块：为上游调用提供有界重试与退避。
//!
//! # Resilience Module
//!
//! Transient upstream failures (rate limits, 5xx, dropped connections) are masked by
//! re-issuing the same call a bounded number of times with a delay in between.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`retry::RetryPolicy`] | Attempt budget, delay and backoff shape |
//! | [`retry::RetryConfig`] | Serializable policy settings |
//! | [`retry::RetryState`] | Per-call attempt bookkeeping |
//! | [`retry::RetryReport`] | Result plus one record per attempt |
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_layers::resilience::retry::{Backoff, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(5))
//!     .with_backoff(Backoff::Exponential { max_delay: Duration::from_secs(30) });
//! assert_eq!(policy.delay_for(2), Duration::from_secs(10));
//! ```
//!
//! Cancellation is honored before each attempt, while an attempt is in flight and
//! during the backoff sleep. A cancelled call is never retried.

pub mod retry;

pub use retry::{Backoff, RetryConfig, RetryPolicy, RetryReport};
