// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the Keyward credential vault.
//!
//! - [`retry`]: one bounded-retry combinator shared by document loads, saves,
//!   and the consistency guard's re-fetch rung.
//! - [`timer`]: keyed, cancellable delayed actions used for cache expiry.
//!
//! Nothing in here retries forever: every loop is bounded by a
//! [`RetryPolicy`] attempt count.

pub mod retry;
pub mod timer;

pub use retry::{retry, Backoff, Retried, RetryExhausted, RetryPolicy};
pub use timer::DelayedTasks;
