// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Retry, backoff and cooldown policy wrapping every provider call.
//!
//! Every network-backed [`crate::provider::Provider`] call goes through a single
//! [`NetworkPolicy`] instance per provider, so that a streak of transient failures both retries
//! with exponential backoff *and* trips a cooldown that fails fast for subsequent calls until it
//! expires, instead of hammering a provider that is clearly down.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Cooldown window applied after a provider exhausts its retry budget.
const COOLDOWN: Duration = Duration::from_secs(30);

/// Shared retry/backoff/cooldown state for one provider.
pub struct NetworkPolicy {
    /// Name used in log messages and [`crate::error::Error::ProviderCooldown`].
    name: &'static str,
    /// Maximum number of attempts per call (including the first).
    max_attempts: u32,
    /// Base backoff delay; the actual delay before attempt `n` is `base * 2^(n-1)`.
    base_backoff: Duration,
    /// Instant until which calls should fail fast without attempting the network, if any.
    disabled_until: Mutex<Option<Instant>>,
}

impl NetworkPolicy {
    /// Create a policy for a named provider.
    #[must_use]
    pub fn new(name: &'static str, max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            name,
            max_attempts: max_attempts.max(1),
            base_backoff,
            disabled_until: Mutex::new(None),
        }
    }

    /// Whether the provider is currently in its cooldown window.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        let guard = self.disabled_until.lock().expect("retry mutex poisoned");
        matches!(*guard, Some(until) if Instant::now() < until)
    }

    fn trip_cooldown(&self) {
        let mut guard = self.disabled_until.lock().expect("retry mutex poisoned");
        *guard = Some(Instant::now() + COOLDOWN);
    }

    /// Run `operation`, retrying transient failures with exponential backoff up to
    /// `max_attempts` times, and tripping the cooldown if every attempt fails.
    ///
    /// If the provider is currently in its cooldown window, the operation is not attempted at
    /// all and [`crate::error::Error::ProviderCooldown`] is returned immediately.
    pub async fn call<T, E, F, Fut>(&self, mut operation: F) -> Result<T, crate::error::Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if self.is_disabled() {
            return Err(crate::error::Error::ProviderCooldown(self.name));
        }

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    last_error = err.to_string();
                    warn!(
                        "provider {} attempt {}/{} failed: {}",
                        self.name, attempt, self.max_attempts, last_error
                    );
                    if attempt < self.max_attempts {
                        let delay = self.base_backoff * 2u32.pow(attempt - 1);
                        debug!("retrying {} in {:?}", self.name, delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.trip_cooldown();
        Err(crate::error::Error::ProviderLookupFailed {
            provider: self.name,
            reason: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_on_first_try() {
        let policy = NetworkPolicy::new("test", 3, Duration::from_millis(1));
        let result: Result<u32, crate::error::Error> =
            policy.call(|| async { Ok::<u32, &str>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let policy = NetworkPolicy::new("test", 3, Duration::from_millis(1));
        let attempts = AtomicU32::new(0);
        let result = policy
            .call(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(7u32)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_trips_cooldown_after_exhausting_retries() {
        let policy = NetworkPolicy::new("test", 2, Duration::from_millis(1));
        let result: Result<u32, crate::error::Error> =
            policy.call(|| async { Err::<u32, &str>("down") }).await;
        assert!(result.is_err());
        assert!(policy.is_disabled());

        let second: Result<u32, crate::error::Error> =
            policy.call(|| async { Ok::<u32, &str>(1) }).await;
        assert!(matches!(
            second,
            Err(crate::error::Error::ProviderCooldown("test"))
        ));
    }
}
