//! Chaotic vault wrapper for fault injection testing.
//!
//! Delegates to an underlying vault but randomly fails operations with
//! [`VaultError::Unavailable`] based on a configured failure rate. Used by
//! chaos tests to verify that callers handle storage failures gracefully and
//! that no failure ever leaves a partial state (entry moved without its
//! counter, or vice versa).

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]
#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::sync::{Arc, Mutex};

use aqm_core::{Tier, VaultEntry, VaultStats};
use bytes::Bytes;

use super::VaultStore;
use crate::error::VaultError;

/// Vault wrapper that randomly injects `Unavailable` failures.
///
/// Failures are injected *before* delegation, so a failed operation never
/// touches the inner store — mirroring a connection that dropped before the
/// transaction was issued. Uses `Arc<Mutex<_>>` for the RNG state, making it
/// `Clone` and thread-safe.
#[derive(Clone)]
pub struct ChaoticVault<V: VaultStore> {
    inner: V,
    /// Failure rate (0.0 = never fail, 1.0 = always fail).
    failure_rate: f64,
    /// RNG state for deterministic chaos.
    rng: Arc<Mutex<ChaoticRng>>,
}

/// Simple deterministic RNG for chaos injection.
///
/// Linear congruential generator so chaos runs are reproducible with the
/// same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0).
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<V: VaultStore> ChaoticVault<V> {
    /// Wrap `inner` with the given failure rate and a fixed default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0].
    pub fn new(inner: V, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0].
    pub fn with_seed(inner: V, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self { inner, failure_rate, rng: Arc::new(Mutex::new(ChaoticRng::new(seed))) }
    }

    /// Underlying vault (for checking invariants after chaos).
    pub fn inner(&self) -> &V {
        &self.inner
    }

    fn maybe_fail(&self, operation: &str) -> Result<(), VaultError> {
        let should_fail =
            self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;
        if should_fail {
            return Err(VaultError::Unavailable(format!("chaotic failure injection: {operation}")));
        }
        Ok(())
    }
}

impl<V: VaultStore> VaultStore for ChaoticVault<V> {
    fn store_key(
        &self,
        key_id: &str,
        tier: Tier,
        encrypted_blob: Bytes,
        iv: Bytes,
        auth_tag: Bytes,
        coin_version: &str,
    ) -> Result<(), VaultError> {
        self.maybe_fail("store_key")?;
        self.inner.store_key(key_id, tier, encrypted_blob, iv, auth_tag, coin_version)
    }

    fn fetch_key(&self, key_id: &str) -> Result<Option<VaultEntry>, VaultError> {
        self.maybe_fail("fetch_key")?;
        self.inner.fetch_key(key_id)
    }

    fn burn_key(&self, key_id: &str) -> Result<(), VaultError> {
        self.maybe_fail("burn_key")?;
        self.inner.burn_key(key_id)
    }

    fn exists(&self, key_id: &str) -> Result<bool, VaultError> {
        self.maybe_fail("exists")?;
        self.inner.exists(key_id)
    }

    fn count_active(&self, tier: Option<Tier>) -> Result<u64, VaultError> {
        self.maybe_fail("count_active")?;
        self.inner.count_active(tier)
    }

    fn active_key_ids(&self, tier: Option<Tier>) -> Result<Vec<String>, VaultError> {
        self.maybe_fail("active_key_ids")?;
        self.inner.active_key_ids(tier)
    }

    fn purge_expired(&self, max_age_days: u32) -> Result<u64, VaultError> {
        self.maybe_fail("purge_expired")?;
        self.inner.purge_expired(max_age_days)
    }

    fn stats(&self) -> Result<VaultStats, VaultError> {
        self.maybe_fail("stats")?;
        self.inner.stats()
    }
}
