//! The balance write path.
//!
//! Every change to a balance row goes through [`BalanceLedger`]: read the
//! row (zero when absent), apply the change to a copy, write it back with
//! the version that was read, and retry if another writer got there first.

use rust_decimal::Decimal;
use stockledger_core::{BalanceKey, BalanceRecord, Bucket, DeltaPolicy, LedgerResult};
use tracing::debug;

use crate::retry::{retry_on_conflict, DEFAULT_MAX_WRITE_ATTEMPTS};
use crate::BalanceStore;

/// Race-free balance primitives over a [`BalanceStore`].
pub struct BalanceLedger<'a, S: ?Sized> {
    store: &'a S,
    max_write_attempts: u32,
}

impl<'a, S: BalanceStore + ?Sized> BalanceLedger<'a, S> {
    /// Ledger over a store with the default retry budget.
    pub const fn new(store: &'a S) -> Self {
        Self {
            store,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    /// Set how many version races a write may lose before giving up.
    #[must_use]
    pub const fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts;
        self
    }

    /// Current row; an all-zero row when the key was never written.
    pub fn get(&self, key: &BalanceKey) -> LedgerResult<BalanceRecord> {
        Ok(self
            .store
            .get_balance(key)?
            .unwrap_or_else(|| BalanceRecord::zero(key.clone())))
    }

    /// Add a signed delta to one bucket of a row, creating the row if needed.
    ///
    /// Under [`DeltaPolicy::Strict`] a delta that would leave the bucket
    /// negative fails with `InsufficientBalance` and nothing is written.
    pub fn apply_delta(
        &self,
        key: &BalanceKey,
        bucket: Bucket,
        delta: Decimal,
        policy: DeltaPolicy,
    ) -> LedgerResult<BalanceRecord> {
        let written = self.update(key, |row| row.apply_delta(bucket, delta, policy))?;
        debug!(
            target: "stockledger::store",
            key = %key,
            bucket = bucket.code(),
            %delta,
            balance = %written.balance_quantity,
            "applied delta"
        );
        Ok(written)
    }

    /// Move quantity between two buckets of the same row.
    pub fn move_bucket(
        &self,
        key: &BalanceKey,
        from: Bucket,
        to: Bucket,
        quantity: Decimal,
    ) -> LedgerResult<BalanceRecord> {
        let written = self.update(key, |row| row.move_bucket(from, to, quantity))?;
        debug!(
            target: "stockledger::store",
            key = %key,
            from = from.code(),
            to = to.code(),
            %quantity,
            "moved between buckets"
        );
        Ok(written)
    }

    fn update(
        &self,
        key: &BalanceKey,
        change: impl Fn(&mut BalanceRecord) -> LedgerResult<()>,
    ) -> LedgerResult<BalanceRecord> {
        retry_on_conflict("balance write", self.max_write_attempts, || {
            let mut row = self.get(key)?;
            change(&mut row)?;
            self.store.put_balance(row)
        })
    }
}
