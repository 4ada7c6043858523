//! Optimistic-concurrency retry loop.

use stockledger_core::LedgerResult;
use tracing::warn;

/// Attempts made before a persistent conflict is surfaced.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 8;

/// Run a read-modify-write closure until it stops losing version races.
///
/// Only [`stockledger_core::LedgerError::ConcurrencyConflict`] is retried;
/// any other error is returned immediately. After `max_attempts` conflicts
/// the last conflict is returned.
pub fn retry_on_conflict<T>(
    what: &str,
    max_attempts: u32,
    mut attempt: impl FnMut() -> LedgerResult<T>,
) -> LedgerResult<T> {
    let max_attempts = max_attempts.max(1);
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt() {
            Err(err) if err.is_conflict() && tries < max_attempts => {
                warn!(target: "stockledger::store", %err, attempt = tries, "retrying {what}");
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::LedgerError;

    fn conflict() -> LedgerError {
        LedgerError::ConcurrencyConflict {
            key: "k".to_string(),
            expected: 1,
            actual: 2,
        }
    }

    #[test]
    fn test_retries_until_success() {
        let mut calls = 0;
        let result = retry_on_conflict("write", 5, || {
            calls += 1;
            if calls < 3 {
                Err(conflict())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: LedgerResult<()> = retry_on_conflict("write", 4, || {
            calls += 1;
            Err(conflict())
        });
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let mut calls = 0;
        let result: LedgerResult<()> = retry_on_conflict("write", 4, || {
            calls += 1;
            Err(LedgerError::UnknownBucket("X".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
