//! Bounded retry for write conflicts.
//!
//! # Responsibility
//! - Re-run an idempotent write when SQLite reports a transient conflict
//!   (busy/locked database, or a uniqueness race lost to another writer).
//! - Convert exhausted retries into [`RepoError::Conflict`].
//!
//! # Invariants
//! - The wrapped closure must be idempotent: every attempt opens and
//!   commits (or rolls back) its own transaction.
//! - At most [`MAX_WRITE_ATTEMPTS`] attempts are made.

use crate::db::DbError;
use crate::repo::entry_repo::{RepoError, RepoResult};
use log::{debug, warn};
use rusqlite::ErrorCode;
use std::time::Duration;

/// Upper bound on attempts for one conflicting write.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(15);

/// Runs `op` until it succeeds, fails permanently, or exhausts attempts.
pub fn with_conflict_retry<T>(
    operation: &'static str,
    mut op: impl FnMut() -> RepoResult<T>,
) -> RepoResult<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(err) if is_transient_conflict(&err) => {
                if attempt >= MAX_WRITE_ATTEMPTS {
                    warn!(
                        "event=write_conflict module=repo status=exhausted operation={} attempts={} error={}",
                        operation, attempt, err
                    );
                    return Err(RepoError::Conflict {
                        operation,
                        attempts: attempt,
                    });
                }
                debug!(
                    "event=write_conflict module=repo status=retry operation={} attempt={} error={}",
                    operation, attempt, err
                );
                std::thread::sleep(BASE_BACKOFF * attempt);
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Whether `err` is a conflict that a fresh attempt may resolve.
pub fn is_transient_conflict(err: &RepoError) -> bool {
    let RepoError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))) = err else {
        return false;
    };
    match failure.code {
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => true,
        ErrorCode::ConstraintViolation => matches!(
            failure.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_transient_conflict, with_conflict_retry, MAX_WRITE_ATTEMPTS};
    use crate::db::DbError;
    use crate::repo::entry_repo::RepoError;
    use std::cell::Cell;

    fn sqlite_failure(code: i32) -> RepoError {
        RepoError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            None,
        )))
    }

    #[test]
    fn busy_and_unique_violations_are_transient() {
        assert!(is_transient_conflict(&sqlite_failure(
            rusqlite::ffi::SQLITE_BUSY
        )));
        assert!(is_transient_conflict(&sqlite_failure(
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )));
        assert!(!is_transient_conflict(&sqlite_failure(
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        )));
        assert!(!is_transient_conflict(&RepoError::InvalidInput(
            "x".to_string()
        )));
    }

    #[test]
    fn retry_gives_up_after_bounded_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), RepoError> = with_conflict_retry("test_op", || {
            calls.set(calls.get() + 1);
            Err(sqlite_failure(rusqlite::ffi::SQLITE_BUSY))
        });

        assert_eq!(calls.get(), MAX_WRITE_ATTEMPTS);
        assert!(matches!(
            result,
            Err(RepoError::Conflict {
                operation: "test_op",
                attempts: MAX_WRITE_ATTEMPTS
            })
        ));
    }

    #[test]
    fn retry_returns_first_success() {
        let calls = Cell::new(0);
        let value = with_conflict_retry("test_op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED))
            } else {
                Ok(7)
            }
        })
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.get(), 2);
    }
}
