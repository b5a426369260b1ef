//! Classification and bounded retry of contended write transactions.

use std::future::Future;

use armory_core::ledger::StockError;
use armory_core::retry::RetryPolicy;
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, RuntimeErr, SqlErr};
use tracing::warn;

/// SQLSTATE codes that mean "try the same transaction again".
const RETRYABLE_SQLSTATES: [&str; 3] = [
    // serialization_failure
    "40001",
    // deadlock_detected
    "40P01",
    // lock_not_available (lock_timeout expired)
    "55P03",
];

/// Error raised inside one write attempt.
#[derive(Debug, thiserror::Error)]
pub(crate) enum WriteError {
    /// Domain rejection; never retried.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Storage failure; retried when it is a lock conflict.
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Returns the SQLSTATE carried by a database error, if any.
pub(crate) fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => e,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx::Error::Database(db)) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Returns true if the SQLSTATE denotes a lock or serialization conflict.
pub(crate) fn is_contention_code(code: &str) -> bool {
    RETRYABLE_SQLSTATES.contains(&code)
}

/// Returns true if the error is a lock or serialization conflict.
pub(crate) fn is_contention(err: &DbErr) -> bool {
    sqlstate(err).is_some_and(|code| is_contention_code(&code))
}

/// Maps a non-retryable storage error into the ledger taxonomy.
pub(crate) fn db_error(err: DbErr) -> StockError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return StockError::CatalogConflict(detail);
    }
    StockError::Database(err.to_string())
}

/// Bounds how long statements in `txn` wait for row locks.
pub(crate) async fn set_lock_timeout(txn: &DatabaseTransaction, millis: u64) -> Result<(), DbErr> {
    txn.execute_unprepared(&format!("SET LOCAL lock_timeout = '{millis}ms'"))
        .await?;
    Ok(())
}

/// Runs `attempt` until it succeeds, fails for a non-contention reason, or the
/// policy's attempt budget runs out.
///
/// Each call to `attempt` must open and commit its own transaction so a failed
/// try leaves nothing behind.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, StockError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WriteError>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(WriteError::Stock(err)) => return Err(err),
            Err(WriteError::Db(err)) if is_contention(&err) => {
                if !policy.should_retry(tries) {
                    warn!(
                        operation,
                        attempts = tries,
                        error = %err,
                        "Giving up on contended write"
                    );
                    return Err(StockError::Contention { attempts: tries });
                }
                let delay = policy.delay_for(tries);
                warn!(
                    operation,
                    attempt = tries,
                    ?delay,
                    error = %err,
                    "Write contended, retrying"
                );
                tokio::time::sleep(delay).await;
                tries += 1;
            }
            Err(WriteError::Db(err)) => return Err(db_error(err)),
        }
    }
}
