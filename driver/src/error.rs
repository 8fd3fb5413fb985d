use thiserror::Error;
use ticklog_shared::Age;

use crate::log_service::LogError;

/// Errors surfaced through the driver's error channel.
///
/// Protocol misuse (calling an operation in a state that forbids it) is
/// reported synchronously as an `Err`; failures of asynchronous log-service
/// requests are collected and drained via `GameDriver::take_errors`.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("a storage-carrying tick request is already in flight")]
    StorageRequestInFlight,
    #[error("cannot move the generator to age {0} while waiting for storage")]
    SetNextAgeWhileWaitingStorage(Age),
    #[error("cannot force a tick while waiting for storage")]
    ForceTickWhileWaitingStorage,
    #[error("operation requires the active role")]
    NotActive,
    #[error("driver is not authenticated")]
    NotAuthenticated,
    #[error("zeroth start point is missing or malformed")]
    BrokenZerothStartPoint,
    #[error("log service: {0}")]
    Log(#[from] LogError),
}
