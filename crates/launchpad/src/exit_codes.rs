//! Exit codes for the CLI

use launchpad_core::{ErrorKind, LaunchpadError};

/// Success
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Credentials missing, invalid or revoked
pub const AUTH_ERROR: i32 = 3;

/// Tenant must accept updated agreements
pub const AGREEMENT_MISSING: i32 = 4;

/// Invalid input
pub const VALIDATION_ERROR: i32 = 5;

/// Local state does not allow the operation
pub const PRECONDITION_FAILED: i32 = 6;

/// Record not found locally or remotely
pub const NOT_FOUND: i32 = 7;

/// Conflicting remote or local state, or the app is busy
pub const CONFLICT: i32 = 8;

/// Remote call did not finish in time
pub const TIMEOUT: i32 = 9;

/// Remote API failure
pub const REMOTE_ERROR: i32 = 10;

/// Local state could not be read or written
pub const STORAGE_ERROR: i32 = 11;

/// Some apps in a batch failed
pub const PARTIAL_FAILURE: i32 = 12;

/// User cancelled
#[allow(dead_code)]
pub const CANCELLED: i32 = 130;

/// Exit code for an error kind
pub fn for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Auth => AUTH_ERROR,
        ErrorKind::AgreementMissing => AGREEMENT_MISSING,
        ErrorKind::NotFound => NOT_FOUND,
        ErrorKind::Conflict => CONFLICT,
        ErrorKind::Validation => VALIDATION_ERROR,
        ErrorKind::Precondition => PRECONDITION_FAILED,
        ErrorKind::Timeout => TIMEOUT,
        ErrorKind::RemoteApi => REMOTE_ERROR,
        ErrorKind::Storage => STORAGE_ERROR,
        ErrorKind::Config => CONFIG_ERROR,
    }
}

/// Exit code for a command failure
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<LaunchpadError>() {
        Some(err) => for_kind(err.kind()),
        None => ERROR,
    }
}
