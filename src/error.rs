//! Error kinds surfaced by the credential exchange pipeline.
//!
//! Each kind maps to its own process exit status so scripted callers can tell a broken
//! local configuration apart from a rejected MFA code.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Minimum session duration accepted by STS, in seconds.
pub const MIN_DURATION_SECS: u32 = 900;

/// Exit status for failures that are not classified below (prompt I/O and the like).
pub const EXIT_GENERIC: u8 = 1;

/// Exit status for invalid input, whether rejected by flag parsing or by the pipeline.
pub const EXIT_VALIDATION: u8 = 4;

/// Failures of the credential exchange pipeline.
#[derive(Debug, Error)]
pub enum MfaError {
    /// The credentials or config store could not be located or parsed.
    #[error("Failed to load {kind} file {path}: {message}")]
    ConfigLoad {
        kind: &'static str,
        path: PathBuf,
        message: String,
    },
    /// Caller input or local configuration is unusable for the requested exchange.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// STS rejected the request or could not be reached.
    #[error("{operation} failed: {message}")]
    Exchange {
        operation: &'static str,
        message: String,
    },
    /// Temporary credentials were obtained but could not be written back to disk.
    #[error("Failed to write credentials file {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MfaError {
    /// Process exit status for this failure class.
    pub fn exit_status(&self) -> u8 {
        match self {
            MfaError::Exchange { .. } => 2,
            MfaError::ConfigLoad { .. } => 3,
            MfaError::Validation(_) => EXIT_VALIDATION,
            MfaError::Persistence { .. } => 5,
        }
    }
}

/// Validation failures detected before any network call is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Profile `{profile}` has no `mfa_serial` configured")]
    MissingMfaSerial { profile: String },
    #[error("Profile `{profile}` has no `role_arn` configured and cannot be used for role assumption")]
    MissingRoleArn { profile: String },
    #[error("Identity `{identity}` is missing `{field}` in the credentials file")]
    MissingIdentityField {
        identity: String,
        field: &'static str,
    },
    #[error("Duration {duration}s is below the minimum of {MIN_DURATION_SECS}s")]
    DurationTooShort { duration: u32 },
    #[error("MFA code must not be empty")]
    EmptyMfaCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_statuses_are_distinct_per_class() {
        let statuses = [
            MfaError::Exchange {
                operation: "GetSessionToken",
                message: "denied".into(),
            }
            .exit_status(),
            MfaError::ConfigLoad {
                kind: "config",
                path: PathBuf::from("/nowhere"),
                message: "missing".into(),
            }
            .exit_status(),
            MfaError::from(ValidationError::EmptyMfaCode).exit_status(),
            MfaError::Persistence {
                path: PathBuf::from("/nowhere"),
                source: io::Error::other("read-only"),
            }
            .exit_status(),
        ];

        for (i, status) in statuses.iter().enumerate() {
            assert_ne!(*status, 0);
            assert_ne!(*status, EXIT_GENERIC);
            assert!(!statuses[i + 1..].contains(status));
        }
    }

    #[test]
    fn validation_messages_name_the_profile() {
        let err = MfaError::from(ValidationError::MissingMfaSerial {
            profile: "work".into(),
        });
        assert_eq!(err.to_string(), "Profile `work` has no `mfa_serial` configured");

        let err = ValidationError::DurationTooShort { duration: 500 };
        assert_eq!(err.to_string(), "Duration 500s is below the minimum of 900s");
    }
}
