//! Credential exchange orchestration.
//!
//! One invocation runs a single linear pipeline:
//! 1. Load the config and credentials stores
//! 2. Validate the target profile's MFA serial (and role ARN when assuming a role)
//! 3. Exchange the source identity plus MFA code for temporary credentials via STS
//! 4. Write the result to the `<profile>_mfa` section of the credentials file
//!
//! Every validation happens before the network call, so a rejected invocation never
//! touches STS or the credentials file.

use std::path::PathBuf;

use aws_smithy_types::date_time::Format;
use log::{debug, info, warn};

use crate::{
    credentials::{CredentialStore, TemporaryCredentialRecord},
    error::{MIN_DURATION_SECS, MfaError, ValidationError},
    exchange::{ExchangeRequest, IssuedCredentials, RoleTarget, TokenExchange},
    profile::ProfileStore,
};

/// Which STS operation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMode {
    /// `GetSessionToken` for the identity itself.
    SessionToken,
    /// `AssumeRole` into the target profile's `role_arn`.
    AssumeRole,
}

impl ExchangeMode {
    fn operation(self) -> &'static str {
        match self {
            ExchangeMode::SessionToken => "GetSessionToken",
            ExchangeMode::AssumeRole => "AssumeRole",
        }
    }
}

/// Locations of the shared config and credentials files.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub credentials: PathBuf,
    pub config: PathBuf,
}

/// Caller-validated parameters for one exchange.
#[derive(Clone)]
pub struct ExchangeParams {
    pub mode: ExchangeMode,
    /// Credentials section holding the long-lived key pair.
    pub identity: String,
    pub region: String,
    /// Profile whose `mfa_serial` / `role_arn` are used and whose name prefixes the output section.
    pub profile: String,
    pub duration: u32,
    pub mfa_code: String,
}

/// Outcome of a successful exchange.
#[derive(Debug)]
pub struct ExchangeSummary {
    /// Credentials section the record was stored under.
    pub section: String,
    pub record: TemporaryCredentialRecord,
    /// Set when the credentials were obtained but could not be written to disk.
    pub persist_error: Option<MfaError>,
}

/// Credentials section that receives the temporary credentials for `profile`.
pub fn mfa_section_name(profile: &str) -> String {
    format!("{profile}_mfa")
}

/// Role session name tagged onto assumed-role sessions for `profile`.
pub fn role_session_name(profile: &str) -> String {
    format!("{profile}_session_name")
}

/// Drives one MFA credential exchange against a [`TokenExchange`] backend.
pub struct CredentialUpdater<C> {
    paths: StorePaths,
    client: C,
}

impl<C: TokenExchange> CredentialUpdater<C> {
    pub fn new(paths: StorePaths, client: C) -> Self {
        Self { paths, client }
    }

    /// Runs the exchange and persists its result.
    ///
    /// # Errors
    ///
    /// * [`MfaError::ConfigLoad`] when either store cannot be read
    /// * [`MfaError::Validation`] for a missing MFA serial, missing role ARN, missing
    ///   identity keys, a too-short duration or an empty MFA code
    /// * [`MfaError::Exchange`] when STS rejects the request or returns incomplete credentials
    ///
    /// A failure to write the credentials file is not an error here: the summary still
    /// carries the usable credentials and reports the failure in `persist_error`.
    pub async fn run(&self, params: &ExchangeParams) -> Result<ExchangeSummary, MfaError> {
        let profiles = ProfileStore::load(&self.paths.config)?;
        let mut store = CredentialStore::load(&self.paths.credentials)?;

        let metadata = profiles.lookup(&params.profile);
        debug!("Profile {} in {}: {metadata:?}", metadata.name, profiles.path().display());
        if let Some(source) = &metadata.source_profile {
            debug!("Ignoring source_profile {source}; signing with identity {}", params.identity);
        }
        if metadata.mfa_serial.is_empty() {
            return Err(ValidationError::MissingMfaSerial {
                profile: params.profile.clone(),
            }
            .into());
        }

        let role = match params.mode {
            ExchangeMode::SessionToken => None,
            ExchangeMode::AssumeRole => {
                let role_arn = metadata.role_arn.clone().ok_or_else(|| {
                    ValidationError::MissingRoleArn {
                        profile: params.profile.clone(),
                    }
                })?;
                Some(RoleTarget {
                    role_arn,
                    session_name: role_session_name(&params.profile),
                })
            }
        };

        if params.duration < MIN_DURATION_SECS {
            return Err(ValidationError::DurationTooShort {
                duration: params.duration,
            }
            .into());
        }
        let mfa_code = params.mfa_code.trim();
        if mfa_code.is_empty() {
            return Err(ValidationError::EmptyMfaCode.into());
        }

        // AssumeRole goes to the identity's own region when it has one configured.
        let region = match role {
            Some(_) => profiles
                .lookup(&params.identity)
                .region
                .unwrap_or_else(|| params.region.clone()),
            None => params.region.clone(),
        };

        let request = ExchangeRequest {
            identity: store.identity(&params.identity)?,
            region,
            duration: params.duration,
            mfa_serial: metadata.mfa_serial,
            mfa_code: mfa_code.to_string(),
        };

        info!(
            "Requesting {} for profile {} - Duration: {}s",
            params.mode.operation(),
            params.profile,
            params.duration
        );
        let issued = match &role {
            Some(role) => self.client.assume_role(&request, role).await?,
            None => self.client.get_session_token(&request).await?,
        };
        let record = normalize(params.mode, issued)?;

        let section = mfa_section_name(&params.profile);
        if let Some(previous) = store.record(&section) {
            debug!("Replacing [{section}] holding {previous}");
        }
        store.upsert(&section, &record);

        let persist_error = match store.persist().await {
            Ok(()) => {
                info!("Saved {record} to [{section}] in {}", store.path().display());
                None
            }
            Err(err) => {
                warn!("{err}");
                Some(err)
            }
        };

        Ok(ExchangeSummary {
            section,
            record,
            persist_error,
        })
    }
}

fn normalize(
    mode: ExchangeMode,
    issued: IssuedCredentials,
) -> Result<TemporaryCredentialRecord, MfaError> {
    let incomplete = |field: &str| MfaError::Exchange {
        operation: mode.operation(),
        message: format!("response carried an empty or invalid `{field}`"),
    };

    let expiration = issued
        .expiration
        .fmt(Format::DateTime)
        .map_err(|_| incomplete("expiration"))?;

    TemporaryCredentialRecord::new(
        issued.access_key_id,
        issued.secret_access_key,
        issued.session_token,
        expiration,
    )
    .map_err(incomplete)
}
