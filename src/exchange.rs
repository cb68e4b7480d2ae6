//! STS token exchange.

use std::{fmt, time::Duration};

use aws_config::{BehaviorVersion, Region, retry::RetryConfig, timeout::TimeoutConfig};
use aws_sdk_sts::{Client, config::Credentials, error::DisplayErrorContext, types};
use aws_smithy_types::DateTime;
use log::debug;

use crate::{credentials::Identity, error::MfaError};

/// Fields shared by both exchange operations.
#[derive(Clone)]
pub struct ExchangeRequest {
    /// Long-lived key pair that signs the request.
    pub identity: Identity,
    /// Region of the STS endpoint.
    pub region: String,
    pub duration: u32,
    pub mfa_serial: String,
    pub mfa_code: String,
}

impl fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeRequest")
            .field("identity", &self.identity)
            .field("region", &self.region)
            .field("duration", &self.duration)
            .field("mfa_serial", &self.mfa_serial)
            .finish_non_exhaustive()
    }
}

/// Role to assume and the session name to tag it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTarget {
    pub role_arn: String,
    pub session_name: String,
}

/// Credentials exactly as STS handed them back.
#[derive(Clone)]
pub struct IssuedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime,
}

impl From<&types::Credentials> for IssuedCredentials {
    fn from(credentials: &types::Credentials) -> Self {
        Self {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration: *credentials.expiration(),
        }
    }
}

/// The two STS operations that accept an MFA code.
pub trait TokenExchange {
    async fn get_session_token(
        &self,
        request: &ExchangeRequest,
    ) -> Result<IssuedCredentials, MfaError>;

    async fn assume_role(
        &self,
        request: &ExchangeRequest,
        role: &RoleTarget,
    ) -> Result<IssuedCredentials, MfaError>;
}

/// [`TokenExchange`] backed by the AWS SDK.
///
/// Each call is a single round-trip: retries are disabled because an MFA code cannot be
/// replayed, and the whole operation is bounded by `timeout`.
pub struct StsExchangeClient {
    timeout: Duration,
}

impl StsExchangeClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn client(&self, request: &ExchangeRequest) -> Client {
        let Identity {
            access_key_id,
            secret_access_key,
            session_token,
            ..
        } = &request.identity;
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            session_token.clone(),
            None,
            "aws-mfa-session",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(request.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(self.timeout)
                    .build(),
            )
            .load()
            .await;

        Client::new(&config)
    }
}

impl TokenExchange for StsExchangeClient {
    async fn get_session_token(
        &self,
        request: &ExchangeRequest,
    ) -> Result<IssuedCredentials, MfaError> {
        const OPERATION: &str = "GetSessionToken";
        debug!("{OPERATION} in {} for {}", request.region, request.identity.name);

        let output = self
            .client(request)
            .await
            .get_session_token()
            .duration_seconds(duration_seconds(request.duration))
            .serial_number(&request.mfa_serial)
            .token_code(&request.mfa_code)
            .send()
            .await
            .map_err(|err| rejected(OPERATION, DisplayErrorContext(&err)))?;

        output
            .credentials()
            .map(IssuedCredentials::from)
            .ok_or_else(|| rejected(OPERATION, "no credentials returned"))
    }

    async fn assume_role(
        &self,
        request: &ExchangeRequest,
        role: &RoleTarget,
    ) -> Result<IssuedCredentials, MfaError> {
        const OPERATION: &str = "AssumeRole";
        debug!("{OPERATION} {} as {}", role.role_arn, role.session_name);

        let output = self
            .client(request)
            .await
            .assume_role()
            .role_arn(&role.role_arn)
            .role_session_name(&role.session_name)
            .duration_seconds(duration_seconds(request.duration))
            .serial_number(&request.mfa_serial)
            .token_code(&request.mfa_code)
            .send()
            .await
            .map_err(|err| rejected(OPERATION, DisplayErrorContext(&err)))?;

        output
            .credentials()
            .map(IssuedCredentials::from)
            .ok_or_else(|| rejected(OPERATION, "no credentials returned"))
    }
}

fn duration_seconds(duration: u32) -> i32 {
    i32::try_from(duration).unwrap_or(i32::MAX)
}

fn rejected(operation: &'static str, message: impl fmt::Display) -> MfaError {
    MfaError::Exchange {
        operation,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_credentials_copy_sts_fields() {
        let sts = types::Credentials::builder()
            .access_key_id("ASIAEXAMPLE")
            .secret_access_key("abc")
            .session_token("xyz")
            .expiration(DateTime::from_secs(1_704_067_200))
            .build()
            .expect("complete credentials");

        let issued = IssuedCredentials::from(&sts);
        assert_eq!(issued.access_key_id, "ASIAEXAMPLE");
        assert_eq!(issued.secret_access_key, "abc");
        assert_eq!(issued.session_token, "xyz");
        assert_eq!(issued.expiration, DateTime::from_secs(1_704_067_200));
    }

    #[test]
    fn oversized_duration_saturates() {
        assert_eq!(duration_seconds(3600), 3600);
        assert_eq!(duration_seconds(u32::MAX), i32::MAX);
    }

    #[test]
    fn request_debug_omits_code_and_secret() {
        let request = ExchangeRequest {
            identity: Identity {
                name: "default".into(),
                access_key_id: "AKIA".into(),
                secret_access_key: "long-term-secret".into(),
                session_token: None,
            },
            region: "us-east-1".into(),
            duration: 3600,
            mfa_serial: "arn:aws:iam::111111111111:mfa/alice".into(),
            mfa_code: "123456".into(),
        };

        let rendered = format!("{request:?}");
        assert!(rendered.contains("mfa/alice"));
        assert!(!rendered.contains("123456"));
        assert!(!rendered.contains("long-term-secret"));
    }

    #[test]
    fn rejection_keeps_service_message() {
        let err = rejected("AssumeRole", "AccessDenied: MultiFactorAuthentication failed");
        assert_eq!(
            err.to_string(),
            "AssumeRole failed: AccessDenied: MultiFactorAuthentication failed"
        );
        assert_eq!(err.exit_status(), 2);
    }
}
