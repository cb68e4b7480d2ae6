//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, error::ErrorKind};

use crate::{error::EXIT_VALIDATION, output::Shell};

/// AWS MFA session helper.
///
/// Exchanges the long-term keys of an identity in `~/.aws/credentials` plus an MFA code for
/// temporary credentials, either by assuming the role of a profile in `~/.aws/config`
/// (default) or by getting a session token for the user itself (`--user`). The result is
/// saved to the `[<profile>_mfa]` section of the credentials file.
///
/// Exit status: 0 success, 1 other failure, 2 rejected by STS, 3 config or credentials file
/// unreadable, 4 invalid flags, input or profile, 5 credentials obtained but not saved.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Get a session token for the user instead of assuming the profile's role
    #[arg(short, long)]
    pub user: bool,

    /// Credentials section holding the long-term keys
    #[arg(short, long, env = "AWS_MFA_IDENTITY", default_value = "default")]
    pub identity: String,

    /// Profile providing `mfa_serial` (and `role_arn` when assuming a role)
    #[arg(short, long, env = "AWS_MFA_PROFILE", default_value = "default")]
    pub profile: String,

    /// Region of the STS endpoint
    #[arg(short, long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Session duration in seconds (900-129600)
    #[arg(
        short,
        long,
        env = "AWS_SESSION_DURATION",
        default_value = "28800",
        value_parser = clap::value_parser!(u32).range(900..=129600)
    )]
    pub duration: u32,

    /// MFA code; prompted for when omitted
    #[arg(short = 't', long)]
    pub token: Option<String>,

    /// Path to AWS credentials file [default: ~/.aws/credentials]
    #[arg(short, long, env = "AWS_SHARED_CREDENTIALS_FILE")]
    pub credentials_path: Option<PathBuf>,

    /// Path to AWS config file [default: ~/.aws/config]
    #[arg(long, env = "AWS_CONFIG_FILE")]
    pub config_path: Option<PathBuf>,

    /// Timeout for the STS request in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Shell flavour of the printed export statements [default: detected from the host]
    #[arg(long, value_enum)]
    pub shell: Option<Shell>,
}

/// Exit status for a flag parsing failure, or `None` when clap is showing help or version
/// output and should exit on its own terms.
pub fn usage_exit_status(err: &clap::Error) -> Option<u8> {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => None,
        _ => Some(EXIT_VALIDATION),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn duration_below_minimum_is_refused() {
        assert!(Args::try_parse_from(["aws-mfa-session", "--duration", "500"]).is_err());
        let args = Args::try_parse_from(["aws-mfa-session", "-u", "-p", "work", "-d", "900"])
            .expect("valid args");
        assert!(args.user);
        assert_eq!(args.profile, "work");
        assert_eq!(args.duration, 900);
    }

    #[test]
    fn flag_errors_exit_as_validation_failures() {
        let err = Args::try_parse_from(["aws-mfa-session", "--duration", "500"])
            .err()
            .expect("out of range");
        assert_eq!(usage_exit_status(&err), Some(EXIT_VALIDATION));

        let rejected = crate::error::MfaError::Exchange {
            operation: "GetSessionToken",
            message: "denied".into(),
        };
        assert_ne!(usage_exit_status(&err), Some(rejected.exit_status()));

        let err = Args::try_parse_from(["aws-mfa-session", "--bogus"])
            .err()
            .expect("unknown flag");
        assert_eq!(usage_exit_status(&err), Some(EXIT_VALIDATION));
    }

    #[test]
    fn help_and_version_keep_clap_handling() {
        for flag in ["--help", "--version"] {
            let err = Args::try_parse_from(["aws-mfa-session", flag])
                .err()
                .expect("display request");
            assert_eq!(usage_exit_status(&err), None);
        }
    }
}
