//! Caller-facing rendering of an exchange result.

use clap::ValueEnum;

use crate::{credentials::TemporaryCredentialRecord, updater::ExchangeSummary};

/// Shell flavour for the environment variable export snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// `export` statements for bash, zsh and other POSIX shells.
    Posix,
    /// `setx` for Command Prompt plus `$Env:` for PowerShell.
    Windows,
}

impl Shell {
    pub fn host() -> Self {
        if cfg!(windows) {
            Shell::Windows
        } else {
            Shell::Posix
        }
    }
}

/// Full summary: where the credentials went, when they expire and how to export them.
pub fn render_summary(shell: Shell, summary: &ExchangeSummary) -> String {
    let rule = "-".repeat(76);
    let saved = match &summary.persist_error {
        None => format!(
            "Temporary credentials for profile {} are saved to the AWS credentials file",
            summary.section
        ),
        Some(err) => format!(
            "WARNING: temporary credentials for profile {} were NOT saved ({err})",
            summary.section
        ),
    };

    format!(
        "{rule}
{saved}
Expiration: {}
Environment variables: to use them instead of the profile, copy & paste into your shell
{rule}

{}
",
        summary.record.expiration(),
        render_exports(
            shell,
            summary.persist_error.is_none().then_some(summary.section.as_str()),
            &summary.record
        ),
    )
}

/// Shell statements exporting the temporary credentials.
///
/// `AWS_PROFILE` is only pointed at `profile` when one is given, i.e. when the section was
/// actually written.
pub fn render_exports(
    shell: Shell,
    profile: Option<&str>,
    record: &TemporaryCredentialRecord,
) -> String {
    let access_key_id = record.access_key_id();
    let secret_access_key = record.secret_access_key();
    let session_token = record.session_token();

    match shell {
        Shell::Posix => format!(
            r"{}unset AWS_SESSION_TOKEN
unset AWS_ACCESS_KEY_ID
unset AWS_SECRET_ACCESS_KEY
AWS_SESSION_TOKEN={session_token}
AWS_ACCESS_KEY_ID={access_key_id}
AWS_SECRET_ACCESS_KEY={secret_access_key}
export AWS_SESSION_TOKEN AWS_ACCESS_KEY_ID AWS_SECRET_ACCESS_KEY",
            profile.map_or(String::new(), |profile| format!("export AWS_PROFILE={profile}\n"))
        ),
        Shell::Windows => format!(
            r#"# Windows Command Prompt:
{}setx AWS_SESSION_TOKEN {session_token}
setx AWS_ACCESS_KEY_ID {access_key_id}
setx AWS_SECRET_ACCESS_KEY {secret_access_key}

# Windows PowerShell:
$Env:AWS_SESSION_TOKEN="{session_token}"
$Env:AWS_ACCESS_KEY_ID="{access_key_id}"
$Env:AWS_SECRET_ACCESS_KEY="{secret_access_key}""#,
            profile.map_or(String::new(), |profile| format!("setx AWS_PROFILE {profile}\n"))
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::{io, path::PathBuf};

    use super::*;
    use crate::error::MfaError;

    fn record() -> TemporaryCredentialRecord {
        TemporaryCredentialRecord::new("ASIAEXAMPLE", "abc/def+", "xyz==", "2024-01-01T00:00:00Z")
            .expect("valid record")
    }

    #[test]
    fn posix_exports() {
        let text = render_exports(Shell::Posix, Some("default_mfa"), &record());
        assert!(text.starts_with("export AWS_PROFILE=default_mfa\n"));
        assert!(text.contains("\nAWS_SESSION_TOKEN=xyz==\n"));
        assert!(text.contains("\nAWS_ACCESS_KEY_ID=ASIAEXAMPLE\n"));
        assert!(text.contains("\nAWS_SECRET_ACCESS_KEY=abc/def+\n"));
        assert!(text.ends_with("export AWS_SESSION_TOKEN AWS_ACCESS_KEY_ID AWS_SECRET_ACCESS_KEY"));
        assert!(!text.contains("setx"));
    }

    #[test]
    fn windows_exports() {
        let text = render_exports(Shell::Windows, Some("work_mfa"), &record());
        assert!(text.contains("setx AWS_PROFILE work_mfa\n"));
        assert!(text.contains("setx AWS_SECRET_ACCESS_KEY abc/def+\n"));
        assert!(text.contains("$Env:AWS_SESSION_TOKEN=\"xyz==\"\n"));
        assert!(text.ends_with("$Env:AWS_SECRET_ACCESS_KEY=\"abc/def+\""));
        assert!(!text.contains("export "));
    }

    #[test]
    fn summary_reports_section_and_expiration() {
        let summary = ExchangeSummary {
            section: "default_mfa".into(),
            record: record(),
            persist_error: None,
        };

        let text = render_summary(Shell::Posix, &summary);
        assert!(text.contains("profile default_mfa are saved"));
        assert!(text.contains("Expiration: 2024-01-01T00:00:00Z"));
        assert!(text.contains("export AWS_PROFILE=default_mfa"));
    }

    #[test]
    fn summary_warns_when_not_saved() {
        let summary = ExchangeSummary {
            section: "default_mfa".into(),
            record: record(),
            persist_error: Some(MfaError::Persistence {
                path: PathBuf::from("/home/user/.aws/credentials"),
                source: io::Error::other("read-only file system"),
            }),
        };

        let text = render_summary(Shell::Windows, &summary);
        assert!(text.contains("were NOT saved"));
        assert!(text.contains("read-only file system"));
        assert!(text.contains("setx AWS_ACCESS_KEY_ID ASIAEXAMPLE"));
        assert!(!text.contains("AWS_PROFILE"));
    }

    #[test]
    fn exports_without_profile_skip_aws_profile() {
        let text = render_exports(Shell::Posix, None, &record());
        assert!(text.starts_with("unset AWS_SESSION_TOKEN\n"));
        assert!(!text.contains("AWS_PROFILE"));
        assert!(text.contains("\nAWS_SESSION_TOKEN=xyz==\n"));
    }
}
