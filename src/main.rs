//! AWS MFA Session Helper
//!
//! Obtains temporary AWS credentials with an MFA code and stores them for other tools.
//!
//! The program performs the following operations:
//! 1. Parses command-line arguments for configuration
//! 2. Prompts for the MFA code unless it was passed on the command line
//! 3. Exchanges the identity's long-term keys plus the code for temporary credentials,
//!    assuming the profile's role or getting a plain session token
//! 4. Saves them to the `[<profile>_mfa]` section of the AWS credentials file
//! 5. Prints shell statements exporting the credentials as environment variables

use std::{io, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::error;

mod cli;
mod credentials;
mod error;
mod exchange;
mod output;
mod profile;
mod prompt;
mod updater;

use cli::Args;
use error::{EXIT_GENERIC, MfaError};
use exchange::StsExchangeClient;
use output::Shell;
use updater::{CredentialUpdater, ExchangeMode, ExchangeParams, StorePaths};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // INFO by default; RUST_LOG overrides.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => match cli::usage_exit_status(&err) {
            None => err.exit(),
            Some(status) => {
                let _ = err.print();
                return ExitCode::from(status);
            }
        },
    };

    match run(args).await {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(
                err.downcast_ref::<MfaError>()
                    .map_or(EXIT_GENERIC, MfaError::exit_status),
            )
        }
    }
}

/// Runs one exchange and returns the exit status to report.
///
/// A failed write of the credentials file still prints the credentials but yields the
/// persistence exit status.
async fn run(args: Args) -> Result<u8> {
    let Args {
        user,
        identity,
        profile,
        region,
        duration,
        token,
        credentials_path,
        config_path,
        timeout,
        shell,
    } = args;

    let paths = resolve_paths(credentials_path, config_path)?;

    let mfa_code = match token {
        Some(code) => code,
        None => prompt::read_mfa_code(io::stdin().lock(), io::stdout(), &profile)?,
    };

    let params = ExchangeParams {
        mode: if user {
            ExchangeMode::SessionToken
        } else {
            ExchangeMode::AssumeRole
        },
        identity,
        region,
        profile,
        duration,
        mfa_code,
    };

    let updater = CredentialUpdater::new(
        paths,
        StsExchangeClient::new(Duration::from_secs(timeout)),
    );
    let summary = updater.run(&params).await?;

    print!(
        "{}",
        output::render_summary(shell.unwrap_or_else(Shell::host), &summary)
    );

    Ok(summary.persist_error.map_or(0, |err| err.exit_status()))
}

/// Resolves store paths, defaulting to `~/.aws/credentials` and `~/.aws/config`.
fn resolve_paths(
    credentials: Option<std::path::PathBuf>,
    config: Option<std::path::PathBuf>,
) -> Result<StorePaths> {
    let aws_dir = || {
        dirs::home_dir()
            .map(|home| home.join(".aws"))
            .context("Could not determine home directory")
    };

    Ok(StorePaths {
        credentials: match credentials {
            Some(path) => path,
            None => aws_dir()?.join("credentials"),
        },
        config: match config {
            Some(path) => path,
            None => aws_dir()?.join("config"),
        },
    })
}
