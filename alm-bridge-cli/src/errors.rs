// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use alm_bridge::{
    build_step::BuildResult,
    errors::{ConfigParseError, MissingConfigValue, PasswordNotSet, RestError},
};
use alm_bridge_metadata::AlmBridgeExitCode;
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected failure: one that is reported to the user with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("missing config value")]
    MissingConfigValue {
        #[from]
        err: MissingConfigValue,
    },
    #[error("password not set")]
    PasswordNotSet {
        #[from]
        err: PasswordNotSet,
    },
    #[error("argument file read error")]
    ArgumentFileReadError {
        arg_name: &'static str,
        file_name: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("argument json parse error")]
    ArgumentJsonParseError {
        arg_name: &'static str,
        file_name: Utf8PathBuf,
        #[source]
        err: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("login failed")]
    LoginFailed {
        server_url: String,
        #[source]
        err: RestError,
    },
    #[error("upload failed")]
    UploadFailed {
        index: usize,
        uploaded: usize,
        #[source]
        err: RestError,
    },
    #[error("build step failed")]
    BuildStepFailed { result: BuildResult },
    #[error("test conversion failed")]
    TestConvertFailed,
    #[error("configuration check failed")]
    ConfigCheckFailed,
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn argument_file_read_error(
        arg_name: &'static str,
        file_name: impl Into<Utf8PathBuf>,
        err: std::io::Error,
    ) -> Self {
        Self::ArgumentFileReadError {
            arg_name,
            file_name: file_name.into(),
            err,
        }
    }

    pub(crate) fn argument_json_parse_error(
        arg_name: &'static str,
        file_name: impl Into<Utf8PathBuf>,
        err: serde_path_to_error::Error<serde_json::Error>,
    ) -> Self {
        Self::ArgumentJsonParseError {
            arg_name,
            file_name: file_name.into(),
            err,
        }
    }

    pub(crate) fn write_output_error(err: impl Into<std::io::Error>) -> Self {
        Self::WriteOutputError { err: err.into() }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. }
            | Self::MissingConfigValue { .. }
            | Self::PasswordNotSet { .. }
            | Self::ArgumentFileReadError { .. }
            | Self::ArgumentJsonParseError { .. } => AlmBridgeExitCode::SETUP_ERROR,
            Self::LoginFailed { .. } | Self::UploadFailed { .. } => {
                AlmBridgeExitCode::UPLOAD_FAILED
            }
            Self::BuildStepFailed { .. } | Self::TestConvertFailed => {
                AlmBridgeExitCode::CONVERT_FAILED
            }
            Self::ConfigCheckFailed => AlmBridgeExitCode::CONFIG_CHECK_FAILED,
            Self::WriteOutputError { .. } => AlmBridgeExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse alm-bridge config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::MissingConfigValue { err } => {
                error!("{err}");
                None
            }
            Self::PasswordNotSet { err } => {
                error!("{err}");
                None
            }
            Self::ArgumentFileReadError {
                arg_name,
                file_name,
                err,
            } => {
                error!(
                    "failed to read `{}` file at `{}`",
                    format!("--{arg_name}").style(styles.bold),
                    file_name.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::ArgumentJsonParseError {
                arg_name,
                file_name,
                err,
            } => {
                error!(
                    "failed to parse `{}` file at `{}`, at `{}`",
                    format!("--{arg_name}").style(styles.bold),
                    file_name.style(styles.bold),
                    err.path().style(styles.bold),
                );
                Some(err.inner() as &dyn Error)
            }
            Self::LoginFailed { server_url, err } => {
                error!("failed to log in to `{}`", server_url.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::UploadFailed {
                index,
                uploaded,
                err,
            } => {
                error!(
                    "failed to upload the run at index {} ({} runs uploaded before it)",
                    index.style(styles.bold),
                    uploaded.style(styles.bold),
                );
                Some(err as &dyn Error)
            }
            Self::BuildStepFailed { result } => {
                error!(
                    "tests-to-run conversion finished with build result {}",
                    result.style(styles.bold)
                );
                None
            }
            Self::TestConvertFailed => {
                error!("tests to run could not be converted");
                None
            }
            Self::ConfigCheckFailed => {
                error!("configuration check failed");
                None
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
