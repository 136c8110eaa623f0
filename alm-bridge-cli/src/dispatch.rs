// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts, OutputWriter, StderrStyles, clap_styles},
};
use alm_bridge::{
    build_step::{
        BuildParameters, CHECKOUT_DIRECTORY_PARAMETER, ConvertStep, ECHOED_PARAMETERS, SkipReason,
        StepOutcome, TESTS_TO_RUN_PARAMETER, test_convert,
    },
    config::{BridgeConfig, OctaneConfig},
    errors::DisplayErrorChain,
    rest::{AlmRestClient, EntityService},
    uploader::{RunRecord, RunUploader},
    validate::{
        FormValidation, OctaneProject, OctaneRestConnector, ValidationKind, check_configuration,
        parse_ui_location,
    },
};
use alm_bridge_metadata::{AlmBridgeExitCode, UploadSummary, UploadedRunSummary};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

/// Uploads test runs to ALM, converts ALM Octane tests-to-run lists, and checks ALM Octane
/// server configuration.
#[derive(Debug, Parser)]
#[command(version, name = "alm-bridge", styles = clap_styles::style())]
pub struct AlmBridgeApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    #[clap(subcommand)]
    command: Command,
}

impl AlmBridgeApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::Upload(opts) => {
                let config = self.config_opts.make_config()?;
                opts.exec(&config, output_writer)
            }
            Command::Convert(opts) => opts.exec(output_writer),
            Command::TestConvert(opts) => opts.exec(&output.stderr_styles(), output_writer),
            Command::CheckConfig(opts) => {
                let config = self.config_opts.make_config()?;
                opts.exec(config.octane(), &output.stderr_styles(), output_writer)
            }
        }
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Directory to read `.config/alm-bridge.toml` from
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    workspace_root: Utf8PathBuf,

    /// Config file [default: workspace-root/.config/alm-bridge.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self) -> Result<BridgeConfig> {
        Ok(BridgeConfig::from_sources(
            self.workspace_root.clone(),
            self.config_file.as_deref(),
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload test runs to ALM
    ///
    /// Reads a JSON array of run records, maps each run, applies the version policy, and creates
    /// the runs in the configured ALM project. The upload stops at the first failed request.
    Upload(UploadOpts),

    /// Convert an ALM Octane tests-to-run list for a test framework
    ///
    /// Reads build parameters, converts the `testsToRun` parameter, and prints the converted
    /// parameter. Progress is echoed to stderr.
    Convert(ConvertOpts),

    /// Check that a tests-to-run list converts, without touching any build parameters
    TestConvert(TestConvertOpts),

    /// Check that an ALM Octane server accepts the configured credentials
    CheckConfig(CheckConfigOpts),
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormat {
    #[default]
    Human,
    Json,
    JsonPretty,
}

impl MessageFormat {
    fn write_json(self, value: &impl Serialize, mut writer: impl Write) -> Result<()> {
        let result = match self {
            MessageFormat::Human | MessageFormat::Json => {
                serde_json::to_writer(&mut writer, value)
            }
            MessageFormat::JsonPretty => serde_json::to_writer_pretty(&mut writer, value),
        };
        result.map_err(ExpectedError::write_output_error)?;
        writeln!(writer).map_err(ExpectedError::write_output_error)
    }
}

#[derive(Debug, Args)]
struct UploadOpts {
    /// JSON file with the run records to upload
    #[arg(long, value_name = "PATH")]
    input: Utf8PathBuf,

    /// Owner recorded on every run [default: upload.actual-user]
    #[arg(long, value_name = "USER")]
    actual_user: Option<String>,

    /// Output format
    #[arg(short = 'T', long, value_enum, default_value_t, value_name = "FMT")]
    message_format: MessageFormat,
}

impl UploadOpts {
    fn exec(self, config: &BridgeConfig, output_writer: &mut OutputWriter) -> Result<i32> {
        let records = read_records(&self.input)?;

        let alm = config.alm();
        let project = alm.project()?;
        let username = alm.username()?;
        let password = alm.password()?;
        let server_url = project.server_url.clone();

        let mut client = AlmRestClient::new(project, alm.timeout());
        client
            .login(username, &password)
            .map_err(|err| ExpectedError::LoginFailed {
                server_url: server_url.clone(),
                err,
            })?;

        let upload = config.upload();
        let uploader = RunUploader::new(
            upload.mapper(self.actual_user.as_deref()),
            upload.policy(),
            &client,
        );
        let summary = upload_records(&uploader, records);
        drop(uploader);

        if let Err(err) = client.logout() {
            warn!(
                "failed to log out from {server_url}: {}",
                DisplayErrorChain::new(err)
            );
        }
        let summary = summary?;

        let mut stdout = output_writer.stdout_writer();
        match self.message_format {
            MessageFormat::Human => write_upload_summary(&summary, &mut stdout)?,
            format => format.write_json(&summary, &mut stdout)?,
        }
        stdout.flush().map_err(ExpectedError::write_output_error)?;

        info!(
            "uploaded {} runs to {server_url} ({} skipped)",
            summary.created_count(),
            summary.skipped_count()
        );
        Ok(AlmBridgeExitCode::OK)
    }
}

fn read_records(input: &Utf8Path) -> Result<Vec<RunRecord>> {
    let contents = std::fs::read_to_string(input)
        .map_err(|err| ExpectedError::argument_file_read_error("input", input, err))?;
    let deserializer = &mut serde_json::Deserializer::from_str(&contents);
    serde_path_to_error::deserialize(deserializer)
        .map_err(|err| ExpectedError::argument_json_parse_error("input", input, err))
}

fn upload_records<S: EntityService>(
    uploader: &RunUploader<S>,
    records: Vec<RunRecord>,
) -> Result<UploadSummary> {
    let mut summary = UploadSummary::default();
    for (index, record) in records.into_iter().enumerate() {
        let outcome = uploader
            .upload_record(record)
            .map_err(|err| ExpectedError::UploadFailed {
                index,
                uploaded: summary.created_count(),
                err,
            })?;
        summary.runs.push(outcome.to_summary());
    }
    Ok(summary)
}

fn write_upload_summary(summary: &UploadSummary, mut writer: impl Write) -> Result<()> {
    for (index, run) in summary.runs.iter().enumerate() {
        let result = match run {
            UploadedRunSummary::Created { id: Some(id) } => {
                writeln!(writer, "{index}: created run {id}")
            }
            UploadedRunSummary::Created { id: None } => {
                writeln!(writer, "{index}: created run (no id returned)")
            }
            UploadedRunSummary::CreatedWithStatus { id, status } => {
                writeln!(writer, "{index}: created run {id} with status {status}")
            }
            UploadedRunSummary::Skipped { reason } => {
                writeln!(writer, "{index}: skipped: {reason}")
            }
        };
        result.map_err(ExpectedError::write_output_error)?;
    }
    Ok(())
}

#[derive(Debug, Args)]
struct ConvertOpts {
    /// Framework to convert for
    ///
    /// One of mvnSurefire, junit4, gradle, cucumber_jvm, protractor, uft, custom. Without a
    /// framework the step is skipped.
    #[arg(long, value_name = "FRAMEWORK")]
    framework: Option<String>,

    /// Conversion format (JSON), required for the custom framework
    #[arg(long, value_name = "JSON")]
    format: Option<String>,

    /// Set a build parameter (may be repeated)
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Read the build parameters the step consumes from environment variables
    #[arg(long)]
    from_env: bool,

    /// Read build parameters from a properties file
    #[arg(long, value_name = "PATH")]
    properties_file: Option<Utf8PathBuf>,

    /// Output format
    #[arg(short = 'T', long, value_enum, default_value_t, value_name = "FMT")]
    message_format: MessageFormat,
}

impl ConvertOpts {
    /// Collects build parameters: the properties file first, then the environment, then
    /// `--param`. Later sources replace earlier ones.
    fn build_parameters(&self) -> Result<BuildParameters> {
        let mut params = match &self.properties_file {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|err| {
                    ExpectedError::argument_file_read_error("properties-file", path, err)
                })?;
                BuildParameters::parse_properties(&contents)
            }
            None => BuildParameters::new(),
        };

        if self.from_env {
            let names = [TESTS_TO_RUN_PARAMETER, CHECKOUT_DIRECTORY_PARAMETER]
                .into_iter()
                .chain(ECHOED_PARAMETERS);
            for name in names {
                if let Ok(value) = std::env::var(name) {
                    params.insert_or_replace(name, value);
                }
            }
        }

        for (name, value) in &self.params {
            params.insert_or_replace(name.as_str(), value.as_str());
        }
        Ok(params)
    }

    fn exec(self, output_writer: &mut OutputWriter) -> Result<i32> {
        let mut params = self.build_parameters()?;
        let step = ConvertStep::new(self.framework, self.format);

        let outcome = {
            let mut stderr = output_writer.stderr_writer();
            let outcome = step
                .perform(&mut params, &mut stderr)
                .map_err(ExpectedError::write_output_error)?;
            stderr.flush().map_err(ExpectedError::write_output_error)?;
            outcome
        };

        match &outcome {
            StepOutcome::Converted { framework, result } => {
                let mut stdout = output_writer.stdout_writer();
                match self.message_format {
                    MessageFormat::Human => writeln!(
                        stdout,
                        "{}={}",
                        result.parameter_name(),
                        result.converted()
                    )
                    .map_err(ExpectedError::write_output_error)?,
                    format => format.write_json(&result.to_summary(*framework), &mut stdout)?,
                }
                stdout.flush().map_err(ExpectedError::write_output_error)?;
                Ok(AlmBridgeExitCode::OK)
            }
            StepOutcome::Skipped { reason } => {
                let reason = match reason {
                    SkipReason::NoTestsToRun => "no tests to run",
                    SkipReason::NoFramework => "no framework selected",
                };
                info!("conversion skipped ({reason}), build result {}", outcome.build_result());
                Ok(AlmBridgeExitCode::OK)
            }
            StepOutcome::Failed { .. } => Err(ExpectedError::BuildStepFailed {
                result: outcome.build_result(),
            }),
        }
    }
}

fn parse_param(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected NAME=VALUE, found `{arg}`")),
    }
}

#[derive(Debug, Args)]
struct TestConvertOpts {
    /// Tests to run, e.g. `v1:pkg|Class|test`
    #[arg(long, value_name = "TESTS")]
    tests_to_run: String,

    /// Framework to convert for
    #[arg(long, value_name = "FRAMEWORK")]
    framework: String,

    /// Conversion format (JSON), required for the custom framework
    #[arg(long, value_name = "JSON", default_value = "")]
    format: String,
}

impl TestConvertOpts {
    fn exec(self, styles: &StderrStyles, output_writer: &mut OutputWriter) -> Result<i32> {
        let validation = test_convert(&self.tests_to_run, &self.framework, &self.format);
        write_validation(&validation, styles, output_writer)?;
        if validation.is_ok() {
            Ok(AlmBridgeExitCode::OK)
        } else {
            Err(ExpectedError::TestConvertFailed)
        }
    }
}

#[derive(Debug, Args)]
struct CheckConfigOpts {
    /// Server location, e.g. `https://octane.example.com/qcbin` [default: octane.location]
    #[arg(long, value_name = "URL", conflicts_with = "ui_location")]
    location: Option<String>,

    /// Shared space id [default: octane.shared-space]
    #[arg(long, value_name = "ID", conflicts_with = "ui_location")]
    shared_space: Option<String>,

    /// ALM Octane UI URL to take the location and shared space from
    #[arg(long, value_name = "URL")]
    ui_location: Option<String>,

    /// User or API client id [default: octane.username]
    #[arg(long, value_name = "USER")]
    username: Option<String>,
}

impl CheckConfigOpts {
    fn exec(
        self,
        octane: &OctaneConfig,
        styles: &StderrStyles,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let validation = match self.project(octane)? {
            Ok(project) => {
                let credentials = octane.credentials(self.username.as_deref())?;
                let connector = OctaneRestConnector::new(octane.timeout());
                check_configuration(&connector, &project, &credentials)
            }
            Err(validation) => validation,
        };

        write_validation(&validation, styles, output_writer)?;
        match validation.kind() {
            ValidationKind::Error => Err(ExpectedError::ConfigCheckFailed),
            ValidationKind::Ok | ValidationKind::Warning => Ok(AlmBridgeExitCode::OK),
        }
    }

    /// Resolves the project to check. A malformed UI URL is a validation result, not an error.
    fn project(&self, octane: &OctaneConfig) -> Result<Result<OctaneProject, FormValidation>> {
        if let Some(ui_location) = &self.ui_location {
            return Ok(parse_ui_location(ui_location).map_err(|err| FormValidation::from(&err)));
        }

        let location = match &self.location {
            Some(location) => location.clone(),
            None => octane.location()?.to_owned(),
        };
        let shared_space = match &self.shared_space {
            Some(shared_space) => shared_space.clone(),
            None => octane.shared_space()?.to_owned(),
        };
        Ok(Ok(OctaneProject {
            location,
            shared_space,
        }))
    }
}

fn write_validation(
    validation: &FormValidation,
    styles: &StderrStyles,
    output_writer: &mut OutputWriter,
) -> Result<()> {
    let style = match validation.kind() {
        ValidationKind::Ok => styles.ok_text,
        ValidationKind::Warning => styles.warning_text,
        ValidationKind::Error => styles.error_text,
    };
    let mut stderr = output_writer.stderr_writer();
    writeln!(stderr, "{}", validation.plain_text().style(style))
        .and_then(|()| stderr.flush())
        .map_err(ExpectedError::write_output_error)
}
