// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for alm-bridge.
//!
//! The config is read from `.config/alm-bridge.toml` in the workspace, or a file passed in
//! explicitly, layered on top of the embedded `default-config.toml`.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, MissingConfigValue, PasswordNotSet},
    mapper::{RunMapper, RunSubtypes},
    policy::UploadPolicy,
    rest::AlmProject,
    validate::{OctaneCredentials, OctaneProject},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};
use swrite::{SWrite, swrite};
use tracing::warn;

/// Overall configuration for alm-bridge.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    config_file: Utf8PathBuf,
    inner: BridgeConfigDeserialize,
}

impl BridgeConfig {
    /// The default location of the config within the path: `.config/alm-bridge.toml`, used to read
    /// the config from the given directory.
    pub const CONFIG_PATH: &'static str = ".config/alm-bridge.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/alm-bridge.toml`
    /// in the workspace root.
    ///
    /// An explicitly specified file must exist; the default file is optional. Unknown keys are
    /// reported as warnings.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            let mut message =
                format!("ignoring unknown configuration keys in config file {config_file}:");
            for key in &unknown {
                swrite!(message, "\n  - {key}");
            }
            warn!("{message}");
        }

        Ok(Self { config_file, inner })
    }

    /// Returns the default configuration, without reading any file.
    pub fn default_config(workspace_root: impl AsRef<Utf8Path>) -> Self {
        let config_file = workspace_root.as_ref().join(Self::CONFIG_PATH);
        let (inner, _unknown) = Self::build_and_deserialize_config(&Self::make_default_config())
            .unwrap_or_else(|err| panic!("default config is always valid: {err}"));
        Self { config_file, inner }
    }

    /// Returns the config file this config was read from, whether or not it exists.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the `[alm]` section.
    pub fn alm(&self) -> &AlmConfig {
        &self.inner.alm
    }

    /// Returns the `[upload]` section.
    pub fn upload(&self) -> &UploadConfig {
        &self.inner.upload
    }

    /// Returns the `[octane]` section.
    pub fn octane(&self) -> &OctaneConfig {
        &self.inner.octane
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(BridgeConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: BridgeConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error already reports the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BridgeConfigDeserialize {
    alm: AlmConfig,
    upload: UploadConfig,
    octane: OctaneConfig,
}

/// The `[alm]` section: where runs are uploaded.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AlmConfig {
    #[serde(default)]
    server_url: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    username: Option<String>,
    password_env: String,
    #[serde(with = "humantime_serde")]
    timeout: Duration,
}

impl AlmConfig {
    /// Returns the project runs are uploaded to.
    pub fn project(&self) -> Result<AlmProject, MissingConfigValue> {
        Ok(AlmProject {
            server_url: required("alm", "server-url", self.server_url.as_deref())?,
            domain: required("alm", "domain", self.domain.as_deref())?,
            project: required("alm", "project", self.project.as_deref())?,
        })
    }

    /// Returns the user to sign in as.
    pub fn username(&self) -> Result<&str, MissingConfigValue> {
        non_empty(self.username.as_deref()).ok_or(MissingConfigValue::new("alm", "username"))
    }

    /// Returns the environment variable the password is read from.
    pub fn password_env(&self) -> &str {
        &self.password_env
    }

    /// Reads the password from the environment.
    pub fn password(&self) -> Result<String, PasswordNotSet> {
        read_password("alm", &self.password_env, |name| std::env::var(name).ok())
    }

    /// Returns the per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// The `[upload]` section: how runs are mapped and which runs are uploaded.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UploadConfig {
    #[serde(default)]
    actual_user: Option<String>,
    versioning_enabled: bool,
    exempt_subtypes: Vec<String>,
    run_status_mapping: Vec<StatusMappingEntry>,
    run_subtypes: Vec<RunSubtypeEntry>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StatusMappingEntry {
    from: String,
    to: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunSubtypeEntry {
    test_instance: String,
    run: String,
}

impl UploadConfig {
    /// Returns the configured owner for uploaded runs.
    pub fn actual_user(&self) -> Option<&str> {
        non_empty(self.actual_user.as_deref())
    }

    /// Builds the version and status policy.
    pub fn policy(&self) -> UploadPolicy {
        UploadPolicy::new(
            self.exempt_subtypes.iter().cloned(),
            self.versioning_enabled,
            self.run_status_mapping
                .iter()
                .map(|entry| (entry.from.clone(), entry.to.clone()))
                .collect(),
        )
    }

    /// Builds the run subtype resolver.
    pub fn run_subtypes(&self) -> RunSubtypes {
        RunSubtypes::new(
            self.run_subtypes
                .iter()
                .map(|entry| (entry.test_instance.clone(), entry.run.clone()))
                .collect(),
        )
    }

    /// Builds the run mapper. `actual_user` overrides the configured owner.
    pub fn mapper(&self, actual_user: Option<&str>) -> RunMapper {
        let actual_user = actual_user.or(self.actual_user()).map(str::to_owned);
        RunMapper::new(actual_user, self.run_subtypes())
    }
}

/// The `[octane]` section: the server checked by `check-config`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OctaneConfig {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    shared_space: Option<String>,
    #[serde(default)]
    username: Option<String>,
    password_env: String,
    #[serde(with = "humantime_serde")]
    timeout: Duration,
}

impl OctaneConfig {
    /// Returns the configured server location and shared space.
    pub fn project(&self) -> Result<OctaneProject, MissingConfigValue> {
        Ok(OctaneProject {
            location: self.location()?.to_owned(),
            shared_space: self.shared_space()?.to_owned(),
        })
    }

    /// Returns the configured server location.
    pub fn location(&self) -> Result<&str, MissingConfigValue> {
        non_empty(self.location.as_deref()).ok_or(MissingConfigValue::new("octane", "location"))
    }

    /// Returns the configured shared space id.
    pub fn shared_space(&self) -> Result<&str, MissingConfigValue> {
        non_empty(self.shared_space.as_deref())
            .ok_or(MissingConfigValue::new("octane", "shared-space"))
    }

    /// Returns the configured user, if any.
    pub fn username(&self) -> Option<&str> {
        non_empty(self.username.as_deref())
    }

    /// Returns the environment variable the password is read from.
    pub fn password_env(&self) -> &str {
        &self.password_env
    }

    /// Reads the credentials, with `username` overriding the configured user.
    ///
    /// A missing user becomes an empty user name, which the server rejects as an authentication
    /// failure.
    pub fn credentials(&self, username: Option<&str>) -> Result<OctaneCredentials, PasswordNotSet> {
        self.credentials_with(username, |name| std::env::var(name).ok())
    }

    fn credentials_with(
        &self,
        username: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<OctaneCredentials, PasswordNotSet> {
        Ok(OctaneCredentials {
            username: username.or(self.username()).unwrap_or_default().to_owned(),
            password: read_password("octane", &self.password_env, lookup)?,
        })
    }

    /// Returns the per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn required(
    section: &'static str,
    key: &'static str,
    value: Option<&str>,
) -> Result<String, MissingConfigValue> {
    non_empty(value)
        .map(str::to_owned)
        .ok_or(MissingConfigValue::new(section, key))
}

fn read_password(
    section: &'static str,
    var_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, PasswordNotSet> {
    lookup(var_name).ok_or_else(|| PasswordNotSet::new(section, var_name))
}
