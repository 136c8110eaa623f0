// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by alm-bridge.

use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::{error, fmt};
use thiserror::Error;

/// Displays an error followed by its chain of sources, separated by `: `.
#[derive(Clone, Debug)]
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new display wrapper.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let mut source = self.error.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse alm-bridge config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// A config value required by a command was not set.
#[derive(Clone, Debug, Error)]
#[error("[{section}] {key} is not set (set it in the config file or on the command line)")]
pub struct MissingConfigValue {
    section: &'static str,
    key: &'static str,
}

impl MissingConfigValue {
    pub(crate) fn new(section: &'static str, key: &'static str) -> Self {
        Self { section, key }
    }

    /// Returns the config key, e.g. `server-url`.
    pub fn key(&self) -> &'static str {
        self.key
    }
}

/// A password environment variable named in the config was not set.
#[derive(Clone, Debug, Error)]
#[error("[{section}] requires a password in environment variable `{var_name}`, which is not set")]
pub struct PasswordNotSet {
    section: &'static str,
    var_name: String,
}

impl PasswordNotSet {
    pub(crate) fn new(section: &'static str, var_name: impl Into<String>) -> Self {
        Self {
            section,
            var_name: var_name.into(),
        }
    }
}

/// An error returned by an [`EntityService`](crate::rest::EntityService).
///
/// The uploader never retries or rewraps these: callers see exactly what the service produced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RestError {
    /// The request could not be sent, or no response was received.
    #[error("{method} {url} failed")]
    Transport {
        /// The HTTP method.
        method: &'static str,
        /// The request URL.
        url: String,
        /// The underlying error.
        #[source]
        err: Box<ureq::Error>,
    },

    /// The server responded with a non-success status.
    #[error("{method} {url} returned HTTP {status}")]
    Status {
        /// The HTTP method.
        method: &'static str,
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The response body, possibly empty.
        body: String,
    },

    /// The response body could not be read.
    #[error("failed to read response body from {url}")]
    ReadBody {
        /// The request URL.
        url: String,
        /// The underlying error.
        #[source]
        err: Box<ureq::Error>,
    },

    /// The response body was not a valid ALM entity.
    #[error("invalid entity XML from {url}")]
    EntityXml {
        /// The request URL.
        url: String,
        /// The underlying error.
        #[source]
        err: EntityXmlError,
    },

    /// An entity was expected to carry an `id` but did not.
    #[error("{context}: entity in `{collection}` has no id")]
    MissingId {
        /// The collection, e.g. `runs`.
        collection: String,
        /// What was being done when the id was needed.
        context: &'static str,
    },
}

/// An error while reading or writing ALM entity XML.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EntityXmlError {
    /// The XML was malformed.
    #[error("malformed XML")]
    Xml(#[from] quick_xml::Error),

    /// An attribute was malformed.
    #[error("malformed XML attribute")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// The document did not contain an `Entity` element.
    #[error("no <Entity> element found")]
    NoEntity,

    /// A `Field` element was missing its `Name` attribute.
    #[error("<Field> element without a Name attribute")]
    FieldWithoutName,
}

/// An error that occurs while converting a tests-to-run list.
///
/// These are argument errors: the build step reports them to the console and marks the build as
/// failed instead of propagating them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// No tests-to-run list was supplied.
    #[error("'Tests to run' parameter is missing")]
    MissingTests,

    /// No framework was supplied.
    #[error("'Framework' parameter is missing")]
    MissingFramework,

    /// The framework name is not known.
    #[error(
        "unknown framework `{name}` (known frameworks: {})",
        .known.iter().join(", ")
    )]
    UnknownFramework {
        /// The name that was looked up.
        name: String,
        /// All known framework names.
        known: Vec<&'static str>,
    },

    /// The framework requires a format but none was given.
    #[error("'Format' parameter is missing (required for framework `{framework}`)")]
    MissingFormat {
        /// The framework name.
        framework: &'static str,
    },

    /// The format was not valid JSON for a custom conversion.
    #[error("format is not a valid custom conversion format")]
    InvalidFormat {
        /// The underlying error.
        #[source]
        err: serde_json::Error,
    },

    /// A regular expression in the format did not compile.
    #[error("invalid regex `{regex}` in format")]
    InvalidRegex {
        /// The regex source.
        regex: String,
        /// The underlying error.
        #[source]
        err: regex::Error,
    },

    /// A replacement targets a placeholder that does not exist.
    #[error(
        "unknown replacement target `{target}` (known targets: {})",
        .known.iter().join(", ")
    )]
    UnknownReplacementTarget {
        /// The target that was given.
        target: String,
        /// All known targets.
        known: Vec<&'static str>,
    },

    /// The MTBX document could not be written.
    #[error("failed to write MTBX document")]
    MtbxWrite {
        /// The underlying error.
        #[source]
        err: quick_xml::Error,
    },

    /// The raw tests-to-run string could not be parsed.
    #[error("malformed tests to run `{raw}`: {reason}")]
    MalformedTestsToRun {
        /// The raw input, or the offending entry.
        raw: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// An error produced by an [`OctaneConnector`](crate::validate::OctaneConnector) probe.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectError {
    /// The server rejected the credentials.
    #[error("authentication failed (HTTP {status})")]
    Authentication {
        /// The HTTP status code.
        status: u16,
    },

    /// A session could not be established.
    #[error("session creation failed: {reason}")]
    SessionCreation {
        /// A description of the failure.
        reason: String,
    },

    /// The shared space does not exist on the server.
    #[error("shared space `{shared_space}` does not exist")]
    SharedSpaceNotExist {
        /// The shared space that was probed.
        shared_space: String,
    },

    /// Any other communication failure.
    #[error("request failed: {reason}")]
    RequestError {
        /// A description of the failure.
        reason: String,
    },
}

/// An error while splitting an ALM Octane UI URL into location and shared space.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum UiLocationError {
    /// The URL could not be parsed.
    #[error("Invalid URL")]
    InvalidUrl,

    /// Neither `/qcbin/ui` nor `/mqm/ui` was found in the URL.
    #[error("Application context not found in URL")]
    ApplicationContextNotFound,

    /// The `p` query parameter was missing.
    #[error("Missing shared space parameter (p=)")]
    MissingSharedSpace,

    /// The `p` query parameter was present but empty.
    #[error("Unexpected shared space parameter value")]
    UnexpectedSharedSpace,
}
