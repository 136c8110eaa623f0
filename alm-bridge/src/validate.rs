// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checking an ALM Octane server configuration.
//!
//! [`check_configuration`] signs in to the server and probes the shared space, turning each kind
//! of failure into its own [`FormValidation`] message.

use crate::{
    errors::{ConnectError, DisplayErrorChain, UiLocationError},
    rest::{HttpSession, JSON_CONTENT, Method},
};
use serde::Serialize;
use std::{fmt, time::Duration};
use tracing::{debug, warn};
use url::Url;

const SHARED_SPACE_PARAM: &str = "p";

/// Message shown when the server rejects the credentials.
pub const AUTHENTICATION_FAILURE: &str = "Authentication failed.";
/// Message shown when no session could be created.
pub const SESSION_CREATION_FAILURE: &str = "Session creation failed.";
/// Message shown when the shared space does not exist.
pub const SHARED_SPACE_INVALID: &str = "Shared space validation failed.";
/// Message shown for any other communication problem.
pub const CONNECTION_FAILURE: &str = "Connection failed.";
/// Message shown when the check succeeds.
pub const CONNECTION_SUCCESS: &str = "Connection successful.";

/// Wraps a message in colored, bold HTML.
pub fn markup(color: &str, message: &str) -> String {
    format!("<font color=\"{color}\"><b>{message}</b></font>")
}

/// The state of a [`FormValidation`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ValidationKind {
    /// The input is valid.
    Ok,
    /// The input is usable but suspicious.
    Warning,
    /// The input is invalid.
    Error,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationKind::Ok => f.write_str("ok"),
            ValidationKind::Warning => f.write_str("warning"),
            ValidationKind::Error => f.write_str("error"),
        }
    }
}

/// A validation result with an HTML message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormValidation {
    kind: ValidationKind,
    html: String,
}

impl FormValidation {
    /// Creates a successful validation.
    pub fn ok(html: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Ok,
            html: html.into(),
        }
    }

    /// Creates a warning.
    pub fn warning(html: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Warning,
            html: html.into(),
        }
    }

    /// Creates an error.
    pub fn error(html: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Error,
            html: html.into(),
        }
    }

    /// Returns the state.
    pub fn kind(&self) -> ValidationKind {
        self.kind
    }

    /// Returns the HTML message.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Returns true if the state is [`ValidationKind::Ok`].
    pub fn is_ok(&self) -> bool {
        self.kind == ValidationKind::Ok
    }

    /// Returns the message with tags removed and entities unescaped.
    pub fn plain_text(&self) -> String {
        let mut text = String::with_capacity(self.html.len());
        let mut in_tag = false;
        for c in self.html.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                c if !in_tag => text.push(c),
                _ => {}
            }
        }
        match quick_xml::escape::unescape(&text) {
            Ok(unescaped) => unescaped.into_owned(),
            Err(_) => text,
        }
    }
}

impl From<&UiLocationError> for FormValidation {
    fn from(err: &UiLocationError) -> Self {
        FormValidation::error(markup("red", &err.to_string()))
    }
}

impl From<&ConnectError> for FormValidation {
    fn from(err: &ConnectError) -> Self {
        let message = match err {
            ConnectError::Authentication { .. } => AUTHENTICATION_FAILURE,
            ConnectError::SessionCreation { .. } => SESSION_CREATION_FAILURE,
            ConnectError::SharedSpaceNotExist { .. } => SHARED_SPACE_INVALID,
            ConnectError::RequestError { .. } => CONNECTION_FAILURE,
        };
        FormValidation::error(markup("red", message))
    }
}

/// An ALM Octane server location and shared space.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OctaneProject {
    /// The server URL up to and including the application context, e.g.
    /// `https://octane.example.com/qcbin`.
    pub location: String,
    /// The shared space id.
    pub shared_space: String,
}

/// Splits an ALM Octane UI URL into a server location and shared space.
///
/// `https://octane.example.com/qcbin/ui/?p=1001/1002` yields the location
/// `https://octane.example.com/qcbin` and the shared space `1001/1002`. The `p` query value is
/// percent-decoded as UTF-8 and used whole.
pub fn parse_ui_location(ui_location: &str) -> Result<OctaneProject, UiLocationError> {
    let url = Url::parse(ui_location).map_err(|_| UiLocationError::InvalidUrl)?;

    let location = [("/qcbin/ui", "/qcbin"), ("/mqm/ui", "/mqm")]
        .into_iter()
        .find_map(|(marker, context)| {
            ui_location
                .find(marker)
                .map(|pos| &ui_location[..pos + context.len()])
        })
        .ok_or(UiLocationError::ApplicationContextNotFound)?;

    let (_, shared_space) = url
        .query_pairs()
        .find(|(name, _)| name == SHARED_SPACE_PARAM)
        .ok_or(UiLocationError::MissingSharedSpace)?;
    if shared_space.is_empty() {
        return Err(UiLocationError::UnexpectedSharedSpace);
    }

    Ok(OctaneProject {
        location: location.to_owned(),
        shared_space: shared_space.into_owned(),
    })
}

/// Credentials for an ALM Octane server.
#[derive(Clone, Eq, PartialEq)]
pub struct OctaneCredentials {
    /// The user name or API client id.
    pub username: String,
    /// The password or API client secret.
    pub password: String,
}

impl fmt::Debug for OctaneCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OctaneCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens a session and probes a shared space.
pub trait OctaneConnector {
    /// Signs in and checks that the shared space is reachable.
    fn try_to_connect(
        &self,
        project: &OctaneProject,
        credentials: &OctaneCredentials,
    ) -> Result<(), ConnectError>;
}

impl<T: OctaneConnector + ?Sized> OctaneConnector for &T {
    fn try_to_connect(
        &self,
        project: &OctaneProject,
        credentials: &OctaneCredentials,
    ) -> Result<(), ConnectError> {
        (**self).try_to_connect(project, credentials)
    }
}

/// An [`OctaneConnector`] that talks to a server over HTTP.
#[derive(Clone, Debug)]
pub struct OctaneRestConnector {
    timeout: Duration,
}

impl OctaneRestConnector {
    /// Creates a connector whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[derive(Serialize)]
struct SignIn<'a> {
    user: &'a str,
    password: &'a str,
}

impl OctaneConnector for OctaneRestConnector {
    fn try_to_connect(
        &self,
        project: &OctaneProject,
        credentials: &OctaneCredentials,
    ) -> Result<(), ConnectError> {
        let location = project.location.trim_end_matches('/');
        let session = HttpSession::new(self.timeout);

        let sign_in_url = format!("{location}/authentication/sign_in");
        let body = serde_json::to_vec(&SignIn {
            user: &credentials.username,
            password: &credentials.password,
        })
        .map_err(|err| ConnectError::SessionCreation {
            reason: err.to_string(),
        })?;
        let response = session
            .execute(Method::Post, &sign_in_url, JSON_CONTENT, Some(body.as_slice()))
            .map_err(|err| ConnectError::SessionCreation {
                reason: DisplayErrorChain::new(&err).to_string(),
            })?;
        match response.status {
            401 => {
                return Err(ConnectError::Authentication {
                    status: response.status,
                });
            }
            _ if !response.is_success() => {
                return Err(ConnectError::SessionCreation {
                    reason: format!("sign-in returned HTTP {}", response.status),
                });
            }
            _ => debug!("signed in to {location} as {}", credentials.username),
        }

        let probe_url = format!(
            "{location}/api/shared_spaces/{}/workspaces",
            project.shared_space
        );
        let response = session
            .execute(Method::Get, &probe_url, JSON_CONTENT, None)
            .map_err(|err| ConnectError::RequestError {
                reason: DisplayErrorChain::new(&err).to_string(),
            })?;
        match response.status {
            401 | 403 => Err(ConnectError::Authentication {
                status: response.status,
            }),
            404 => Err(ConnectError::SharedSpaceNotExist {
                shared_space: project.shared_space.clone(),
            }),
            _ if !response.is_success() => Err(ConnectError::RequestError {
                reason: format!("shared space probe returned HTTP {}", response.status),
            }),
            _ => Ok(()),
        }
    }
}

/// Checks a server configuration, mapping each failure to its own message.
///
/// Failures are returned as error validations, never as errors.
pub fn check_configuration(
    connector: &impl OctaneConnector,
    project: &OctaneProject,
    credentials: &OctaneCredentials,
) -> FormValidation {
    match connector.try_to_connect(project, credentials) {
        Ok(()) => FormValidation::ok(markup("green", CONNECTION_SUCCESS)),
        Err(err) => {
            warn!(
                "configuration check for {} (shared space {}) failed: {err}",
                project.location, project.shared_space
            );
            FormValidation::from(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(
        "https://octane.example.com/qcbin/ui/?p=1001/1002",
        "https://octane.example.com/qcbin", "1001/1002" ; "qcbin"
    )]
    #[test_case(
        "http://octane:8080/mqm/ui/?admin&p=2002#/settings",
        "http://octane:8080/mqm", "2002" ; "mqm with fragment"
    )]
    #[test_case(
        "https://octane.example.com/qcbin/ui/?p=1001%2F1002",
        "https://octane.example.com/qcbin", "1001/1002" ; "percent decoded"
    )]
    #[test_case(
        "https://octane.example.com/qcbin/ui/?p=/1002",
        "https://octane.example.com/qcbin", "/1002" ; "leading slash kept"
    )]
    #[test_case(
        "https://octane.example.com/qcbin/ui/?p=team+a&p=2002",
        "https://octane.example.com/qcbin", "team a" ; "first p wins"
    )]
    fn ui_locations(url: &str, location: &str, shared_space: &str) {
        let project = parse_ui_location(url).expect("valid UI location");
        assert_eq!(project.location, location);
        assert_eq!(project.shared_space, shared_space);
    }

    #[test_case("not a url", UiLocationError::InvalidUrl ; "not a url")]
    #[test_case("/qcbin/ui/?p=1", UiLocationError::InvalidUrl ; "relative")]
    #[test_case("https://octane/ui/?p=1", UiLocationError::ApplicationContextNotFound ; "no context")]
    #[test_case("https://octane/qcbin/ui/", UiLocationError::MissingSharedSpace ; "no query")]
    #[test_case("https://octane/qcbin/ui/?q=1", UiLocationError::MissingSharedSpace ; "no p")]
    #[test_case("https://octane/qcbin/ui/?p=", UiLocationError::UnexpectedSharedSpace ; "empty p")]
    #[test_case("https://octane/qcbin/ui/?p", UiLocationError::UnexpectedSharedSpace ; "bare p")]
    fn invalid_ui_locations(url: &str, expected: UiLocationError) {
        assert_eq!(parse_ui_location(url), Err(expected));
    }

    #[test]
    fn ui_location_errors_are_red() {
        let validation = FormValidation::from(&UiLocationError::InvalidUrl);
        assert_eq!(validation.kind(), ValidationKind::Error);
        assert_eq!(validation.html(), "<font color=\"red\"><b>Invalid URL</b></font>");
    }

    #[test]
    fn plain_text_strips_markup() {
        let validation = FormValidation::ok(markup("green", "a &lt; b <div>c</div>"));
        assert_eq!(validation.plain_text(), "a < b c");
    }

    #[test]
    fn credentials_are_redacted() {
        let credentials = OctaneCredentials {
            username: "ci".to_owned(),
            password: "hunter2".to_owned(),
        };
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
