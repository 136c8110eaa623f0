// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use alm_bridge::validate::{
    OctaneCredentials, ValidationKind, check_configuration, parse_ui_location,
};
use color_eyre::eyre::Result;
use pretty_assertions::assert_eq;
use test_case::test_case;

fn credentials() -> OctaneCredentials {
    OctaneCredentials {
        username: "ci-client".to_owned(),
        password: "secret".to_owned(),
    }
}

#[test_case(Script::Succeed, ValidationKind::Ok, "<font color=\"green\"><b>Connection successful.</b></font>" ; "success")]
#[test_case(Script::Authentication, ValidationKind::Error, "<font color=\"red\"><b>Authentication failed.</b></font>" ; "authentication")]
#[test_case(Script::SessionCreation, ValidationKind::Error, "<font color=\"red\"><b>Session creation failed.</b></font>" ; "session creation")]
#[test_case(Script::SharedSpace, ValidationKind::Error, "<font color=\"red\"><b>Shared space validation failed.</b></font>" ; "shared space")]
#[test_case(Script::Request, ValidationKind::Error, "<font color=\"red\"><b>Connection failed.</b></font>" ; "request error")]
fn test_check_configuration(script: Script, kind: ValidationKind, html: &str) -> Result<()> {
    test_init();

    let project = parse_ui_location("https://octane.example.com/qcbin/ui/?p=1001/1002")?;
    let connector = ScriptedConnector::new(script);
    let validation = check_configuration(&connector, &project, &credentials());

    assert_eq!(validation.kind(), kind);
    assert_eq!(validation.html(), html);
    assert_eq!(
        connector.seen(),
        [(project, "ci-client".to_owned())],
        "exactly one connection attempt is made"
    );

    Ok(())
}

#[test]
fn test_plain_text_for_terminal() -> Result<()> {
    test_init();

    let project = parse_ui_location("http://octane:8080/mqm/ui/?p=3003")?;
    let validation = check_configuration(
        &ScriptedConnector::new(Script::SharedSpace),
        &project,
        &credentials(),
    );
    assert_eq!(validation.plain_text(), "Shared space validation failed.");
    assert_eq!(project.location, "http://octane:8080/mqm");

    Ok(())
}
