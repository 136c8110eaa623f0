// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use alm_bridge::{
    build_step::{BuildParameters, BuildResult, ConvertStep, StepOutcome},
    convert::TestsToRunFramework,
};
use alm_bridge_metadata::ConvertSummary;
use color_eyre::eyre::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use test_case::test_case;

const TESTS_TO_RUN: &str =
    "v1:com.example|LoginTest|validLogin;com.example|LoginTest|lockedOut|browser=firefox";

#[test_case("mvnSurefire", None, "com.example.LoginTest#validLogin+lockedOut" ; "surefire")]
#[test_case(
    "gradle", None,
    " --tests com.example.LoginTest.validLogin --tests com.example.LoginTest.lockedOut" ; "gradle"
)]
#[test_case(
    "custom",
    Some(r#"{"testPattern": "$class.$testName[$parameter(browser)]", "testDelimiter": " "}"#),
    "LoginTest.validLogin[] LoginTest.lockedOut[firefox]" ; "custom"
)]
fn test_convert_step(framework: &str, format: Option<&str>, expected: &str) -> Result<()> {
    test_init();

    let mut params: BuildParameters = [
        ("executionId", "1042"),
        ("testsToRun", TESTS_TO_RUN),
        ("testsToRunConverted", "left over from a previous step"),
    ]
    .into_iter()
    .collect();
    let step = ConvertStep::new(Some(framework.to_owned()), format.map(str::to_owned));

    let mut console = Vec::new();
    let outcome = step.perform(&mut params, &mut console)?;
    let console = String::from_utf8(console)?;

    assert_eq!(outcome.build_result(), BuildResult::Success);
    assert_eq!(params.get("testsToRunConverted"), Some(expected));
    assert_eq!(
        params.iter().map(|(name, _)| name).collect::<Vec<_>>(),
        ["executionId", "testsToRun", "testsToRunConverted"],
        "the converted parameter keeps its position"
    );
    assert!(console.starts_with("TestsToRunConverter : executionId : 1042\n"));
    assert!(console.contains("TestsToRunConverter : Found #tests : 2\n"));

    let StepOutcome::Converted { framework, result } = outcome else {
        unreachable!("build result is success");
    };
    let summary = result.to_summary(framework);
    let json = serde_json::to_string(&summary)?;
    let parsed = ConvertSummary::parse_json(&json)?;
    assert_eq!(parsed.converted, expected);
    assert_eq!(parsed.tests[1].parameters.get("browser").map(String::as_str), Some("firefox"));

    Ok(())
}

#[test]
fn test_convert_step_from_properties() -> Result<()> {
    test_init();

    let mut params = BuildParameters::parse_properties(indoc! {r"
        suiteId=7
        suiteRunId=8
        testsToRun=v1:GUITests|Checkout|Checkout
        testsToRunCheckoutDirectory=C:\ws
    "});
    let step = ConvertStep::new(Some(TestsToRunFramework::Uft.name().to_owned()), None);

    let mut console = Vec::new();
    let outcome = step.perform(&mut params, &mut console)?;
    assert_eq!(outcome.build_result(), BuildResult::Success);
    assert_eq!(
        params.get("testsToRunConverted"),
        Some(indoc! {r#"
            <Mtbx>
                <Test name="Checkout" path="C:\ws\GUITests\Checkout"/>
            </Mtbx>"#})
    );

    let console = String::from_utf8(console)?;
    assert_eq!(
        console.lines().take(3).collect::<Vec<_>>(),
        [
            "TestsToRunConverter : suiteId : 7",
            "TestsToRunConverter : suiteRunId : 8",
            "TestsToRunConverter : testsToRun found with value : v1:GUITests|Checkout|Checkout",
        ]
    );

    Ok(())
}

#[test]
fn test_convert_step_failure_is_not_an_error() -> Result<()> {
    test_init();

    let mut params: BuildParameters = [("testsToRun", "tests without a version prefix")]
        .into_iter()
        .collect();
    let step = ConvertStep::new(Some("junit4".to_owned()), None);

    let mut console = Vec::new();
    let outcome = step.perform(&mut params, &mut console)?;
    assert_eq!(outcome.build_result(), BuildResult::Failure);
    assert_eq!(params.len(), 1);

    let console = String::from_utf8(console)?;
    assert!(
        console.contains("TestsToRunConverter : Failed to convert : malformed tests to run"),
        "{console}"
    );

    Ok(())
}
