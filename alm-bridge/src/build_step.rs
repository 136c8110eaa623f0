// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tests-to-run conversion build step.
//!
//! The step reads the tests to run from the build parameters, converts them for the configured
//! framework, and writes the result back as a new build parameter. Conversion errors do not
//! propagate: they are reported on the console and the build is marked as failed.

use crate::{
    convert::{ConverterResult, TestsToRunFramework, create_converter},
    errors::{ConvertError, DisplayErrorChain},
    validate::{FormValidation, markup},
};
use indexmap::IndexMap;
use std::{fmt, io};

/// The build parameter holding the raw tests to run.
pub const TESTS_TO_RUN_PARAMETER: &str = "testsToRun";
/// The build parameter holding the directory the tests were checked out to.
pub const CHECKOUT_DIRECTORY_PARAMETER: &str = "testsToRunCheckoutDirectory";
/// The execution directory used when no checkout directory is given.
pub const DEFAULT_EXECUTING_DIRECTORY: &str = "${workspace}";

/// Parameters that are echoed to the console when present.
pub const ECHOED_PARAMETERS: [&str; 3] = ["suiteId", "suiteRunId", "executionId"];

const STEP_NAME: &str = "TestsToRunConverter";

/// The ordered name → value parameters of a build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BuildParameters {
    params: IndexMap<String, String>,
}

impl BuildParameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` lines, as in a Java properties file.
    ///
    /// Blank lines and lines starting with `#` or `!` are skipped. Lines without `=` define an
    /// empty value.
    pub fn parse_properties(input: &str) -> Self {
        input
            .lines()
            .map(str::trim_start)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .map(|line| match line.split_once('=') {
                Some((key, value)) => (key.trim_end(), value.trim_start()),
                None => (line.trim_end(), ""),
            })
            .collect()
    }

    /// Returns a parameter value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Sets a parameter, replacing any existing value while keeping its position.
    pub fn insert_or_replace(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates over parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The result a build step assigns to the build.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BuildResult {
    /// The step succeeded.
    Success,
    /// The step failed; the build is marked as failed.
    Failure,
    /// The step had nothing to do.
    NotRun,
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildResult::Success => f.write_str("SUCCESS"),
            BuildResult::Failure => f.write_str("FAILURE"),
            BuildResult::NotRun => f.write_str("NOT_BUILT"),
        }
    }
}

/// What [`ConvertStep::perform`] did.
#[derive(Debug)]
pub enum StepOutcome {
    /// The tests were converted and the parameter was set.
    Converted {
        /// The framework used.
        framework: TestsToRunFramework,
        /// The conversion.
        result: ConverterResult,
    },
    /// There was nothing to convert.
    Skipped {
        /// Why the step was skipped.
        reason: SkipReason,
    },
    /// The conversion failed.
    Failed {
        /// The conversion error.
        error: ConvertError,
    },
}

impl StepOutcome {
    /// Returns the result this outcome assigns to the build.
    pub fn build_result(&self) -> BuildResult {
        match self {
            StepOutcome::Converted { .. } => BuildResult::Success,
            StepOutcome::Skipped { .. } => BuildResult::NotRun,
            StepOutcome::Failed { .. } => BuildResult::Failure,
        }
    }
}

/// Why a [`ConvertStep`] had nothing to do.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The tests-to-run parameter is missing or empty.
    NoTestsToRun,
    /// No framework is configured.
    NoFramework,
}

/// Converts the build's tests to run for a framework.
#[derive(Clone, Debug, Default)]
pub struct ConvertStep {
    framework: Option<String>,
    format: Option<String>,
}

impl ConvertStep {
    /// Creates a new step. Empty strings are treated as unset.
    pub fn new(framework: Option<String>, format: Option<String>) -> Self {
        Self {
            framework: framework.filter(|f| !f.is_empty()),
            format: format.filter(|f| !f.is_empty()),
        }
    }

    /// Runs the step against `params`, echoing progress to `console`.
    ///
    /// Only console errors are returned; conversion errors are reported in the outcome.
    pub fn perform(
        &self,
        params: &mut BuildParameters,
        console: &mut dyn io::Write,
    ) -> io::Result<StepOutcome> {
        let mut console = Console { out: console };

        for name in ECHOED_PARAMETERS {
            if let Some(value) = params.get(name) {
                console.line(format_args!("{name} : {value}"))?;
            }
        }

        let raw_tests = params.get(TESTS_TO_RUN_PARAMETER).map(str::to_owned);
        if let Some(raw_tests) = &raw_tests {
            console.line(format_args!(
                "{TESTS_TO_RUN_PARAMETER} found with value : {raw_tests}"
            ))?;
        }

        let mut executing_directory = DEFAULT_EXECUTING_DIRECTORY.to_owned();
        match params.get(CHECKOUT_DIRECTORY_PARAMETER) {
            Some(dir) if !dir.is_empty() => {
                executing_directory = dir.to_owned();
                console.line(format_args!(
                    "{CHECKOUT_DIRECTORY_PARAMETER} parameter found with value : {dir}"
                ))?;
            }
            Some(_) => console.line(format_args!(
                "{CHECKOUT_DIRECTORY_PARAMETER} parameter found, but its value is empty. \
                 Using default value."
            ))?,
            None => {}
        }
        console.line(format_args!("checkout directory : {executing_directory}"))?;

        let Some(raw_tests) = raw_tests.filter(|raw| !raw.is_empty()) else {
            console.line(format_args!(
                "{TESTS_TO_RUN_PARAMETER} is not found or has empty value. Skipping."
            ))?;
            return Ok(StepOutcome::Skipped {
                reason: SkipReason::NoTestsToRun,
            });
        };

        let Some(framework_name) = self.framework.as_deref() else {
            console.line(format_args!("No framework is selected. Skipping."))?;
            return Ok(StepOutcome::Skipped {
                reason: SkipReason::NoFramework,
            });
        };
        console.line(format_args!("Selected framework = {framework_name}"))?;
        if let Some(format) = &self.format {
            console.line(format_args!("Using format = {format}"))?;
        }

        let converted = TestsToRunFramework::from_name(framework_name).and_then(|framework| {
            let result = create_converter(framework, self.format.as_deref())?
                .convert(&raw_tests, &executing_directory)?;
            Ok((framework, result))
        });
        let (framework, result) = match converted {
            Ok(converted) => converted,
            Err(error) => {
                console.line(format_args!("Failed to convert : {}", DisplayErrorChain::new(&error)))?;
                return Ok(StepOutcome::Failed { error });
            }
        };

        console.line(format_args!("Found #tests : {}", result.test_count()))?;
        console.line(format_args!(
            "Set to parameter : {} = {}",
            result.parameter_name(),
            result.converted()
        ))?;
        console.line(format_args!(
            "********************* Conversion is done *********************"
        ))?;
        params.insert_or_replace(result.parameter_name(), result.converted());

        Ok(StepOutcome::Converted { framework, result })
    }
}

/// Dry-runs a conversion and reports the outcome as a form validation.
pub fn test_convert(raw_tests: &str, framework: &str, format: &str) -> FormValidation {
    match dry_run(raw_tests, framework, format) {
        Ok(result) => FormValidation::ok(markup(
            "green",
            &format!(
                "Conversion is successful : <div style=\"margin-top:20px\">{}</div>",
                quick_xml::escape::escape(result.converted())
            ),
        )),
        Err(error) => FormValidation::error(markup(
            "red",
            &format!(
                "Failed to convert : {}",
                quick_xml::escape::escape(&DisplayErrorChain::new(&error).to_string())
            ),
        )),
    }
}

fn dry_run(raw_tests: &str, framework: &str, format: &str) -> Result<ConverterResult, ConvertError> {
    if raw_tests.is_empty() {
        return Err(ConvertError::MissingTests);
    }
    if framework.is_empty() {
        return Err(ConvertError::MissingFramework);
    }
    let framework = TestsToRunFramework::from_name(framework)?;
    let format = Some(format).filter(|format| !format.is_empty());
    create_converter(framework, format)?.convert(raw_tests, DEFAULT_EXECUTING_DIRECTORY)
}

struct Console<'a> {
    out: &'a mut dyn io::Write,
}

impl Console<'_> {
    fn line(&mut self, message: fmt::Arguments<'_>) -> io::Result<()> {
        writeln!(self.out, "{STEP_NAME} : {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ValidationKind;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn run(step: &ConvertStep, params: &mut BuildParameters) -> (StepOutcome, String) {
        let mut console = Vec::new();
        let outcome = step
            .perform(params, &mut console)
            .expect("writing to a Vec succeeds");
        (outcome, String::from_utf8(console).expect("console output is UTF-8"))
    }

    #[test]
    fn converts_and_sets_parameter() {
        let step = ConvertStep::new(Some("mvnSurefire".to_owned()), None);
        let mut params: BuildParameters = [
            ("suiteId", "12"),
            ("testsToRun", "v1:pkg|Cls|t1;pkg|Cls|t2"),
            ("testsToRunConverted", "stale"),
        ]
        .into_iter()
        .collect();

        let (outcome, console) = run(&step, &mut params);
        assert_eq!(outcome.build_result(), BuildResult::Success);
        assert_eq!(params.get("testsToRunConverted"), Some("pkg.Cls#t1+t2"));
        assert_eq!(params.len(), 3, "existing parameter is replaced");
        assert_eq!(
            console,
            indoc! {"
                TestsToRunConverter : suiteId : 12
                TestsToRunConverter : testsToRun found with value : v1:pkg|Cls|t1;pkg|Cls|t2
                TestsToRunConverter : checkout directory : ${workspace}
                TestsToRunConverter : Selected framework = mvnSurefire
                TestsToRunConverter : Found #tests : 2
                TestsToRunConverter : Set to parameter : testsToRunConverted = pkg.Cls#t1+t2
                TestsToRunConverter : ********************* Conversion is done *********************
            "}
        );
    }

    #[test]
    fn checkout_directory_is_used() {
        let step = ConvertStep::new(Some("uft".to_owned()), None);
        let mut params: BuildParameters = [
            ("testsToRun", "v1:GUI|Login|Login"),
            ("testsToRunCheckoutDirectory", r"D:\work"),
        ]
        .into_iter()
        .collect();
        let (outcome, console) = run(&step, &mut params);
        assert_eq!(outcome.build_result(), BuildResult::Success);
        assert!(console.contains(r"checkout directory : D:\work"), "{console}");
        assert!(
            params
                .get("testsToRunConverted")
                .is_some_and(|xml| xml.contains(r#"path="D:\work\GUI\Login""#)),
            "{params:?}"
        );
    }

    #[test]
    fn empty_checkout_directory_uses_default() {
        let step = ConvertStep::new(Some("protractor".to_owned()), None);
        let mut params: BuildParameters = [
            ("testsToRun", "v1:||t1"),
            ("testsToRunCheckoutDirectory", ""),
        ]
        .into_iter()
        .collect();
        let (_, console) = run(&step, &mut params);
        assert!(console.contains("but its value is empty"), "{console}");
        assert!(console.contains("checkout directory : ${workspace}"), "{console}");
    }

    #[test]
    fn missing_tests_is_not_run() {
        let step = ConvertStep::new(Some("mvnSurefire".to_owned()), None);
        let mut params: BuildParameters = [("testsToRun", "")].into_iter().collect();
        let (outcome, console) = run(&step, &mut params);
        assert!(matches!(
            outcome,
            StepOutcome::Skipped {
                reason: SkipReason::NoTestsToRun
            }
        ));
        assert_eq!(outcome.build_result(), BuildResult::NotRun);
        assert!(console.ends_with("testsToRun is not found or has empty value. Skipping.\n"));
    }

    #[test]
    fn missing_framework_is_not_run() {
        let step = ConvertStep::new(Some(String::new()), None);
        let mut params: BuildParameters = [("testsToRun", "v1:p|C|t")].into_iter().collect();
        let (outcome, _) = run(&step, &mut params);
        assert!(matches!(
            outcome,
            StepOutcome::Skipped {
                reason: SkipReason::NoFramework
            }
        ));
    }

    #[test]
    fn unknown_framework_fails_the_build() {
        let step = ConvertStep::new(Some("nunit".to_owned()), None);
        let mut params: BuildParameters = [("testsToRun", "v1:p|C|t")].into_iter().collect();
        let (outcome, console) = run(&step, &mut params);
        assert_eq!(outcome.build_result(), BuildResult::Failure);
        assert!(
            console.contains("TestsToRunConverter : Failed to convert : unknown framework `nunit`"),
            "{console}"
        );
        assert_eq!(params.get("testsToRunConverted"), None);
    }

    #[test]
    fn invalid_format_reports_cause() {
        let step = ConvertStep::new(Some("custom".to_owned()), Some("{".to_owned()));
        let mut params: BuildParameters = [("testsToRun", "v1:p|C|t")].into_iter().collect();
        let (outcome, console) = run(&step, &mut params);
        assert!(matches!(
            outcome,
            StepOutcome::Failed {
                error: ConvertError::InvalidFormat { .. }
            }
        ));
        assert!(
            console.contains("Failed to convert : format is not a valid custom conversion format: "),
            "{console}"
        );
    }

    #[test]
    fn properties() {
        let params = BuildParameters::parse_properties(indoc! {"
            # comment
            testsToRun = v1:p|C|t

            ! also a comment
            flag
        "});
        assert_eq!(params.get("testsToRun"), Some("v1:p|C|t"));
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_convert_results() {
        let ok = test_convert("v1:p|C|a<b", "mvnSurefire", "");
        assert_eq!(ok.kind(), ValidationKind::Ok);
        assert_eq!(
            ok.html(),
            "<font color=\"green\"><b>Conversion is successful : \
             <div style=\"margin-top:20px\">p.C#a&lt;b</div></b></font>"
        );

        let missing = test_convert("", "mvnSurefire", "");
        assert_eq!(missing.kind(), ValidationKind::Error);
        assert!(missing.html().contains("&apos;Tests to run&apos; parameter is missing"));

        let no_format = test_convert("v1:p|C|t", "custom", "");
        assert_eq!(no_format.kind(), ValidationKind::Error);
        assert!(no_format.html().contains("Format"), "{}", no_format.html());

        let no_framework = test_convert("v1:p|C|t", "", "");
        assert!(no_framework.html().contains("&apos;Framework&apos; parameter is missing"));
    }
}
