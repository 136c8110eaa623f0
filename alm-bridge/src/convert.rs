// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converting ALM Octane tests-to-run lists into test framework arguments.
//!
//! ALM Octane hands a build the tests to run as a single string:
//!
//! ```text
//! v1:com.example|LoginTest|validLogin;com.example|LoginTest|lockedOut|browser=chrome
//! ```
//!
//! Each `;`-separated entry is `package|class|test`, optionally followed by `|key=value`
//! parameters. A [`TestsToRunConverter`] renders the parsed entries into whatever the selected
//! framework expects on its command line, for example `com.example.LoginTest#validLogin+lockedOut`
//! for Maven Surefire.

mod custom;
mod uft;

pub use custom::CustomConverter;
pub use uft::MtbxConverter;

use crate::errors::ConvertError;
use alm_bridge_metadata::{ConvertSummary, TestToRunSummary};
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt;

/// The parameter the converted string is written to, unless the format names another.
pub const DEFAULT_CONVERTED_PARAMETER: &str = "testsToRunConverted";

const RAW_PREFIX: &str = "v1:";

/// The frameworks a tests-to-run list can be converted for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TestsToRunFramework {
    /// Maven Surefire (`-Dtest=...`).
    MvnSurefire,
    /// JUnit 4 over the command line.
    JUnit4,
    /// Gradle (`--tests ...`).
    Gradle,
    /// Cucumber JVM feature files.
    CucumberJvm,
    /// Protractor (`--grep ...`).
    Protractor,
    /// UFT One, rendered as an MTBX document.
    Uft,
    /// A format supplied as JSON.
    Custom,
}

impl TestsToRunFramework {
    /// All frameworks, in display order.
    pub const ALL: [Self; 7] = [
        Self::MvnSurefire,
        Self::JUnit4,
        Self::Gradle,
        Self::CucumberJvm,
        Self::Protractor,
        Self::Uft,
        Self::Custom,
    ];

    /// Returns the framework's identifier.
    pub fn name(self) -> &'static str {
        match self {
            Self::MvnSurefire => "mvnSurefire",
            Self::JUnit4 => "junit4",
            Self::Gradle => "gradle",
            Self::CucumberJvm => "cucumber_jvm",
            Self::Protractor => "protractor",
            Self::Uft => "uft",
            Self::Custom => "custom",
        }
    }

    /// Returns a human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::MvnSurefire => "Maven Surefire",
            Self::JUnit4 => "JUnit (over command line)",
            Self::Gradle => "Gradle",
            Self::CucumberJvm => "Cucumber-JVM over Maven",
            Self::Protractor => "Protractor",
            Self::Uft => "UFT",
            Self::Custom => "Custom",
        }
    }

    /// Looks up a framework by identifier.
    pub fn from_name(name: &str) -> Result<Self, ConvertError> {
        Self::ALL
            .into_iter()
            .find(|framework| framework.name() == name)
            .ok_or_else(|| ConvertError::UnknownFramework {
                name: name.to_owned(),
                known: Self::ALL.iter().map(|framework| framework.name()).collect(),
            })
    }

    /// Returns true if the framework cannot be used without a format.
    pub fn requires_format(self) -> bool {
        self == Self::Custom
    }
}

impl fmt::Display for TestsToRunFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single test parsed from a tests-to-run list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestToRunData {
    /// The package, or folder for UFT. May be empty.
    pub package_name: String,
    /// The class name. May be empty.
    pub class_name: String,
    /// The test name.
    pub test_name: String,
    /// Extra parameters, in input order.
    pub parameters: IndexMap<String, String>,
}

impl TestToRunData {
    /// Returns `package.class`, or just the class if the package is empty.
    pub fn package_and_class(&self) -> String {
        join_package_and_class(&self.package_name, &self.class_name)
    }

    /// Returns a parameter value.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    fn to_summary(&self) -> TestToRunSummary {
        TestToRunSummary {
            package_name: self.package_name.clone(),
            class_name: self.class_name.clone(),
            test_name: self.test_name.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

pub(crate) fn join_package_and_class(package: &str, class: &str) -> String {
    if package.is_empty() {
        class.to_owned()
    } else {
        format!("{package}.{class}")
    }
}

/// Parses a raw `v1:` tests-to-run string.
///
/// Empty entries are ignored. Parameters without `=` are rejected.
pub fn parse_tests_to_run(raw: &str) -> Result<Vec<TestToRunData>, ConvertError> {
    let body = raw
        .trim()
        .strip_prefix(RAW_PREFIX)
        .ok_or_else(|| ConvertError::MalformedTestsToRun {
            raw: raw.to_owned(),
            reason: "expected the `v1:` prefix",
        })?;

    body.split(';')
        .filter(|entry| !entry.trim().is_empty())
        .map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Result<TestToRunData, ConvertError> {
    let mut parts = entry.split('|');
    let (Some(package_name), Some(class_name), Some(test_name)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(ConvertError::MalformedTestsToRun {
            raw: entry.to_owned(),
            reason: "expected `package|class|test`",
        });
    };

    let parameters = parts
        .map(|param| {
            param
                .split_once('=')
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .ok_or_else(|| ConvertError::MalformedTestsToRun {
                    raw: entry.to_owned(),
                    reason: "expected parameters as `key=value`",
                })
        })
        .collect::<Result<_, _>>()?;

    Ok(TestToRunData {
        package_name: package_name.to_owned(),
        class_name: class_name.to_owned(),
        test_name: test_name.to_owned(),
        parameters,
    })
}

/// The output of a conversion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConverterResult {
    tests: Vec<TestToRunData>,
    converted: String,
    parameter_name: String,
}

impl ConverterResult {
    /// The parsed tests.
    pub fn tests(&self) -> &[TestToRunData] {
        &self.tests
    }

    /// The number of tests converted.
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// The converted string.
    pub fn converted(&self) -> &str {
        &self.converted
    }

    /// The build parameter the converted string should be written to.
    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    /// Returns the serializable form of this result.
    pub fn to_summary(&self, framework: TestsToRunFramework) -> ConvertSummary {
        ConvertSummary {
            framework: framework.name().to_owned(),
            parameter_name: self.parameter_name.clone(),
            converted: self.converted.clone(),
            test_count: self.test_count(),
            tests: self.tests.iter().map(TestToRunData::to_summary).collect(),
        }
    }
}

/// Renders parsed tests for a framework.
pub trait TestsToRunConverter: fmt::Debug {
    /// Renders `tests`. `execution_directory` is where the tests were checked out.
    fn convert_tests(
        &self,
        tests: &[TestToRunData],
        execution_directory: &str,
    ) -> Result<String, ConvertError>;

    /// The build parameter the result is written to.
    fn parameter_name(&self) -> &str {
        DEFAULT_CONVERTED_PARAMETER
    }

    /// Parses `raw` and renders the tests.
    fn convert(&self, raw: &str, execution_directory: &str) -> Result<ConverterResult, ConvertError> {
        let tests = parse_tests_to_run(raw)?;
        let converted = self.convert_tests(&tests, execution_directory)?;
        Ok(ConverterResult {
            tests,
            converted,
            parameter_name: self.parameter_name().to_owned(),
        })
    }
}

/// Creates the converter for a framework.
///
/// A non-empty `format` is parsed as a custom JSON format and overrides the framework's built-in
/// rendering. The `custom` framework requires one.
pub fn create_converter(
    framework: TestsToRunFramework,
    format: Option<&str>,
) -> Result<Box<dyn TestsToRunConverter>, ConvertError> {
    if let Some(format) = format.filter(|format| !format.trim().is_empty()) {
        return Ok(Box::new(CustomConverter::from_json(format)?));
    }

    let converter: Box<dyn TestsToRunConverter> = match framework {
        TestsToRunFramework::MvnSurefire | TestsToRunFramework::JUnit4 => {
            Box::new(ClassGroupedConverter)
        }
        TestsToRunFramework::Gradle => Box::new(CustomConverter::from_json(GRADLE_FORMAT)?),
        TestsToRunFramework::CucumberJvm => {
            Box::new(CustomConverter::from_json(CUCUMBER_JVM_FORMAT)?)
        }
        TestsToRunFramework::Protractor => {
            Box::new(CustomConverter::from_json(PROTRACTOR_FORMAT)?)
        }
        TestsToRunFramework::Uft => Box::new(MtbxConverter),
        TestsToRunFramework::Custom => {
            return Err(ConvertError::MissingFormat {
                framework: framework.name(),
            });
        }
    };
    Ok(converter)
}

const GRADLE_FORMAT: &str = r#"{"testPattern": " --tests $packageAndClass.$testName", "testDelimiter": ""}"#;
const CUCUMBER_JVM_FORMAT: &str =
    r#"{"testPattern": "\"$testName\"", "testDelimiter": " ", "allowDuplication": false}"#;
const PROTRACTOR_FORMAT: &str = r#"{"testPattern": "$testName", "testDelimiter": "|"}"#;

/// Renders `pkg.Class#test1+test2,pkg.Other#test3`, the syntax shared by Maven Surefire and the
/// JUnit 4 command line.
#[derive(Copy, Clone, Debug)]
struct ClassGroupedConverter;

impl TestsToRunConverter for ClassGroupedConverter {
    fn convert_tests(
        &self,
        tests: &[TestToRunData],
        _execution_directory: &str,
    ) -> Result<String, ConvertError> {
        let mut by_class: IndexMap<String, Vec<&str>> = IndexMap::new();
        for test in tests {
            by_class
                .entry(test.package_and_class())
                .or_default()
                .push(&test.test_name);
        }
        Ok(by_class
            .iter()
            .map(|(class, tests)| format!("{class}#{}", tests.iter().join("+")))
            .join(","))
    }
}
