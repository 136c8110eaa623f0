// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions described by a JSON format.
//!
//! ```json
//! {
//!   "testPattern": "$package.$class#$testName",
//!   "testDelimiter": ",",
//!   "prefix": "-Dtest=",
//!   "replacements": [
//!     { "type": "replaceString", "target": "$package|$class", "string": "-", "replacement": "_" }
//!   ]
//! }
//! ```

use super::{DEFAULT_CONVERTED_PARAMETER, TestToRunData, TestsToRunConverter, join_package_and_class};
use crate::errors::ConvertError;
use itertools::Itertools;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:packageAndClass|package|class|testName|parameter\(([^)]*)\))")
        .expect("placeholder regex is valid")
});

/// A converter whose output is fully defined by a JSON format.
#[derive(Clone, Debug)]
pub struct CustomConverter {
    test_pattern: String,
    test_delimiter: String,
    prefix: String,
    suffix: String,
    parameter_name: String,
    allow_duplication: bool,
    replacements: Vec<Replacement>,
}

impl CustomConverter {
    /// Parses a JSON format.
    pub fn from_json(format: &str) -> Result<Self, ConvertError> {
        let raw: RawFormat =
            serde_json::from_str(format).map_err(|err| ConvertError::InvalidFormat { err })?;
        let replacements = raw
            .replacements
            .into_iter()
            .map(Replacement::compile)
            .collect::<Result<_, _>>()?;

        Ok(Self {
            test_pattern: raw.test_pattern,
            test_delimiter: raw.test_delimiter,
            prefix: raw.prefix,
            suffix: raw.suffix,
            parameter_name: raw
                .tests_to_run_converted_parameter
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_CONVERTED_PARAMETER.to_owned()),
            allow_duplication: raw.allow_duplication,
            replacements,
        })
    }

    fn render(&self, test: &TestToRunData) -> String {
        let package = self.apply(Placeholder::Package, &test.package_name);
        let class = self.apply(Placeholder::Class, &test.class_name);
        let test_name = self.apply(Placeholder::TestName, &test.test_name);
        let package_and_class = self.apply(
            Placeholder::PackageAndClass,
            &join_package_and_class(&package, &class),
        );

        PLACEHOLDER
            .replace_all(&self.test_pattern, |caps: &Captures<'_>| {
                if let Some(key) = caps.get(1) {
                    return test.parameter(key.as_str()).unwrap_or_default().to_owned();
                }
                match &caps[0] {
                    "$packageAndClass" => package_and_class.clone(),
                    "$package" => package.clone(),
                    "$class" => class.clone(),
                    _ => test_name.clone(),
                }
            })
            .into_owned()
    }

    fn apply(&self, target: Placeholder, value: &str) -> String {
        self.replacements
            .iter()
            .filter(|replacement| replacement.targets.contains(&target))
            .fold(value.to_owned(), |value, replacement| {
                replacement.action.apply(&value)
            })
    }
}

impl TestsToRunConverter for CustomConverter {
    fn convert_tests(
        &self,
        tests: &[TestToRunData],
        _execution_directory: &str,
    ) -> Result<String, ConvertError> {
        let mut rendered = tests.iter().map(|test| self.render(test));
        let body = if self.allow_duplication {
            rendered.join(&self.test_delimiter)
        } else {
            rendered.unique().join(&self.test_delimiter)
        };
        Ok(format!("{}{body}{}", self.prefix, self.suffix))
    }

    fn parameter_name(&self) -> &str {
        &self.parameter_name
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormat {
    test_pattern: String,
    #[serde(default = "default_delimiter")]
    test_delimiter: String,
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    suffix: String,
    #[serde(default)]
    tests_to_run_converted_parameter: Option<String>,
    #[serde(default = "default_allow_duplication")]
    allow_duplication: bool,
    #[serde(default)]
    replacements: Vec<RawReplacement>,
}

fn default_delimiter() -> String {
    ",".to_owned()
}

fn default_allow_duplication() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum RawReplacement {
    ReplaceString {
        target: String,
        string: String,
        replacement: String,
    },
    ReplaceRegex {
        target: String,
        regex: String,
        replacement: String,
    },
    ReplaceRegexFirst {
        target: String,
        regex: String,
        replacement: String,
    },
    ToUpperCase {
        target: String,
    },
    ToLowerCase {
        target: String,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Placeholder {
    Package,
    Class,
    TestName,
    PackageAndClass,
}

impl Placeholder {
    const ALL: [Self; 4] = [
        Self::Package,
        Self::Class,
        Self::TestName,
        Self::PackageAndClass,
    ];

    fn token(self) -> &'static str {
        match self {
            Self::Package => "$package",
            Self::Class => "$class",
            Self::TestName => "$testName",
            Self::PackageAndClass => "$packageAndClass",
        }
    }

    fn parse_targets(target: &str) -> Result<Vec<Self>, ConvertError> {
        target
            .split('|')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                Self::ALL
                    .into_iter()
                    .find(|placeholder| placeholder.token() == token)
                    .ok_or_else(|| ConvertError::UnknownReplacementTarget {
                        target: token.to_owned(),
                        known: Self::ALL.iter().map(|p| p.token()).collect(),
                    })
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
struct Replacement {
    targets: Vec<Placeholder>,
    action: ReplaceAction,
}

#[derive(Clone, Debug)]
enum ReplaceAction {
    String { from: String, to: String },
    Regex { regex: Regex, to: String },
    RegexFirst { regex: Regex, to: String },
    UpperCase,
    LowerCase,
}

impl Replacement {
    fn compile(raw: RawReplacement) -> Result<Self, ConvertError> {
        let (target, action) = match raw {
            RawReplacement::ReplaceString {
                target,
                string,
                replacement,
            } => (
                target,
                ReplaceAction::String {
                    from: string,
                    to: replacement,
                },
            ),
            RawReplacement::ReplaceRegex {
                target,
                regex,
                replacement,
            } => (
                target,
                ReplaceAction::Regex {
                    regex: compile_regex(regex)?,
                    to: replacement,
                },
            ),
            RawReplacement::ReplaceRegexFirst {
                target,
                regex,
                replacement,
            } => (
                target,
                ReplaceAction::RegexFirst {
                    regex: compile_regex(regex)?,
                    to: replacement,
                },
            ),
            RawReplacement::ToUpperCase { target } => (target, ReplaceAction::UpperCase),
            RawReplacement::ToLowerCase { target } => (target, ReplaceAction::LowerCase),
        };
        Ok(Self {
            targets: Placeholder::parse_targets(&target)?,
            action,
        })
    }
}

fn compile_regex(regex: String) -> Result<Regex, ConvertError> {
    Regex::new(&regex).map_err(|err| ConvertError::InvalidRegex { regex, err })
}

impl ReplaceAction {
    fn apply(&self, value: &str) -> String {
        match self {
            ReplaceAction::String { from, to } => value.replace(from.as_str(), to),
            ReplaceAction::Regex { regex, to } => regex.replace_all(value, to.as_str()).into_owned(),
            ReplaceAction::RegexFirst { regex, to } => regex.replace(value, to.as_str()).into_owned(),
            ReplaceAction::UpperCase => value.to_uppercase(),
            ReplaceAction::LowerCase => value.to_lowercase(),
        }
    }
}
