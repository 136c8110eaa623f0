// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root element for a serializable tests-to-run conversion.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConvertSummary {
    /// The framework the tests were converted for, e.g. `mvnSurefire`.
    pub framework: String,

    /// The build parameter the converted string was written to.
    pub parameter_name: String,

    /// The converted tests-to-run string.
    pub converted: String,

    /// The number of tests that were converted.
    pub test_count: usize,

    /// The parsed tests, in input order.
    pub tests: Vec<TestToRunSummary>,
}

impl ConvertSummary {
    /// Parses JSON output from `alm-bridge convert --message-format json`.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }
}

/// A single test entry in a [`ConvertSummary`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestToRunSummary {
    /// The package (or folder) the test lives in. May be empty.
    pub package_name: String,

    /// The class name. May be empty.
    pub class_name: String,

    /// The test name.
    pub test_name: String,

    /// Extra `key=value` parameters attached to the test.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

/// Root element for a serializable batch upload.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UploadSummary {
    /// Runs in input order.
    pub runs: Vec<UploadedRunSummary>,
}

impl UploadSummary {
    /// Parses JSON output from `alm-bridge upload --message-format json`.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }

    /// Returns the number of runs that were created on the server.
    pub fn created_count(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| !matches!(run, UploadedRunSummary::Skipped { .. }))
            .count()
    }

    /// Returns the number of runs skipped by the version policy.
    pub fn skipped_count(&self) -> usize {
        self.runs.len() - self.created_count()
    }
}

/// The outcome of uploading a single run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum UploadedRunSummary {
    /// The run was created with all of its fields.
    Created {
        /// The server-assigned run id, if the server returned one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// The run was created without a status, then its status was updated.
    CreatedWithStatus {
        /// The server-assigned run id.
        id: String,

        /// The status written in the follow-up update.
        status: String,
    },

    /// The version policy refused the run; nothing was sent to the server.
    Skipped {
        /// A human-readable reason.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(r#"{"runs": []}"#, 0, 0 ; "empty")]
    #[test_case(
        r#"{"runs": [
            {"outcome": "created", "id": "12"},
            {"outcome": "created-with-status", "id": "13", "status": "Passed"},
            {"outcome": "skipped", "reason": "run version 7 is newer than test version 3"}
        ]}"#,
        2, 1 ; "mixed"
    )]
    fn parse_upload_summary(input: &str, created: usize, skipped: usize) {
        let summary = UploadSummary::parse_json(input).expect("summary parses");
        assert_eq!(summary.created_count(), created);
        assert_eq!(summary.skipped_count(), skipped);
    }

    #[test]
    fn convert_summary_omits_empty_parameters() {
        let summary = ConvertSummary {
            framework: "mvnSurefire".to_owned(),
            parameter_name: "testsToRunConverted".to_owned(),
            converted: "pkg.Cls#t1".to_owned(),
            test_count: 1,
            tests: vec![TestToRunSummary {
                package_name: "pkg".to_owned(),
                class_name: "Cls".to_owned(),
                test_name: "t1".to_owned(),
                parameters: BTreeMap::new(),
            }],
        };
        let json = serde_json::to_string(&summary).expect("serialization succeeds");
        assert!(!json.contains("parameters"), "empty parameters are skipped: {json}");
        assert_eq!(ConvertSummary::parse_json(&json).expect("round trip"), summary);
    }
}
