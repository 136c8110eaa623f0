// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decides whether a run may be uploaded, and maps raw run statuses.
//!
//! The rules only apply when ALM versioning is enabled for tests. Under versioning, a run records
//! the test version it was executed against in `udf|Run On Version`, and a run may never claim a
//! version newer than the test's latest version (`vc-version-number`).

use crate::entity::{EntityFields, NO_RUN_STATUS, run, test};
use indexmap::IndexMap;
use std::{collections::BTreeSet, fmt};
use tracing::{error, info};

/// Test subtypes that do not support versioning.
pub const DEFAULT_EXEMPT_SUBTYPES: [&str; 4] =
    ["ALT-SCENARIO", "LEANFT-TEST", "LR-SCENARIO", "QAINSPECT-TEST"];

/// Policy tables applied to each run before upload.
///
/// All of these come from configuration; see the `[upload]` section of the config file.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    exempt_subtypes: BTreeSet<String>,
    versioning_enabled: bool,
    status_mapping: IndexMap<String, String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            exempt_subtypes: DEFAULT_EXEMPT_SUBTYPES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            versioning_enabled: true,
            status_mapping: IndexMap::new(),
        }
    }
}

impl UploadPolicy {
    /// Creates a new policy.
    pub fn new(
        exempt_subtypes: impl IntoIterator<Item = impl Into<String>>,
        versioning_enabled: bool,
        status_mapping: IndexMap<String, String>,
    ) -> Self {
        Self {
            exempt_subtypes: exempt_subtypes.into_iter().map(Into::into).collect(),
            versioning_enabled,
            status_mapping,
        }
    }

    /// Returns true if versioning is enabled for the test entity.
    pub fn versioning_enabled(&self) -> bool {
        self.versioning_enabled
    }

    /// Returns true if runs of this test may proceed, possibly filling or clamping the run's
    /// version field.
    pub fn should_proceed(&self, test: &EntityFields, run: &mut EntityFields) -> bool {
        self.evaluate(test, run).proceeds()
    }

    /// Evaluates the version rules for a run, returning the reason for the decision.
    ///
    /// `run` is updated in place when the version is filled in or clamped.
    pub fn evaluate(&self, test: &EntityFields, run: &mut EntityFields) -> VersionDecision {
        if let Some(subtype) = test.get(test::SUBTYPE_ID) {
            if self.exempt_subtypes.contains(subtype) {
                return VersionDecision::Exempt {
                    subtype: subtype.to_owned(),
                };
            }
        }

        if !self.versioning_enabled {
            return VersionDecision::VersioningDisabled;
        }

        let Some(run_version) = run.get(run::RUN_ON_VERSION) else {
            return VersionDecision::NotTracked;
        };
        let Some(test_version) = test.get_non_empty(test::VC_VERSION_NUMBER) else {
            return VersionDecision::NotTracked;
        };

        if run_version.is_empty() {
            let version = test_version.to_owned();
            run.insert(run::RUN_ON_VERSION, version.clone());
            info!("run on version not found, setting it to the latest test version {version}");
            return VersionDecision::Filled { version };
        }

        let (test_latest, run_version_num) =
            match (test_version.parse::<i32>(), run_version.parse::<i32>()) {
                (Ok(test_latest), Ok(run_version_num)) => (test_latest, run_version_num),
                _ => {
                    let decision = VersionDecision::Malformed {
                        run_version: run_version.to_owned(),
                        test_version: test_version.to_owned(),
                    };
                    error!("{decision}");
                    return decision;
                }
            };

        if run_version_num > test_latest {
            let decision = VersionDecision::TooNew {
                run_version: run_version_num,
                test_version: test_latest,
            };
            error!("{decision}");
            decision
        } else if run_version_num < 1 {
            run.insert(run::RUN_ON_VERSION, "1");
            info!("run on version is {run_version_num}, the minimum version is 1: setting it to 1");
            VersionDecision::Clamped {
                from: run_version_num,
            }
        } else {
            VersionDecision::Accepted {
                version: run_version_num,
            }
        }
    }

    /// Maps a raw run status through the status mapping.
    ///
    /// An empty status becomes `No Run`; statuses without a mapping pass through unchanged.
    pub fn map_status<'a>(&'a self, status: &'a str) -> &'a str {
        if status.is_empty() {
            return NO_RUN_STATUS;
        }
        self.status_mapping
            .get(status)
            .map_or(status, String::as_str)
    }
}

/// The outcome of [`UploadPolicy::evaluate`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VersionDecision {
    /// The test subtype does not support versioning.
    Exempt {
        /// The test subtype.
        subtype: String,
    },
    /// Versioning is disabled for tests.
    VersioningDisabled,
    /// The run has no version field, or the test has no version number.
    NotTracked,
    /// The run's version was empty and was set to the test's latest version.
    Filled {
        /// The version written to the run.
        version: String,
    },
    /// The run's version was below 1 and was set to 1.
    Clamped {
        /// The original version.
        from: i32,
    },
    /// The run's version is within range.
    Accepted {
        /// The run version.
        version: i32,
    },
    /// The run's version is newer than the test's latest version.
    TooNew {
        /// The run version.
        run_version: i32,
        /// The test's latest version.
        test_version: i32,
    },
    /// One of the versions was not an integer.
    Malformed {
        /// The run version as supplied.
        run_version: String,
        /// The test version as supplied.
        test_version: String,
    },
}

impl VersionDecision {
    /// Returns true if the upload should go ahead.
    pub fn proceeds(&self) -> bool {
        !matches!(
            self,
            VersionDecision::TooNew { .. } | VersionDecision::Malformed { .. }
        )
    }
}

impl fmt::Display for VersionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionDecision::Exempt { subtype } => {
                write!(f, "test subtype {subtype} has no version support")
            }
            VersionDecision::VersioningDisabled => write!(f, "versioning is disabled"),
            VersionDecision::NotTracked => write!(f, "run version is not tracked"),
            VersionDecision::Filled { version } => {
                write!(f, "run version set to latest test version {version}")
            }
            VersionDecision::Clamped { from } => write!(f, "run version {from} clamped to 1"),
            VersionDecision::Accepted { version } => write!(f, "run version {version} accepted"),
            VersionDecision::TooNew {
                run_version,
                test_version,
            } => write!(
                f,
                "run version {run_version} is larger than latest test version {test_version}"
            ),
            VersionDecision::Malformed {
                run_version,
                test_version,
            } => write!(
                f,
                "version number illegal (run version `{run_version}`, test version `{test_version}`)"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use test_case::test_case;
    use test_strategy::proptest;

    fn fields(pairs: &[(&str, &str)]) -> EntityFields {
        pairs.iter().copied().collect()
    }

    fn versioned_test(version: &str) -> EntityFields {
        fields(&[("id", "7"), ("subtype-id", "MANUAL"), ("vc-version-number", version)])
    }

    #[test_case("3", "", true, Some("3") ; "empty run version is filled")]
    #[test_case("3", "2", true, Some("2") ; "older version accepted")]
    #[test_case("3", "3", true, Some("3") ; "same version accepted")]
    #[test_case("3", "4", false, Some("4") ; "newer version refused")]
    #[test_case("3", "0", true, Some("1") ; "zero clamped")]
    #[test_case("3", "-2", true, Some("1") ; "negative clamped")]
    #[test_case("3", "v2", false, Some("v2") ; "malformed run version")]
    #[test_case("x", "2", false, Some("2") ; "malformed test version")]
    #[test_case("3", " 2", false, Some(" 2") ; "whitespace is not trimmed")]
    fn versioning_rules(
        test_version: &str,
        run_version: &str,
        proceeds: bool,
        expected: Option<&str>,
    ) {
        let policy = UploadPolicy::default();
        let test = versioned_test(test_version);
        let mut run = fields(&[(run::RUN_ON_VERSION, run_version)]);
        assert_eq!(policy.should_proceed(&test, &mut run), proceeds);
        assert_eq!(run.get(run::RUN_ON_VERSION), expected);
    }

    #[test]
    fn untracked_runs_proceed() {
        let policy = UploadPolicy::default();

        let mut run = EntityFields::new();
        assert_eq!(
            policy.evaluate(&versioned_test("3"), &mut run),
            VersionDecision::NotTracked
        );

        let mut run = fields(&[(run::RUN_ON_VERSION, "9")]);
        assert_eq!(
            policy.evaluate(&versioned_test(""), &mut run),
            VersionDecision::NotTracked
        );
        assert_eq!(run.get(run::RUN_ON_VERSION), Some("9"));
    }

    #[test]
    fn versioning_disabled_proceeds() {
        let policy = UploadPolicy::new(DEFAULT_EXEMPT_SUBTYPES, false, IndexMap::new());
        let mut run = fields(&[(run::RUN_ON_VERSION, "99")]);
        assert_eq!(
            policy.evaluate(&versioned_test("3"), &mut run),
            VersionDecision::VersioningDisabled
        );
    }

    #[test]
    fn test_without_subtype_is_not_exempt() {
        let policy = UploadPolicy::default();
        let test = fields(&[("vc-version-number", "1")]);
        let mut run = fields(&[(run::RUN_ON_VERSION, "2")]);
        assert!(!policy.should_proceed(&test, &mut run));
    }

    #[proptest]
    fn exempt_subtypes_always_proceed(
        #[strategy(0..DEFAULT_EXEMPT_SUBTYPES.len())] index: usize,
        run_version: String,
        test_version: String,
    ) {
        let policy = UploadPolicy::default();
        let test = fields(&[
            ("subtype-id", DEFAULT_EXEMPT_SUBTYPES[index]),
            ("vc-version-number", test_version.as_str()),
        ]);
        let mut run = fields(&[(run::RUN_ON_VERSION, run_version.as_str())]);
        assert!(policy.should_proceed(&test, &mut run));
        assert_eq!(run.get(run::RUN_ON_VERSION), Some(run_version.as_str()));
    }

    #[proptest]
    fn newer_versions_never_proceed(
        #[strategy(1..10_000i32)] test_version: i32,
        #[strategy(1..10_000i32)] delta: i32,
    ) {
        let policy = UploadPolicy::default();
        let test = versioned_test(&test_version.to_string());
        let run_version = (test_version + delta).to_string();
        let mut run = fields(&[(run::RUN_ON_VERSION, run_version.as_str())]);
        assert!(!policy.should_proceed(&test, &mut run));
    }

    #[test]
    fn status_mapping() {
        let mapping: IndexMap<_, _> = btreemap! {
            "passed".to_owned() => "Passed".to_owned(),
            "failed".to_owned() => "Failed".to_owned(),
        }
        .into_iter()
        .collect();
        let policy = UploadPolicy::new(DEFAULT_EXEMPT_SUBTYPES, true, mapping);
        assert_eq!(policy.map_status("passed"), "Passed");
        assert_eq!(policy.map_status("Blocked"), "Blocked");
        assert_eq!(policy.map_status(""), NO_RUN_STATUS);
    }
}
