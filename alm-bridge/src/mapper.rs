// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fills relations and computed fields on a run record before upload.

use crate::entity::{EntityFields, common, run, test_instance};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use indexmap::IndexMap;
use tracing::debug;

/// The related entities a run is attached to.
#[derive(Copy, Clone, Debug)]
pub struct RunRelations<'a> {
    /// The test set (cycle) the run belongs to.
    pub test_set: &'a EntityFields,
    /// The test that was executed.
    pub test: &'a EntityFields,
    /// The test configuration that was executed.
    pub test_config: &'a EntityFields,
    /// The test instance the run is recorded against.
    pub test_instance: &'a EntityFields,
}

/// Resolves the run subtype from the subtype of its test instance.
#[derive(Clone, Debug, Default)]
pub struct RunSubtypes {
    overrides: IndexMap<String, String>,
}

impl RunSubtypes {
    const INSTANCE_PREFIX: &'static str = "hp.qc.test-instance.";
    const RUN_PREFIX: &'static str = "hp.qc.run.";

    /// Creates a resolver with explicit test-instance → run subtype overrides.
    pub fn new(overrides: IndexMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Returns the run subtype for a test-instance subtype.
    ///
    /// Overrides win; otherwise `hp.qc.test-instance.X` maps to `hp.qc.run.X`.
    pub fn resolve(&self, instance_subtype: &str) -> Option<String> {
        if let Some(subtype) = self.overrides.get(instance_subtype) {
            return Some(subtype.clone());
        }
        instance_subtype
            .strip_prefix(Self::INSTANCE_PREFIX)
            .filter(|rest| !rest.is_empty())
            .map(|rest| format!("{}{rest}", Self::RUN_PREFIX))
    }
}

/// Builds the run record from upload parameters.
#[derive(Clone, Debug, Default)]
pub struct RunMapper {
    actual_user: Option<String>,
    run_subtypes: RunSubtypes,
}

impl RunMapper {
    /// Creates a new mapper.
    ///
    /// `actual_user` becomes the owner of every mapped run.
    pub fn new(actual_user: Option<String>, run_subtypes: RunSubtypes) -> Self {
        Self {
            actual_user,
            run_subtypes,
        }
    }

    /// Maps `run` in place, using the current local time for the run name.
    pub fn map(&self, relations: RunRelations<'_>, run: &mut EntityFields) {
        self.map_at(relations, run, &Local::now());
    }

    /// Maps `run` in place, using `now` for the run name.
    pub fn map_at<Tz: TimeZone>(
        &self,
        relations: RunRelations<'_>,
        run: &mut EntityFields,
        now: &DateTime<Tz>,
    ) {
        let RunRelations {
            test_set,
            test,
            test_config,
            test_instance,
        } = relations;

        run.set_or_remove(run::TEST_CONFIG_ID, test_config.id());
        run.set_or_remove(run::CYCLE_ID, test_set.id());
        run.set_or_remove(run::TEST_ID, test.id());
        run.set_or_remove(run::TEST_INSTANCE_ID, test_instance.id());

        run.set_or_remove(common::OWNER, self.actual_user.as_deref());
        run.insert(common::NAME, run_name(now));
        run.insert(run::DURATION, convert_duration(run.get(run::DURATION)));

        if let Some(subtype) = test_instance
            .get(test_instance::SUBTYPE_ID)
            .and_then(|instance_subtype| self.run_subtypes.resolve(instance_subtype))
        {
            run.insert(run::SUBTYPE_ID, subtype);
        }

        if let Some(detail) = run.get_non_empty(run::DETAIL) {
            let encoded = encode_detail(detail);
            run.insert(run::DETAIL, encoded);
        }

        debug!(
            "mapped run for test {} in test set {}",
            test.id().unwrap_or("<none>"),
            test_set.id().unwrap_or("<none>"),
        );
    }
}

/// Renders the run name for a timestamp: `Run_<month>-<day>_<hour>-<minute>-<second>`.
pub fn run_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    format!(
        "Run_{}-{}_{}-{}-{}",
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Converts a duration string to whole seconds.
///
/// The value is read as an `f32` and truncated toward zero into an `i32`: out-of-range values
/// and infinities saturate, and `NaN` becomes `"0"`. Missing, empty and non-numeric input also
/// become `"0"`.
pub fn convert_duration(duration: Option<&str>) -> String {
    let seconds = duration
        .and_then(parse_float)
        .map_or(0, |seconds| seconds as i32);
    seconds.to_string()
}

/// Parses a float in the lexical form a JVM `Float.valueOf` accepts: surrounding whitespace, an
/// optional `f` or `d` suffix, and `Infinity` and `NaN` spelled exactly.
fn parse_float(input: &str) -> Option<f32> {
    let input = input.trim();
    let unsigned = input.strip_prefix(['+', '-']).unwrap_or(input);
    if matches!(unsigned, "Infinity" | "NaN") {
        return input.parse().ok();
    }

    let number = input.strip_suffix(['f', 'F', 'd', 'D']).unwrap_or(input);
    if number
        .chars()
        .any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E'))
    {
        return None;
    }
    number.parse().ok()
}

/// Encodes a run detail as standard padded base64 over its UTF-8 bytes.
pub fn encode_detail(detail: &str) -> String {
    STANDARD.encode(detail.as_bytes())
}
