// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ALM entity records and the field names this crate reads and writes.
//!
//! The ALM schema is open: projects add user-defined `udf|...` fields, so records are kept as
//! ordered string maps rather than typed structs. Only the fields listed here are interpreted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field names shared by all ALM entities.
pub mod common {
    /// The entity identifier.
    pub const ID: &str = "id";
    /// The entity name.
    pub const NAME: &str = "name";
    /// The entity owner.
    pub const OWNER: &str = "owner";
    /// The entity subtype.
    pub const SUBTYPE_ID: &str = "subtype-id";
}

/// Field names on a `run` entity.
pub mod run {
    /// Foreign key to the test configuration.
    pub const TEST_CONFIG_ID: &str = "test-config-id";
    /// Foreign key to the test set (cycle).
    pub const CYCLE_ID: &str = "cycle-id";
    /// Foreign key to the test.
    pub const TEST_ID: &str = "test-id";
    /// Foreign key to the test instance.
    pub const TEST_INSTANCE_ID: &str = "testcycl-id";
    /// Duration in whole seconds.
    pub const DURATION: &str = "duration";
    /// Execution detail, base64-encoded on upload.
    pub const DETAIL: &str = "detail";
    /// Run status.
    pub const STATUS: &str = "status";
    /// Run subtype.
    pub const SUBTYPE_ID: &str = super::common::SUBTYPE_ID;
    /// The test version this run was executed against.
    pub const RUN_ON_VERSION: &str = "udf|Run On Version";
}

/// Field names on a `test` entity.
pub mod test {
    /// The latest version number of the test, when versioning is enabled.
    pub const VC_VERSION_NUMBER: &str = "vc-version-number";
    /// Test subtype, e.g. `MANUAL` or `LR-SCENARIO`.
    pub const SUBTYPE_ID: &str = super::common::SUBTYPE_ID;
}

/// Field names on a `test-instance` entity.
pub mod test_instance {
    /// Test instance subtype, e.g. `hp.qc.test-instance.MANUAL`.
    pub const SUBTYPE_ID: &str = super::common::SUBTYPE_ID;
}

/// The status written when a run status is present but empty.
pub const NO_RUN_STATUS: &str = "No Run";

/// The kinds of entity this crate deals with.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EntityKind {
    /// A single test execution.
    Run,
    /// A test definition.
    Test,
    /// A test set (cycle).
    TestSet,
    /// A test configuration.
    TestConfig,
    /// A test instance: a test placed in a test set.
    TestInstance,
}

impl EntityKind {
    /// Returns the entity type name used in ALM payloads, e.g. `run`.
    pub fn type_name(self) -> &'static str {
        match self {
            EntityKind::Run => "run",
            EntityKind::Test => "test",
            EntityKind::TestSet => "test-set",
            EntityKind::TestConfig => "test-config",
            EntityKind::TestInstance => "test-instance",
        }
    }

    /// Returns the collection name used in ALM REST paths, e.g. `runs`.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Run => "runs",
            EntityKind::Test => "tests",
            EntityKind::TestSet => "test-sets",
            EntityKind::TestConfig => "test-configs",
            EntityKind::TestInstance => "test-instances",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A flat, ordered key/value record for a single ALM entity.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityFields {
    fields: IndexMap<String, String>,
}

impl EntityFields {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns the value of a field if present and non-empty.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    /// Returns true if the field is present, even if empty.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Sets a field, replacing any existing value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Sets a field if `value` is `Some`, and removes it otherwise.
    pub fn set_or_remove(&mut self, name: &str, value: Option<impl Into<String>>) {
        match value {
            Some(value) => self.insert(name, value),
            None => {
                self.fields.shift_remove(name);
            }
        }
    }

    /// Removes a field, preserving the order of the remaining fields.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.shift_remove(name)
    }

    /// Returns the record's `id` field.
    pub fn id(&self) -> Option<&str> {
        self.get(common::ID)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EntityFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EntityFields {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
