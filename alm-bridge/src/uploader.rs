// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Uploads mapped runs through an [`EntityService`].

use crate::{
    entity::{EntityFields, EntityKind, common, run},
    errors::RestError,
    mapper::{RunMapper, RunRelations},
    policy::{UploadPolicy, VersionDecision},
    rest::EntityService,
};
use alm_bridge_metadata::UploadedRunSummary;
use serde::Deserialize;
use tracing::{debug, warn};

/// A run together with the entities it belongs to, as read from an upload batch file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunRecord {
    /// The test set (cycle).
    #[serde(default)]
    pub test_set: EntityFields,
    /// The test.
    #[serde(default)]
    pub test: EntityFields,
    /// The test configuration.
    #[serde(default)]
    pub test_config: EntityFields,
    /// The test instance.
    #[serde(default)]
    pub test_instance: EntityFields,
    /// The raw run fields.
    #[serde(default)]
    pub run: EntityFields,
}

/// Writes runs to ALM.
///
/// Each upload maps the run, applies the version policy, and then creates the run. Errors from the
/// service are returned as-is; nothing is retried.
#[derive(Debug)]
pub struct RunUploader<S> {
    mapper: RunMapper,
    policy: UploadPolicy,
    service: S,
}

impl<S: EntityService> RunUploader<S> {
    /// Creates a new uploader.
    pub fn new(mapper: RunMapper, policy: UploadPolicy, service: S) -> Self {
        Self {
            mapper,
            policy,
            service,
        }
    }

    /// Returns the entity service this uploader writes to.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Uploads a single run.
    ///
    /// Returns [`UploadOutcome::Skipped`] without contacting the service if the version policy
    /// refuses the run.
    pub fn upload(
        &self,
        test_set: &EntityFields,
        test: &EntityFields,
        test_config: &EntityFields,
        test_instance: &EntityFields,
        mut run: EntityFields,
    ) -> Result<UploadOutcome, RestError> {
        self.mapper.map(
            RunRelations {
                test_set,
                test,
                test_config,
                test_instance,
            },
            &mut run,
        );

        let decision = self.policy.evaluate(test, &mut run);
        if !decision.proceeds() {
            warn!("skipping run upload: {decision}");
            return Ok(UploadOutcome::Skipped { decision });
        }
        debug!("version policy: {decision}");

        match StatusWrite::split(&self.policy, run) {
            Ok(write) => {
                let (id, status) = write.execute(&self.service)?;
                Ok(UploadOutcome::CreatedWithStatus { id, status })
            }
            Err(run) => {
                let created = self.service.create(EntityKind::Run.collection(), &run)?;
                Ok(UploadOutcome::Created {
                    id: created.id().map(str::to_owned),
                })
            }
        }
    }

    /// Uploads a run read from a batch file.
    pub fn upload_record(&self, record: RunRecord) -> Result<UploadOutcome, RestError> {
        let RunRecord {
            test_set,
            test,
            test_config,
            test_instance,
            run,
        } = record;
        self.upload(&test_set, &test, &test_config, &test_instance, run)
    }
}

/// A run creation followed by a separate status update.
///
/// ALM only accepts a status on a run that already exists, so a run with a status is written in
/// two requests: a create without the status, then an update carrying only the new run's `id` and
/// the status.
///
/// The two requests are not atomic. If the update fails, the run exists on the server with no
/// status, and the error from the update is returned.
#[derive(Clone, Debug)]
pub struct StatusWrite {
    run: EntityFields,
    status: String,
}

impl StatusWrite {
    /// Splits the status off `run`, mapping it through the policy.
    ///
    /// Returns the run unchanged if it has no status or an empty one.
    pub fn split(policy: &UploadPolicy, mut run: EntityFields) -> Result<Self, EntityFields> {
        let Some(raw) = run.get_non_empty(run::STATUS) else {
            return Err(run);
        };
        let status = policy.map_status(raw).to_owned();
        run.remove(run::STATUS);
        Ok(Self { run, status })
    }

    /// The run fields sent in the create request.
    pub fn run(&self) -> &EntityFields {
        &self.run
    }

    /// The mapped status sent in the update request.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Performs the create and the update, returning the run id and the status written.
    pub fn execute(self, service: &impl EntityService) -> Result<(String, String), RestError> {
        let collection = EntityKind::Run.collection();
        let created = service.create(collection, &self.run)?;
        let id = created
            .id()
            .ok_or_else(|| RestError::MissingId {
                collection: collection.to_owned(),
                context: "status update",
            })?
            .to_owned();

        let update: EntityFields = [
            (common::ID, id.as_str()),
            (run::STATUS, self.status.as_str()),
        ]
        .into_iter()
        .collect();
        service.update(collection, &update)?;
        debug!("run {id} created with status {}", self.status);

        Ok((id, self.status))
    }
}

/// The result of [`RunUploader::upload`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UploadOutcome {
    /// The run was created in a single request.
    Created {
        /// The id returned by the server, if any.
        id: Option<String>,
    },
    /// The run was created, then its status was set.
    CreatedWithStatus {
        /// The run id.
        id: String,
        /// The mapped status.
        status: String,
    },
    /// The version policy refused the run.
    Skipped {
        /// Why the run was refused.
        decision: VersionDecision,
    },
}

impl UploadOutcome {
    /// Returns true if the run was written to the server.
    pub fn is_created(&self) -> bool {
        !matches!(self, UploadOutcome::Skipped { .. })
    }

    /// Converts this outcome into its serializable form.
    pub fn to_summary(&self) -> UploadedRunSummary {
        match self {
            UploadOutcome::Created { id } => UploadedRunSummary::Created { id: id.clone() },
            UploadOutcome::CreatedWithStatus { id, status } => {
                UploadedRunSummary::CreatedWithStatus {
                    id: id.clone(),
                    status: status.clone(),
                }
            }
            UploadOutcome::Skipped { decision } => UploadedRunSummary::Skipped {
                reason: decision.to_string(),
            },
        }
    }
}
