// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use alm_bridge::{
    entity::EntityFields,
    errors::{ConnectError, RestError},
    rest::EntityService,
    validate::{OctaneConnector, OctaneCredentials, OctaneProject},
};
use std::{cell::RefCell, sync::Once};

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = color_eyre::install();
    });
}

pub(crate) fn fields(pairs: &[(&str, &str)]) -> EntityFields {
    pairs.iter().copied().collect()
}

/// A call recorded by [`RecordingService`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ServiceCall {
    Create(String, EntityFields),
    Update(String, EntityFields),
}

/// An in-memory entity service that assigns sequential ids and records every call.
#[derive(Debug, Default)]
pub(crate) struct RecordingService {
    calls: RefCell<Vec<ServiceCall>>,
    next_id: RefCell<u32>,
    fail_creates_after: Option<usize>,
}

impl RecordingService {
    pub(crate) fn failing_after(creates: usize) -> Self {
        Self {
            fail_creates_after: Some(creates),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<ServiceCall> {
        self.calls.borrow().clone()
    }

    fn create_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, ServiceCall::Create(..)))
            .count()
    }
}

impl EntityService for RecordingService {
    fn create(&self, collection: &str, fields: &EntityFields) -> Result<EntityFields, RestError> {
        if self
            .fail_creates_after
            .is_some_and(|limit| self.create_count() >= limit)
        {
            return Err(RestError::Status {
                method: "POST",
                url: format!("https://alm.example.com/qcbin/rest/domains/D/projects/P/{collection}"),
                status: 503,
                body: "Service Unavailable".to_owned(),
            });
        }
        self.calls
            .borrow_mut()
            .push(ServiceCall::Create(collection.to_owned(), fields.clone()));

        let mut next_id = self.next_id.borrow_mut();
        *next_id += 1;
        let mut created = fields.clone();
        created.insert("id", next_id.to_string());
        Ok(created)
    }

    fn update(&self, collection: &str, fields: &EntityFields) -> Result<EntityFields, RestError> {
        self.calls
            .borrow_mut()
            .push(ServiceCall::Update(collection.to_owned(), fields.clone()));
        Ok(fields.clone())
    }
}

/// What a [`ScriptedConnector`] returns.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Script {
    Succeed,
    Authentication,
    SessionCreation,
    SharedSpace,
    Request,
}

/// An Octane connector that returns a fixed result and records what it was asked to connect to.
#[derive(Debug)]
pub(crate) struct ScriptedConnector {
    script: Script,
    seen: RefCell<Vec<(OctaneProject, String)>>,
}

impl ScriptedConnector {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            seen: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn seen(&self) -> Vec<(OctaneProject, String)> {
        self.seen.borrow().clone()
    }
}

impl OctaneConnector for ScriptedConnector {
    fn try_to_connect(
        &self,
        project: &OctaneProject,
        credentials: &OctaneCredentials,
    ) -> Result<(), ConnectError> {
        self.seen
            .borrow_mut()
            .push((project.clone(), credentials.username.clone()));
        match self.script {
            Script::Succeed => Ok(()),
            Script::Authentication => Err(ConnectError::Authentication { status: 401 }),
            Script::SessionCreation => Err(ConnectError::SessionCreation {
                reason: "connection refused".to_owned(),
            }),
            Script::SharedSpace => Err(ConnectError::SharedSpaceNotExist {
                shared_space: project.shared_space.clone(),
            }),
            Script::Request => Err(ConnectError::RequestError {
                reason: "shared space probe returned HTTP 500".to_owned(),
            }),
        }
    }
}
