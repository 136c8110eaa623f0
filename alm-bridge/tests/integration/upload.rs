// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use alm_bridge::{
    config::BridgeConfig,
    entity::EntityFields,
    errors::RestError,
    policy::VersionDecision,
    uploader::{RunRecord, RunUploader, UploadOutcome},
};
use alm_bridge_metadata::UploadSummary;
use camino_tempfile::tempdir;
use color_eyre::eyre::{Result, ensure};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn uploader(service: RecordingService) -> Result<RunUploader<RecordingService>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("alm-bridge.toml");
    std::fs::write(
        &config_path,
        indoc! {r#"
            [upload]
            actual-user = "jenkins"
            run-status-mapping = [
                { from = "passed", to = "Passed" },
                { from = "failed", to = "Failed" },
            ]
        "#},
    )?;
    let config = BridgeConfig::from_sources(dir.path(), Some(&config_path))?;
    Ok(RunUploader::new(
        config.upload().mapper(None),
        config.upload().policy(),
        service,
    ))
}

fn records() -> Result<Vec<RunRecord>> {
    let records = serde_json::from_str(indoc! {r#"
        [
            {
                "test-set": { "id": "11" },
                "test": { "id": "21", "subtype-id": "MANUAL", "vc-version-number": "3" },
                "test-config": { "id": "31" },
                "test-instance": { "id": "41", "subtype-id": "hp.qc.test-instance.MANUAL" },
                "run": { "status": "passed", "duration": "1.5", "udf|Run On Version": "" }
            },
            {
                "test-set": { "id": "11" },
                "test": { "id": "22", "subtype-id": "MANUAL", "vc-version-number": "2" },
                "test-config": { "id": "32" },
                "test-instance": { "id": "42" },
                "run": { "status": "failed", "udf|Run On Version": "5" }
            },
            {
                "test-set": { "id": "11" },
                "test": { "id": "23", "subtype-id": "LR-SCENARIO", "vc-version-number": "1" },
                "test-config": { "id": "33" },
                "test-instance": { "id": "43" },
                "run": { "detail": "ok", "udf|Run On Version": "9" }
            }
        ]
    "#})?;
    Ok(records)
}

#[test]
fn test_upload_batch() -> Result<()> {
    test_init();

    let uploader = uploader(RecordingService::default())?;
    let outcomes = records()?
        .into_iter()
        .map(|record| uploader.upload_record(record))
        .collect::<Result<Vec<_>, _>>()?;

    assert_eq!(
        outcomes[0],
        UploadOutcome::CreatedWithStatus {
            id: "1".to_owned(),
            status: "Passed".to_owned(),
        }
    );
    assert_eq!(
        outcomes[1],
        UploadOutcome::Skipped {
            decision: VersionDecision::TooNew {
                run_version: 5,
                test_version: 2,
            },
        }
    );
    assert_eq!(
        outcomes[2],
        UploadOutcome::Created {
            id: Some("2".to_owned())
        }
    );

    let calls = uploader.service().calls();
    ensure!(calls.len() == 3, "expected 3 calls, got {calls:?}");

    // The first run is created without its status, then updated with only the id and status.
    let ServiceCall::Create(collection, created) = &calls[0] else {
        panic!("first call should be a create: {calls:?}");
    };
    assert_eq!(collection, "runs");
    assert_eq!(created.get("status"), None);
    assert_eq!(created.get("testcycl-id"), Some("41"));
    assert_eq!(created.get("owner"), Some("jenkins"));
    assert_eq!(created.get("duration"), Some("1"));
    assert_eq!(created.get("udf|Run On Version"), Some("3"));
    assert_eq!(created.get("subtype-id"), Some("hp.qc.run.MANUAL"));
    assert_eq!(
        calls[1],
        ServiceCall::Update(
            "runs".to_owned(),
            fields(&[("id", "1"), ("status", "Passed")])
        )
    );

    // The exempt run is created in one request with its detail encoded.
    let ServiceCall::Create(_, exempt) = &calls[2] else {
        panic!("third call should be a create: {calls:?}");
    };
    assert_eq!(exempt.get("detail"), Some("b2s="));
    assert_eq!(exempt.get("udf|Run On Version"), Some("9"));

    let summary = UploadSummary {
        runs: outcomes.iter().map(UploadOutcome::to_summary).collect(),
    };
    assert_eq!(summary.created_count(), 2);
    assert_eq!(summary.skipped_count(), 1);

    Ok(())
}

#[test]
fn test_upload_error_is_returned_unmodified() -> Result<()> {
    test_init();

    let uploader = uploader(RecordingService::failing_after(0))?;
    let empty = EntityFields::new();
    let err = uploader
        .upload(&empty, &empty, &empty, &empty, fields(&[("status", "passed")]))
        .expect_err("create fails");
    match err {
        RestError::Status { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "Service Unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    ensure!(
        uploader.service().calls().is_empty(),
        "no update is attempted after a failed create"
    );

    Ok(())
}
