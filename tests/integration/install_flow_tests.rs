//! Dependency install flow: running update, installer exit, manifest re-read.

use cellbook::channel::events::DepsInstallPayload;
use cellbook::channel::{Command, Notification};
use cellbook::models::{Cell, CellStatus};

use super::test_helpers::{as_cell_update, harness, recv, write_file};

const DISK_MANIFEST: &str = r#"{"name":"notebook","dependencies":{"lodash":"^4.0.0"}}"#;

#[tokio::test]
async fn install_replaces_the_manifest_source_from_disk() {
    let manifest = Cell::new_manifest("{}");
    let manifest_id = manifest.id().to_owned();
    let h = harness(vec![manifest]).await;
    write_file(&h.dir, "package.json", DISK_MANIFEST);
    let mut rx = h.subscribe();

    h.orchestrator
        .dispatch(Command::DepsInstall(DepsInstallPayload {
            session_id: h.session_id.clone(),
            packages: None,
        }))
        .await;

    let first = recv(&mut rx).await;
    assert_eq!(
        as_cell_update(&first),
        Some((manifest_id.clone(), CellStatus::Running))
    );

    // The installer (`true`) exits immediately; the idle update carries the
    // re-read on-disk manifest.
    loop {
        let envelope = recv(&mut rx).await;
        if let Notification::CellUpdated(payload) = &envelope.notification {
            if payload.cell.status() == CellStatus::Idle {
                match &payload.cell {
                    Cell::Manifest { source, .. } => assert_eq!(source, DISK_MANIFEST),
                    other => panic!("expected manifest cell, got {other:?}"),
                }
                break;
            }
        }
    }

    // Stored state matches the disk exactly.
    let session = h.store.find_session(&h.session_id).await.expect("session");
    match session.manifest_cell() {
        Some(Cell::Manifest { source, status, .. }) => {
            assert_eq!(source, DISK_MANIFEST);
            assert_eq!(*status, CellStatus::Idle);
        }
        other => panic!("expected manifest cell, got {other:?}"),
    }
    let on_disk = std::fs::read_to_string(h.dir.join("package.json")).expect("manifest on disk");
    assert_eq!(on_disk, DISK_MANIFEST);
}

#[tokio::test]
async fn install_with_an_explicit_package_list_completes() {
    let manifest = Cell::new_manifest("{}");
    let manifest_id = manifest.id().to_owned();
    let h = harness(vec![manifest]).await;
    write_file(&h.dir, "package.json", DISK_MANIFEST);
    let mut rx = h.subscribe();

    h.orchestrator
        .dispatch(Command::DepsInstall(DepsInstallPayload {
            session_id: h.session_id.clone(),
            packages: Some(vec!["lodash".into(), "zod".into()]),
        }))
        .await;

    let first = recv(&mut rx).await;
    assert_eq!(
        as_cell_update(&first),
        Some((manifest_id.clone(), CellStatus::Running))
    );
    loop {
        let envelope = recv(&mut rx).await;
        if as_cell_update(&envelope) == Some((manifest_id.clone(), CellStatus::Idle)) {
            break;
        }
    }
    assert!(h.orchestrator.registry().is_empty().await);
}

#[tokio::test]
async fn unreadable_manifest_still_returns_the_cell_to_idle() {
    let manifest = Cell::new_manifest(r#"{"name":"kept"}"#);
    let manifest_id = manifest.id().to_owned();
    // No package.json is written to disk, so the post-install re-read fails.
    let h = harness(vec![manifest]).await;
    let mut rx = h.subscribe();

    h.orchestrator
        .dispatch(Command::DepsInstall(DepsInstallPayload {
            session_id: h.session_id.clone(),
            packages: None,
        }))
        .await;

    let first = recv(&mut rx).await;
    assert_eq!(
        as_cell_update(&first),
        Some((manifest_id.clone(), CellStatus::Running))
    );
    loop {
        let envelope = recv(&mut rx).await;
        if as_cell_update(&envelope) == Some((manifest_id.clone(), CellStatus::Idle)) {
            break;
        }
    }

    // The stored source is untouched.
    let session = h.store.find_session(&h.session_id).await.expect("session");
    match session.manifest_cell() {
        Some(Cell::Manifest { source, .. }) => assert_eq!(source, r#"{"name":"kept"}"#),
        other => panic!("expected manifest cell, got {other:?}"),
    }
}
