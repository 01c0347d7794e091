// Tests for snapshot capture and restore

use linkforge_core::data::Database;
use linkforge_core::model::{
    InternalLink, LinkStatus, Page, PlacementMethod, Scope, ScopeKey,
};
use linkforge_core::pipeline::PipelineError;
use linkforge_core::snapshot::SnapshotManager;
use linkforge_planner::{AnchorKind, ClusterRole};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn page(id: i64, role: ClusterRole, body: &str) -> Page {
    Page {
        id,
        project_id: 1,
        cluster_id: Some(3),
        url: format!("https://example.com/p{id}"),
        title: Some(format!("Page {id}")),
        body: body.to_string(),
        word_count: 600,
        role: Some(role),
        labels: BTreeSet::new(),
        keyword: Some(format!("keyword {id}")),
        secondary_keywords: vec![],
        content_complete: true,
        keyword_approved: true,
    }
}

fn link(source: i64, target: i64) -> InternalLink {
    InternalLink {
        id: 0,
        source_page_id: source,
        target_page_id: target,
        project_id: 1,
        cluster_id: Some(3),
        scope: Scope::Cluster,
        anchor_text: "boots".to_string(),
        anchor_type: AnchorKind::ExactMatch,
        position_in_content: None,
        is_mandatory: true,
        placement_method: PlacementMethod::RuleBased,
        status: LinkStatus::Verified,
        created_at: 0,
        updated_at: 0,
    }
}

fn seeded_db() -> (TempDir, Database, ScopeKey) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
    let key = ScopeKey::cluster(1, 3);

    db.insert_page(&page(1, ClusterRole::Parent, "<p>parent body</p>")).unwrap();
    db.insert_page(&page(
        2,
        ClusterRole::Child,
        "<p>child with <a href=\"https://example.com/p1\">boots</a> link</p>",
    ))
    .unwrap();
    db.insert_link(&link(2, 1)).unwrap();
    (temp_dir, db, key)
}

// ============================================================================
// Capture Tests
// ============================================================================

#[test]
fn test_capture_records_pages_and_links() {
    let (_dir, db, key) = seeded_db();
    let manager = SnapshotManager::new(&db);

    let snapshot_id = manager.capture(&key).unwrap();
    let snapshot = db.get_snapshot(&snapshot_id).unwrap().expect("snapshot stored");

    assert_eq!(snapshot.project_id, 1);
    assert_eq!(snapshot.cluster_id, Some(3));
    assert_eq!(snapshot.scope, Scope::Cluster);
    assert_eq!(snapshot.total_links, 1);
    assert_eq!(snapshot.plan_data.pages.len(), 2);
    assert_eq!(snapshot.plan_data.links.len(), 1);
    assert_eq!(db.snapshot_count(&key).unwrap(), 1);
}

#[test]
fn test_capture_preserves_bodies_verbatim() {
    let (_dir, db, key) = seeded_db();
    let before = db.get_page(2).unwrap().unwrap().body;

    let snapshot_id = SnapshotManager::new(&db).capture(&key).unwrap();
    let snapshot = db.get_snapshot(&snapshot_id).unwrap().unwrap();

    let captured = snapshot
        .plan_data
        .pages
        .iter()
        .find(|c| c.page_id == 2)
        .unwrap();
    assert_eq!(captured.body, before);
}

// ============================================================================
// Restore Tests
// ============================================================================

#[test]
fn test_restore_round_trips_page_bodies() {
    let (_dir, db, key) = seeded_db();
    let original = db.get_page(2).unwrap().unwrap().body;

    let manager = SnapshotManager::new(&db);
    let snapshot_id = manager.capture(&key).unwrap();

    db.update_page_body(2, "<p>mangled beyond recognition</p>").unwrap();
    manager.restore(&snapshot_id).unwrap();

    // capture then restore leaves the body byte-identical
    assert_eq!(db.get_page(2).unwrap().unwrap().body, original);
}

#[test]
fn test_restore_retires_captured_links() {
    let (_dir, db, key) = seeded_db();
    let manager = SnapshotManager::new(&db);
    let snapshot_id = manager.capture(&key).unwrap();

    manager.restore(&snapshot_id).unwrap();

    assert!(db.active_links(&key).unwrap().is_empty());
    assert_eq!(db.removed_link_count(&key).unwrap(), 1);
}

#[test]
fn test_restore_unknown_snapshot_errors() {
    let (_dir, db, _key) = seeded_db();
    let manager = SnapshotManager::new(&db);

    let err = manager.restore("no-such-snapshot").unwrap_err();
    assert!(matches!(err, PipelineError::SnapshotMissing(_)));
}

#[test]
fn test_restore_is_retryable() {
    let (_dir, db, key) = seeded_db();
    let manager = SnapshotManager::new(&db);
    let snapshot_id = manager.capture(&key).unwrap();

    manager.restore(&snapshot_id).unwrap();
    // the snapshot row survives a restore, so restoring again still works
    manager.restore(&snapshot_id).unwrap();
}
