// Tests for the planning pipeline and orchestrator

use linkforge_core::data::Database;
use linkforge_core::model::{LinkStatus, Page, PipelineProgress, PipelineStatus, ScopeKey};
use linkforge_core::pipeline::{JobRegistry, Orchestrator, PipelineError};
use linkforge_planner::ClusterRole;
use linkforge_planner::html::first_link_href;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn page(id: i64, cluster: Option<i64>, role: Option<ClusterRole>, keyword: &str, body: &str) -> Page {
    Page {
        id,
        project_id: 1,
        cluster_id: cluster,
        url: format!("https://example.com/p{id}"),
        title: Some(format!("Page {id}")),
        body: body.to_string(),
        word_count: 600,
        role,
        labels: BTreeSet::new(),
        keyword: Some(keyword.to_string()),
        secondary_keywords: vec![],
        content_complete: true,
        keyword_approved: true,
    }
}

/// One parent and three children whose bodies mention each other's keywords.
fn seed_boot_cluster(db: &Database) {
    db.insert_page(&page(
        1,
        Some(3),
        Some(ClusterRole::Parent),
        "boots",
        "<p>The complete boots overview.</p>",
    ))
    .unwrap();
    db.insert_page(&page(
        2,
        Some(3),
        Some(ClusterRole::Child),
        "winter boots",
        "<p>Every hiker needs sturdy boots for the trail.</p>\
         <p>Compare our hiking boots lineup in depth.</p>\
         <p>Also browse the work boots range today.</p>",
    ))
    .unwrap();
    db.insert_page(&page(
        3,
        Some(3),
        Some(ClusterRole::Child),
        "hiking boots",
        "<p>Good boots make any job easier.</p>\
         <p>The work boots guide covers safety toes.</p>",
    ))
    .unwrap();
    db.insert_page(&page(
        4,
        Some(3),
        Some(ClusterRole::Child),
        "work boots",
        "<p>Quality boots last for years.</p>",
    ))
    .unwrap();
}

fn test_db() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    (temp_dir, db_path)
}

async fn wait_for_completion(orchestrator: &Orchestrator, key: &ScopeKey) -> PipelineProgress {
    for _ in 0..500 {
        let progress = orchestrator.status(key);
        if progress.status != PipelineStatus::Planning {
            return progress;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("planning job did not settle in time");
}

// ============================================================================
// Registry Tests
// ============================================================================

#[test]
fn test_registry_claims_scope_once() {
    let registry = JobRegistry::new();
    let key = ScopeKey::cluster(1, 3);

    assert!(registry.try_begin(key));
    assert!(!registry.try_begin(key));

    // a different scope is unaffected
    assert!(registry.try_begin(ScopeKey::cluster(1, 4)));
}

#[test]
fn test_registry_reclaims_after_completion() {
    let registry = JobRegistry::new();
    let key = ScopeKey::cluster(1, 3);

    assert!(registry.try_begin(key));
    registry.update(&key, |p| p.status = PipelineStatus::Complete);
    assert!(registry.try_begin(key));
}

#[test]
fn test_registry_lookup_defaults_to_idle() {
    let registry = JobRegistry::new();
    let progress = registry.lookup(&ScopeKey::onboarding(42));
    assert_eq!(progress.status, PipelineStatus::Idle);
}

#[test]
fn test_claimed_job_starts_at_the_first_step() {
    let registry = JobRegistry::new();
    let key = ScopeKey::cluster(1, 3);

    assert!(registry.try_begin(key));
    let progress = registry.lookup(&key);
    assert_eq!(progress.current_step, 1);
    assert_eq!(progress.step_label, linkforge_core::model::STEP_LABELS[0]);
}

// ============================================================================
// Trigger Validation Tests
// ============================================================================

#[tokio::test]
async fn test_cluster_key_requires_cluster_id() {
    let (_dir, db_path) = test_db();
    let orchestrator = Orchestrator::new(&db_path);

    let bad_key = ScopeKey {
        project_id: 1,
        scope: linkforge_core::model::Scope::Cluster,
        cluster_id: None,
    };
    let err = orchestrator.trigger(bad_key).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[tokio::test]
async fn test_cluster_prerequisites_require_two_pages() {
    let (_dir, db_path) = test_db();
    {
        let db = Database::new(&db_path).unwrap();
        db.insert_page(&page(1, Some(3), Some(ClusterRole::Parent), "boots", "<p>x</p>"))
            .unwrap();
    }

    let orchestrator = Orchestrator::new(&db_path);
    let err = orchestrator.trigger(ScopeKey::cluster(1, 3)).unwrap_err();
    assert!(matches!(err, PipelineError::Prerequisite(_)));
}

#[tokio::test]
async fn test_cluster_prerequisites_require_gated_pages() {
    let (_dir, db_path) = test_db();
    {
        let db = Database::new(&db_path).unwrap();
        seed_boot_cluster(&db);
        let mut ungated = page(5, Some(3), Some(ClusterRole::Child), "rain boots", "<p>x</p>");
        ungated.keyword_approved = false;
        db.insert_page(&ungated).unwrap();
    }

    let orchestrator = Orchestrator::new(&db_path);
    let err = orchestrator.trigger(ScopeKey::cluster(1, 3)).unwrap_err();
    match err {
        PipelineError::Prerequisite(msg) => assert!(msg.contains('5')),
        other => panic!("expected prerequisite error, got {other}"),
    }
}

#[tokio::test]
async fn test_duplicate_trigger_conflicts() {
    let (_dir, db_path) = test_db();
    {
        let db = Database::new(&db_path).unwrap();
        seed_boot_cluster(&db);
    }

    let orchestrator = Orchestrator::new(&db_path);
    let key = ScopeKey::cluster(1, 3);
    orchestrator.trigger(key).unwrap();

    // while the first run is claimed, a second trigger is refused
    let second = orchestrator.trigger(key);
    assert!(matches!(second, Err(PipelineError::Conflict(_))));

    wait_for_completion(&orchestrator, &key).await;
}

// ============================================================================
// End-to-end Planning Tests
// ============================================================================

#[tokio::test]
async fn test_cluster_plan_end_to_end() {
    let (_dir, db_path) = test_db();
    {
        let db = Database::new(&db_path).unwrap();
        seed_boot_cluster(&db);
    }

    let orchestrator = Orchestrator::new(&db_path);
    let key = ScopeKey::cluster(1, 3);
    orchestrator.trigger(key).unwrap();
    let progress = wait_for_completion(&orchestrator, &key).await;

    assert_eq!(progress.status, PipelineStatus::Complete);
    // 3 mandatory child->parent links plus one link per sibling pair
    assert_eq!(progress.total_links, 6);
    assert_eq!(progress.total_pages, 4);
    assert_eq!(progress.pages_processed, 3);

    let db = Database::new(&db_path).unwrap();
    let links = db.active_links(&key).unwrap();
    assert_eq!(links.len(), 6);
    assert!(links.iter().all(|l| l.status == LinkStatus::Verified));
    assert_eq!(links.iter().filter(|l| l.is_mandatory).count(), 3);

    // every child's first in-body link points at the parent
    for child in [2, 3, 4] {
        let body = db.get_page(child).unwrap().unwrap().body;
        assert_eq!(
            first_link_href(&body).as_deref(),
            Some("https://example.com/p1"),
            "child {child} should open with its parent link"
        );
    }
}

#[tokio::test]
async fn test_replan_snapshots_and_replaces_prior_links() {
    let (_dir, db_path) = test_db();
    {
        let db = Database::new(&db_path).unwrap();
        seed_boot_cluster(&db);
    }

    let orchestrator = Orchestrator::new(&db_path);
    let key = ScopeKey::cluster(1, 3);

    orchestrator.trigger(key).unwrap();
    let first = wait_for_completion(&orchestrator, &key).await;
    assert_eq!(first.status, PipelineStatus::Complete);

    orchestrator.trigger(key).unwrap();
    let second = wait_for_completion(&orchestrator, &key).await;
    assert_eq!(second.status, PipelineStatus::Complete);
    assert_eq!(second.total_links, 6);

    let db = Database::new(&db_path).unwrap();
    // the first plan was snapshotted once, then retired
    assert_eq!(db.snapshot_count(&key).unwrap(), 1);
    assert_eq!(db.removed_link_count(&key).unwrap(), 6);
    assert_eq!(db.active_links(&key).unwrap().len(), 6);

    // bodies were re-linked, not double-linked
    let body = db.get_page(2).unwrap().unwrap().body;
    assert_eq!(body.matches("<a ").count(), 3);
}

#[tokio::test]
async fn test_site_plan_links_by_label_overlap() {
    let (_dir, db_path) = test_db();
    {
        let db = Database::new(&db_path).unwrap();
        let mut a = page(10, None, None, "trail gear", "<p>Start with alpine gear basics.</p>");
        a.labels = ["shoes".to_string(), "winter".to_string()].into_iter().collect();
        let mut b = page(11, None, None, "alpine gear", "<p>Our trail gear checklist.</p>");
        b.labels = ["shoes".to_string(), "winter".to_string()].into_iter().collect();
        let mut c = page(12, None, None, "city gear", "<p>Unrelated content.</p>");
        c.labels = ["shoes".to_string()].into_iter().collect();
        db.insert_page(&a).unwrap();
        db.insert_page(&b).unwrap();
        db.insert_page(&c).unwrap();
    }

    let orchestrator = Orchestrator::new(&db_path);
    let key = ScopeKey::onboarding(1);
    orchestrator.trigger(key).unwrap();
    let progress = wait_for_completion(&orchestrator, &key).await;

    assert_eq!(progress.status, PipelineStatus::Complete);
    // only pages 10 and 11 share enough labels for an edge
    assert_eq!(progress.total_links, 2);

    let db = Database::new(&db_path).unwrap();
    let links = db.active_links(&key).unwrap();
    let pairs: Vec<(i64, i64)> = links
        .iter()
        .map(|l| (l.source_page_id, l.target_page_id))
        .collect();
    assert!(pairs.contains(&(10, 11)));
    assert!(pairs.contains(&(11, 10)));
}

#[tokio::test]
async fn test_empty_scope_completes_with_zero_links() {
    let (_dir, db_path) = test_db();
    Database::new(&db_path).unwrap();

    let orchestrator = Orchestrator::new(&db_path);
    let key = ScopeKey::onboarding(1);
    orchestrator.trigger(key).unwrap();
    let progress = wait_for_completion(&orchestrator, &key).await;

    assert_eq!(progress.status, PipelineStatus::Complete);
    assert_eq!(progress.total_links, 0);
    assert!(progress.error.is_none());
}

#[tokio::test]
async fn test_sibling_links_wait_for_an_unplaced_parent_link() {
    let (_dir, db_path) = test_db();
    {
        let db = Database::new(&db_path).unwrap();
        db.insert_page(&page(
            1,
            Some(3),
            Some(ClusterRole::Parent),
            "boots",
            "<p>The complete boots overview.</p>",
        ))
        .unwrap();
        // child 2 never mentions the parent keyword, only its sibling's
        db.insert_page(&page(
            2,
            Some(3),
            Some(ClusterRole::Child),
            "winter boots",
            "<p>Our trail shoes roundup covers everything in depth.</p>",
        ))
        .unwrap();
        db.insert_page(&page(
            3,
            Some(3),
            Some(ClusterRole::Child),
            "trail shoes",
            "<p>Quality boots last for years.</p>",
        ))
        .unwrap();
    }

    let orchestrator = Orchestrator::new(&db_path);
    let key = ScopeKey::cluster(1, 3);
    orchestrator.trigger(key).unwrap();
    let progress = wait_for_completion(&orchestrator, &key).await;

    // child 2's parent link found no insertion point, so its sibling link
    // must not land either: that would put a sibling ahead of the parent
    assert_eq!(progress.status, PipelineStatus::Complete);
    assert_eq!(progress.total_links, 1);

    let db = Database::new(&db_path).unwrap();
    let body = db.get_page(2).unwrap().unwrap().body;
    assert!(!body.contains("<a "), "child 2 should carry no links yet");

    let links = db.active_links(&key).unwrap();
    let planned = links
        .iter()
        .filter(|l| l.status == LinkStatus::Planned)
        .count();
    let verified = links
        .iter()
        .filter(|l| l.status == LinkStatus::Verified)
        .count();
    assert_eq!(planned, 2);
    assert_eq!(verified, 1);
}

#[tokio::test]
async fn test_unplaceable_links_stay_planned_without_failing_the_job() {
    let (_dir, db_path) = test_db();
    {
        let db = Database::new(&db_path).unwrap();
        db.insert_page(&page(
            1,
            Some(3),
            Some(ClusterRole::Parent),
            "boots",
            "<p>The complete boots overview.</p>",
        ))
        .unwrap();
        // child bodies mention the parent keyword but never each other's
        db.insert_page(&page(
            2,
            Some(3),
            Some(ClusterRole::Child),
            "winter boots",
            "<p>Sturdy boots for cold days.</p>",
        ))
        .unwrap();
        db.insert_page(&page(
            3,
            Some(3),
            Some(ClusterRole::Child),
            "hiking boots",
            "<p>Sturdy boots for long days.</p>",
        ))
        .unwrap();
    }

    let orchestrator = Orchestrator::new(&db_path);
    let key = ScopeKey::cluster(1, 3);
    orchestrator.trigger(key).unwrap();
    let progress = wait_for_completion(&orchestrator, &key).await;

    // the sibling link had no insertion point and no fallback is configured,
    // but the mandatory links landed and the job still completes
    assert_eq!(progress.status, PipelineStatus::Complete);
    assert_eq!(progress.total_links, 2);
    assert!(progress.error.is_some());

    let db = Database::new(&db_path).unwrap();
    let links = db.active_links(&key).unwrap();
    let planned = links
        .iter()
        .filter(|l| l.status == LinkStatus::Planned)
        .count();
    let verified = links
        .iter()
        .filter(|l| l.status == LinkStatus::Verified)
        .count();
    assert_eq!(planned, 1);
    assert_eq!(verified, 2);
}
