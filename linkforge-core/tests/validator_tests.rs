// Tests for link validation rules

use linkforge_core::model::{InternalLink, LinkStatus, Page, PlacementMethod, Scope};
use linkforge_core::validate::Validator;
use linkforge_planner::{AnchorKind, ClusterRole};
use std::collections::{BTreeSet, HashMap};

fn page(id: i64, cluster: Option<i64>, role: Option<ClusterRole>, body: &str) -> Page {
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
        keyword: Some(format!("keyword {id}")),
        secondary_keywords: vec![],
        content_complete: true,
        keyword_approved: true,
    }
}

fn link(id: i64, source: i64, target: i64, anchor: &str) -> InternalLink {
    InternalLink {
        id,
        source_page_id: source,
        target_page_id: target,
        project_id: 1,
        cluster_id: Some(3),
        scope: Scope::Cluster,
        anchor_text: anchor.to_string(),
        anchor_type: AnchorKind::ExactMatch,
        position_in_content: None,
        is_mandatory: false,
        placement_method: PlacementMethod::RuleBased,
        status: LinkStatus::Injected,
        created_at: 0,
        updated_at: 0,
    }
}

fn rule<'a>(
    report: &'a linkforge_core::validate::ValidationReport,
    name: &str,
) -> &'a linkforge_core::validate::RuleResult {
    report
        .results
        .iter()
        .find(|r| r.rule == name)
        .expect("rule should be present")
}

/// A healthy two-child cluster: each child's first link is the parent.
fn healthy_cluster() -> (HashMap<i64, Page>, Vec<InternalLink>) {
    let parent = page(1, Some(3), Some(ClusterRole::Parent), "<p>parent overview</p>");
    let child_a = page(
        2,
        Some(3),
        Some(ClusterRole::Child),
        "<p>see <a href=\"https://example.com/p1\">boots</a> first</p>\
         <p>then <a href=\"https://example.com/p3\">hiking boots</a></p>",
    );
    let child_b = page(
        3,
        Some(3),
        Some(ClusterRole::Child),
        "<p>see <a href=\"https://example.com/p1\">boots</a> first</p>\
         <p>then <a href=\"https://example.com/p2\">winter boots</a></p>",
    );
    let pages = [parent, child_a, child_b]
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let links = vec![
        link(10, 2, 1, "boots"),
        link(11, 2, 3, "hiking boots"),
        link(12, 3, 1, "boots"),
        link(13, 3, 2, "winter boots"),
    ];
    (pages, links)
}

// ============================================================================
// Happy Path
// ============================================================================

#[test]
fn test_healthy_cluster_passes() {
    let (pages, links) = healthy_cluster();
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    assert!(report.passed());
    assert_eq!(report.results.len(), 8);
    assert!(report.failures().is_empty());
}

#[test]
fn test_all_rules_report_independently() {
    let (pages, links) = healthy_cluster();
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    let names: Vec<&str> = report.results.iter().map(|r| r.rule).collect();
    assert_eq!(
        names,
        vec![
            "budget_check",
            "silo_integrity",
            "no_self_links",
            "no_duplicate_links",
            "density",
            "anchor_diversity",
            "first_link",
            "direction",
        ]
    );
}

// ============================================================================
// Budget (advisory)
// ============================================================================

#[test]
fn test_under_budget_warns_without_failing() {
    let (pages, links) = healthy_cluster();
    // each child carries 2 links, below the recommended 3
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    let budget = rule(&report, "budget_check");
    assert!(!budget.passed);
    assert!(budget.advisory);
    assert!(report.passed());
    assert!(!report.warnings().is_empty());
}

// ============================================================================
// Hard Rules
// ============================================================================

#[test]
fn test_self_link_fails() {
    let (pages, mut links) = healthy_cluster();
    links.push(link(20, 2, 2, "boots"));
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    assert!(!report.passed());
    let result = rule(&report, "no_self_links");
    assert_eq!(result.offending_links, vec![20]);
}

#[test]
fn test_duplicate_pair_fails() {
    let (pages, mut links) = healthy_cluster();
    links.push(link(21, 2, 1, "boots again"));
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    let result = rule(&report, "no_duplicate_links");
    assert!(!result.passed);
    assert!(result.offending_links.contains(&10));
    assert!(result.offending_links.contains(&21));
}

#[test]
fn test_silo_violation_fails() {
    let (mut pages, mut links) = healthy_cluster();
    let foreign = page(9, Some(8), Some(ClusterRole::Child), "<p>other cluster</p>");
    pages.insert(9, foreign);
    links.push(link(22, 2, 9, "elsewhere"));
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    let result = rule(&report, "silo_integrity");
    assert_eq!(result.offending_links, vec![22]);
}

#[test]
fn test_onboarding_rejects_clustered_pages() {
    let mut pages = HashMap::new();
    pages.insert(1, page(1, None, None, "<p>site page</p>"));
    pages.insert(2, page(2, Some(3), Some(ClusterRole::Child), "<p>cluster page</p>"));
    let mut l = link(30, 1, 2, "anchor");
    l.scope = Scope::Onboarding;
    l.cluster_id = None;

    let report = Validator::new().validate(&[l], &pages, Scope::Onboarding, None);
    let result = rule(&report, "silo_integrity");
    assert!(!result.passed);
}

#[test]
fn test_density_cap_fails() {
    let (mut pages, links) = healthy_cluster();
    let crowded = "<p>\
        <a href=\"https://example.com/p1\">one</a> \
        <a href=\"https://example.com/p3\">two</a> \
        <a href=\"https://example.com/p1\">three</a></p>";
    pages.get_mut(&2).unwrap().body = crowded.to_string();
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    let result = rule(&report, "density");
    assert!(!result.passed);
    // both of page 2's links are implicated
    assert_eq!(result.offending_links, vec![10, 11]);
}

#[test]
fn test_anchor_diversity_cap_fails() {
    let pages: HashMap<i64, Page> = (1..=6)
        .map(|id| {
            let cluster = Some(3);
            let role = if id == 1 {
                Some(ClusterRole::Parent)
            } else {
                Some(ClusterRole::Child)
            };
            (id, page(id, cluster, role, "<p>body</p>"))
        })
        .collect();
    // four links, one target, identical anchor ignoring case
    let links = vec![
        link(40, 2, 1, "boots"),
        link(41, 3, 1, "Boots"),
        link(42, 4, 1, "BOOTS"),
        link(43, 5, 1, "boots"),
    ];
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    let result = rule(&report, "anchor_diversity");
    assert!(!result.passed);
    assert_eq!(result.offending_links, vec![40, 41, 42, 43]);
}

// ============================================================================
// Cluster-only Rules
// ============================================================================

#[test]
fn test_first_link_must_be_parent() {
    let (mut pages, links) = healthy_cluster();
    // child 2 now opens with its sibling link instead of the parent
    pages.get_mut(&2).unwrap().body = "<p>see <a href=\"https://example.com/p3\">hiking boots</a> \
         then <a href=\"https://example.com/p1\">boots</a></p>"
        .to_string();
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    let result = rule(&report, "first_link");
    assert!(!result.passed);
    assert_eq!(result.offending_links, vec![10, 11]);
}

#[test]
fn test_parent_may_only_link_down() {
    let (mut pages, mut links) = healthy_cluster();
    let foreign = page(9, Some(8), Some(ClusterRole::Child), "<p>other</p>");
    pages.insert(9, foreign);
    links.push(link(50, 1, 9, "foreign child"));
    let report = Validator::new().validate(&links, &pages, Scope::Cluster, Some(3));

    let result = rule(&report, "direction");
    assert_eq!(result.offending_links, vec![50]);
}

#[test]
fn test_cluster_rules_skipped_outside_cluster_scope() {
    let mut pages = HashMap::new();
    pages.insert(1, page(1, None, None, "<p>alpha</p>"));
    pages.insert(2, page(2, None, None, "<p>beta</p>"));
    let mut l = link(60, 1, 2, "anchor");
    l.scope = Scope::Onboarding;
    l.cluster_id = None;

    let report = Validator::new().validate(&[l], &pages, Scope::Onboarding, None);
    assert!(rule(&report, "first_link").passed);
    assert!(rule(&report, "direction").passed);
}
