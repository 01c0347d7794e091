// Tests for CLI handler helpers

use linkforge::handlers::{load_pages_from_file, parse_scope};
use linkforge_core::model::Scope;
use std::fs;
use tempfile::TempDir;

// ============================================================================
// Scope Parsing Tests
// ============================================================================

#[test]
fn test_parse_scope_onboarding() {
    let key = parse_scope(1, "onboarding", None).unwrap();
    assert_eq!(key.project_id, 1);
    assert_eq!(key.scope, Scope::Onboarding);
    assert_eq!(key.cluster_id, None);
}

#[test]
fn test_parse_scope_cluster() {
    let key = parse_scope(1, "cluster", Some(3)).unwrap();
    assert_eq!(key.scope, Scope::Cluster);
    assert_eq!(key.cluster_id, Some(3));
}

#[test]
fn test_parse_scope_blog() {
    let key = parse_scope(7, "blog", None).unwrap();
    assert_eq!(key.scope, Scope::Blog);
}

#[test]
fn test_parse_scope_cluster_requires_cluster_id() {
    let err = parse_scope(1, "cluster", None).unwrap_err();
    assert!(err.contains("cluster"));
}

#[test]
fn test_parse_scope_onboarding_rejects_cluster_id() {
    assert!(parse_scope(1, "onboarding", Some(3)).is_err());
    assert!(parse_scope(1, "blog", Some(3)).is_err());
}

#[test]
fn test_parse_scope_unknown_scope() {
    let err = parse_scope(1, "sitemap", None).unwrap_err();
    assert!(err.contains("sitemap"));
}

// ============================================================================
// Page File Loading Tests
// ============================================================================

#[test]
fn test_load_pages_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pages.json");
    fs::write(
        &path,
        r#"[
            {
                "id": 1,
                "project_id": 1,
                "cluster_id": 3,
                "url": "https://example.com/boots",
                "title": "Boots",
                "body": "<p>All about boots.</p>",
                "word_count": 500,
                "role": "parent",
                "keyword": "boots",
                "content_complete": true,
                "keyword_approved": true
            },
            {
                "id": 2,
                "project_id": 1,
                "url": "https://example.com/blog/fit",
                "labels": ["blog", "fitting"]
            }
        ]"#,
    )
    .unwrap();

    let pages = load_pages_from_file(&path).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].keyword.as_deref(), Some("boots"));
    assert_eq!(pages[0].cluster_id, Some(3));
    assert!(pages[1].labels.contains("blog"));
    // omitted fields fall back to defaults
    assert!(!pages[1].content_complete);
    assert_eq!(pages[1].word_count, 0);
}

#[test]
fn test_load_pages_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.json");
    let err = load_pages_from_file(&path).unwrap_err();
    assert!(err.contains("Failed to read"));
}

#[test]
fn test_load_pages_invalid_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pages.json");
    fs::write(&path, "not json at all").unwrap();
    let err = load_pages_from_file(&path).unwrap_err();
    assert!(err.contains("Invalid pages file"));
}

#[test]
fn test_load_pages_empty_list() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pages.json");
    fs::write(&path, "[]").unwrap();
    let err = load_pages_from_file(&path).unwrap_err();
    assert!(err.contains("No pages"));
}
