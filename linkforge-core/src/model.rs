//! Domain records shared across persistence, planning, and reporting.

use linkforge_planner::{AnchorKind, ClusterRole, PageSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Which slice of a project a planning run operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Onboarding,
    Cluster,
    Blog,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Onboarding => "onboarding",
            Scope::Cluster => "cluster",
            Scope::Blog => "blog",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "onboarding" => Some(Scope::Onboarding),
            "cluster" => Some(Scope::Cluster),
            "blog" => Some(Scope::Blog),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one planning run's working set. Two runs conflict iff their
/// keys are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub project_id: i64,
    pub scope: Scope,
    pub cluster_id: Option<i64>,
}

impl ScopeKey {
    pub fn onboarding(project_id: i64) -> Self {
        Self {
            project_id,
            scope: Scope::Onboarding,
            cluster_id: None,
        }
    }

    pub fn cluster(project_id: i64, cluster_id: i64) -> Self {
        Self {
            project_id,
            scope: Scope::Cluster,
            cluster_id: Some(cluster_id),
        }
    }

    pub fn blog(project_id: i64) -> Self {
        Self {
            project_id,
            scope: Scope::Blog,
            cluster_id: None,
        }
    }

    /// Cluster scope requires a cluster id; the other scopes must not carry
    /// one.
    pub fn validate(&self) -> Result<(), String> {
        match (self.scope, self.cluster_id) {
            (Scope::Cluster, None) => Err("cluster scope requires a cluster id".to_string()),
            (Scope::Onboarding | Scope::Blog, Some(_)) => Err(format!(
                "{} scope does not take a cluster id",
                self.scope
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cluster_id {
            Some(cluster) => write!(
                f,
                "project {} {} (cluster {})",
                self.project_id, self.scope, cluster
            ),
            None => write!(f, "project {} {}", self.project_id, self.scope),
        }
    }
}

/// One page of generated site content, as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub id: i64,
    pub project_id: i64,
    #[serde(default)]
    pub cluster_id: Option<i64>,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub role: Option<ClusterRole>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub secondary_keywords: Vec<String>,
    #[serde(default)]
    pub content_complete: bool,
    #[serde(default)]
    pub keyword_approved: bool,
}

impl PageSource for Page {
    fn page_id(&self) -> i64 {
        self.id
    }
    fn page_url(&self) -> &str {
        &self.url
    }
    fn page_title(&self) -> Option<&str> {
        self.title.as_deref()
    }
    fn primary_keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }
    fn secondary_keywords(&self) -> Vec<String> {
        self.secondary_keywords.clone()
    }
    fn word_count(&self) -> usize {
        self.word_count
    }
    fn cluster_role(&self) -> Option<ClusterRole> {
        self.role
    }
    fn labels(&self) -> BTreeSet<String> {
        self.labels.clone()
    }
    fn content_complete(&self) -> bool {
        self.content_complete
    }
    fn keyword_approved(&self) -> bool {
        self.keyword_approved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Planned,
    Injected,
    Verified,
    Removed,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Planned => "planned",
            LinkStatus::Injected => "injected",
            LinkStatus::Verified => "verified",
            LinkStatus::Removed => "removed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(LinkStatus::Planned),
            "injected" => Some(LinkStatus::Injected),
            "verified" => Some(LinkStatus::Verified),
            "removed" => Some(LinkStatus::Removed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMethod {
    RuleBased,
    LlmFallback,
}

impl PlacementMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementMethod::RuleBased => "rule_based",
            PlacementMethod::LlmFallback => "llm_fallback",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rule_based" => Some(PlacementMethod::RuleBased),
            "llm_fallback" => Some(PlacementMethod::LlmFallback),
            _ => None,
        }
    }
}

/// One planned or placed internal link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalLink {
    pub id: i64,
    pub source_page_id: i64,
    pub target_page_id: i64,
    pub project_id: i64,
    pub cluster_id: Option<i64>,
    pub scope: Scope,
    pub anchor_text: String,
    pub anchor_type: AnchorKind,
    pub position_in_content: Option<i64>,
    pub is_mandatory: bool,
    pub placement_method: PlacementMethod,
    pub status: LinkStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Page bodies and link rows captured before a destructive re-plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotData {
    pub pages: Vec<PageCapture>,
    pub links: Vec<InternalLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCapture {
    pub page_id: i64,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct LinkPlanSnapshot {
    pub id: String,
    pub project_id: i64,
    pub cluster_id: Option<i64>,
    pub scope: Scope,
    pub plan_data: SnapshotData,
    pub total_links: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Idle,
    Planning,
    Complete,
    Failed,
}

/// Labels for the planning job's steps, in order.
pub const STEP_LABELS: [&str; 6] = [
    "validating prerequisites",
    "building graph",
    "selecting targets",
    "capturing snapshot",
    "injecting links",
    "validating links",
];

/// Observable state of one scope's planning job.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineProgress {
    pub status: PipelineStatus,
    pub current_step: u32,
    pub step_label: String,
    pub pages_processed: usize,
    pub total_pages: usize,
    pub total_links: usize,
    pub error: Option<String>,
}

impl PipelineProgress {
    pub fn planning() -> Self {
        Self {
            status: PipelineStatus::Planning,
            current_step: 1,
            step_label: STEP_LABELS[0].to_string(),
            ..Self::default()
        }
    }
}

impl Default for PipelineProgress {
    fn default() -> Self {
        Self {
            status: PipelineStatus::Idle,
            current_step: 0,
            step_label: String::new(),
            pages_processed: 0,
            total_pages: 0,
            total_links: 0,
            error: None,
        }
    }
}
