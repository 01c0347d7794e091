//! Post-injection validation. Every rule is evaluated independently and the
//! report carries all outcomes; a run only fails on non-advisory rules.

use crate::model::{InternalLink, Page, Scope};
use linkforge_planner::ClusterRole;
use linkforge_planner::anchor::DEFAULT_DIVERSITY_CAP;
use linkforge_planner::budget::{MAX_RECOMMENDED_LINKS, MIN_RECOMMENDED_LINKS};
use linkforge_planner::html;
use linkforge_planner::inject::DEFAULT_PARAGRAPH_LINK_CAP;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub rule: &'static str,
    pub passed: bool,
    pub advisory: bool,
    pub offending_links: Vec<i64>,
    pub detail: Option<String>,
}

impl RuleResult {
    fn pass(rule: &'static str, advisory: bool) -> Self {
        Self {
            rule,
            passed: true,
            advisory,
            offending_links: Vec::new(),
            detail: None,
        }
    }

    fn fail(rule: &'static str, advisory: bool, offending: Vec<i64>, detail: String) -> Self {
        Self {
            rule,
            passed: false,
            advisory,
            offending_links: offending,
            detail: Some(detail),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub results: Vec<RuleResult>,
}

impl ValidationReport {
    /// Advisory rules never block.
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed || r.advisory)
    }

    pub fn failures(&self) -> Vec<&RuleResult> {
        self.results
            .iter()
            .filter(|r| !r.passed && !r.advisory)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&RuleResult> {
        self.results
            .iter()
            .filter(|r| !r.passed && r.advisory)
            .collect()
    }
}

pub struct Validator {
    budget_range: (usize, usize),
    paragraph_link_cap: usize,
    diversity_cap: usize,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            budget_range: (MIN_RECOMMENDED_LINKS, MAX_RECOMMENDED_LINKS),
            paragraph_link_cap: DEFAULT_PARAGRAPH_LINK_CAP,
            diversity_cap: DEFAULT_DIVERSITY_CAP,
        }
    }

    pub fn with_paragraph_link_cap(mut self, cap: usize) -> Self {
        self.paragraph_link_cap = cap;
        self
    }

    pub fn with_diversity_cap(mut self, cap: usize) -> Self {
        self.diversity_cap = cap;
        self
    }

    /// Run all rules against the links placed in one scope. `pages` must
    /// contain every page the links touch, with post-injection bodies.
    pub fn validate(
        &self,
        links: &[InternalLink],
        pages: &HashMap<i64, Page>,
        scope: Scope,
        cluster_id: Option<i64>,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();
        report.results.push(self.budget_check(links));
        report
            .results
            .push(self.silo_integrity(links, pages, scope, cluster_id));
        report.results.push(self.no_self_links(links));
        report.results.push(self.no_duplicate_links(links));
        report.results.push(self.density(links, pages));
        report.results.push(self.anchor_diversity(links));
        report.results.push(self.first_link(links, pages, scope));
        report.results.push(self.direction(links, pages, scope));
        report
    }

    /// Rule 1 (advisory): each source page should carry a recommended number
    /// of links.
    fn budget_check(&self, links: &[InternalLink]) -> RuleResult {
        let (min, max) = self.budget_range;
        let mut per_source: HashMap<i64, Vec<i64>> = HashMap::new();
        for link in links {
            per_source.entry(link.source_page_id).or_default().push(link.id);
        }
        let mut offending: Vec<i64> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        for (page, ids) in &per_source {
            if ids.len() < min || ids.len() > max {
                offending.extend(ids);
                notes.push(format!("page {page} has {} links", ids.len()));
            }
        }
        if offending.is_empty() {
            RuleResult::pass("budget_check", true)
        } else {
            offending.sort_unstable();
            RuleResult::fail("budget_check", true, offending, notes.join("; "))
        }
    }

    /// Rule 2: links must stay inside their silo. Cluster links connect pages
    /// of the run's cluster; onboarding and blog links connect unclustered
    /// pages of the same project.
    fn silo_integrity(
        &self,
        links: &[InternalLink],
        pages: &HashMap<i64, Page>,
        scope: Scope,
        cluster_id: Option<i64>,
    ) -> RuleResult {
        let mut offending = Vec::new();
        for link in links {
            let pair = (pages.get(&link.source_page_id), pages.get(&link.target_page_id));
            let (Some(source), Some(target)) = pair else {
                offending.push(link.id);
                continue;
            };
            let inside = match scope {
                Scope::Cluster => {
                    source.cluster_id == cluster_id && target.cluster_id == cluster_id
                }
                Scope::Onboarding | Scope::Blog => {
                    source.cluster_id.is_none()
                        && target.cluster_id.is_none()
                        && source.project_id == target.project_id
                }
            };
            if !inside {
                offending.push(link.id);
            }
        }
        if offending.is_empty() {
            RuleResult::pass("silo_integrity", false)
        } else {
            RuleResult::fail(
                "silo_integrity",
                false,
                offending,
                "links cross a silo boundary".to_string(),
            )
        }
    }

    /// Rule 3: a page never links to itself.
    fn no_self_links(&self, links: &[InternalLink]) -> RuleResult {
        let offending: Vec<i64> = links
            .iter()
            .filter(|l| l.source_page_id == l.target_page_id)
            .map(|l| l.id)
            .collect();
        if offending.is_empty() {
            RuleResult::pass("no_self_links", false)
        } else {
            RuleResult::fail(
                "no_self_links",
                false,
                offending,
                "self-referential links".to_string(),
            )
        }
    }

    /// Rule 4: at most one link per (source, target) pair.
    fn no_duplicate_links(&self, links: &[InternalLink]) -> RuleResult {
        let mut groups: HashMap<(i64, i64), Vec<i64>> = HashMap::new();
        for link in links {
            groups
                .entry((link.source_page_id, link.target_page_id))
                .or_default()
                .push(link.id);
        }
        let mut offending: Vec<i64> = groups
            .values()
            .filter(|ids| ids.len() > 1)
            .flatten()
            .copied()
            .collect();
        if offending.is_empty() {
            RuleResult::pass("no_duplicate_links", false)
        } else {
            offending.sort_unstable();
            RuleResult::fail(
                "no_duplicate_links",
                false,
                offending,
                "duplicate (source, target) pairs".to_string(),
            )
        }
    }

    /// Rule 5: no paragraph container exceeds the link cap.
    fn density(&self, links: &[InternalLink], pages: &HashMap<i64, Page>) -> RuleResult {
        let sources: HashSet<i64> = links.iter().map(|l| l.source_page_id).collect();
        let mut offending: Vec<i64> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        for source in sources {
            let Some(page) = pages.get(&source) else {
                continue;
            };
            let over: Vec<usize> = html::paragraph_link_counts(&page.body)
                .into_iter()
                .enumerate()
                .filter(|(_, count)| *count > self.paragraph_link_cap)
                .map(|(index, _)| index)
                .collect();
            if !over.is_empty() {
                offending.extend(links.iter().filter(|l| l.source_page_id == source).map(|l| l.id));
                notes.push(format!("page {source} paragraphs {over:?} exceed the cap"));
            }
        }
        if offending.is_empty() {
            RuleResult::pass("density", false)
        } else {
            offending.sort_unstable();
            RuleResult::fail("density", false, offending, notes.join("; "))
        }
    }

    /// Rule 6: the same anchor text may point at one target only up to the
    /// diversity cap, case-insensitively.
    fn anchor_diversity(&self, links: &[InternalLink]) -> RuleResult {
        let mut groups: HashMap<(i64, String), Vec<i64>> = HashMap::new();
        for link in links {
            groups
                .entry((link.target_page_id, link.anchor_text.to_lowercase()))
                .or_default()
                .push(link.id);
        }
        let mut offending: Vec<i64> = groups
            .values()
            .filter(|ids| ids.len() > self.diversity_cap)
            .flatten()
            .copied()
            .collect();
        if offending.is_empty() {
            RuleResult::pass("anchor_diversity", false)
        } else {
            offending.sort_unstable();
            RuleResult::fail(
                "anchor_diversity",
                false,
                offending,
                "anchor text reused past the diversity cap".to_string(),
            )
        }
    }

    /// Rule 7 (cluster only): the first link in each child's body points at
    /// the cluster parent.
    fn first_link(
        &self,
        links: &[InternalLink],
        pages: &HashMap<i64, Page>,
        scope: Scope,
    ) -> RuleResult {
        if scope != Scope::Cluster {
            return RuleResult::pass("first_link", false);
        }
        let Some(parent) = cluster_parent(pages) else {
            return RuleResult::pass("first_link", false);
        };

        let mut offending: Vec<i64> = Vec::new();
        let sources: HashSet<i64> = links.iter().map(|l| l.source_page_id).collect();
        for source in sources {
            let Some(page) = pages.get(&source) else {
                continue;
            };
            if page.role != Some(ClusterRole::Child) {
                continue;
            }
            let first = html::first_link_href(&page.body);
            if first.as_deref() != Some(parent.url.as_str()) {
                offending.extend(links.iter().filter(|l| l.source_page_id == source).map(|l| l.id));
            }
        }
        if offending.is_empty() {
            RuleResult::pass("first_link", false)
        } else {
            offending.sort_unstable();
            RuleResult::fail(
                "first_link",
                false,
                offending,
                "a child's first in-body link is not its parent".to_string(),
            )
        }
    }

    /// Rule 8 (cluster only): parents only ever link down to their own
    /// children.
    fn direction(
        &self,
        links: &[InternalLink],
        pages: &HashMap<i64, Page>,
        scope: Scope,
    ) -> RuleResult {
        if scope != Scope::Cluster {
            return RuleResult::pass("direction", false);
        }
        let mut offending = Vec::new();
        for link in links {
            let pair = (pages.get(&link.source_page_id), pages.get(&link.target_page_id));
            let (Some(source), Some(target)) = pair else {
                continue;
            };
            if source.role == Some(ClusterRole::Parent)
                && (target.role != Some(ClusterRole::Child)
                    || target.cluster_id != source.cluster_id)
            {
                offending.push(link.id);
            }
        }
        if offending.is_empty() {
            RuleResult::pass("direction", false)
        } else {
            RuleResult::fail(
                "direction",
                false,
                offending,
                "parent links outside its own children".to_string(),
            )
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn cluster_parent(pages: &HashMap<i64, Page>) -> Option<&Page> {
    pages
        .values()
        .filter(|p| p.role == Some(ClusterRole::Parent))
        .min_by_key(|p| p.id)
}
