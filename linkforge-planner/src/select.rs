//! Target selection: walk the graph plus budgets and pick concrete
//! (source, target) pairs.

use crate::budget::target_link_count;
use crate::graph::{EdgeAttr, EdgeKind, LinkGraph};
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedLink {
    pub source_page_id: i64,
    pub target_page_id: i64,
    pub is_mandatory: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionPlan {
    pub links: Vec<PlannedLink>,
    /// Under-budget observations. Advisory, never a failure.
    pub warnings: Vec<String>,
}

pub struct TargetSelector;

impl TargetSelector {
    /// Cluster scope: every child's mandatory target is its parent, exactly
    /// one mandatory link per child. Remaining budget is filled from sibling
    /// edges, weight descending, ties broken by ascending target id. Each
    /// unordered sibling pair yields at most one link across the whole plan.
    pub fn select_cluster(graph: &LinkGraph) -> SelectionPlan {
        let mut plan = SelectionPlan::default();
        let mut taken: HashSet<(i64, i64)> = HashSet::new();
        let mut used_pairs: HashSet<(i64, i64)> = HashSet::new();

        for child in graph.children() {
            let budget = graph
                .node(child)
                .map(|n| target_link_count(n.word_count))
                .unwrap_or(0);
            let mut realized = 0usize;

            let parent = graph
                .edges_of(child)
                .into_iter()
                .filter(|(_, attr)| attr.kind == EdgeKind::ParentChild)
                .map(|(id, _)| id)
                .min();
            if let Some(parent) = parent
                && taken.insert((child, parent))
            {
                plan.links.push(PlannedLink {
                    source_page_id: child,
                    target_page_id: parent,
                    is_mandatory: true,
                });
                realized += 1;
            }

            let mut siblings: Vec<(i64, EdgeAttr)> = graph
                .edges_of(child)
                .into_iter()
                .filter(|(_, attr)| attr.kind == EdgeKind::Sibling)
                .collect();
            siblings.sort_by(|a, b| b.1.weight.cmp(&a.1.weight).then(a.0.cmp(&b.0)));

            for (sibling, _) in siblings {
                if realized >= budget {
                    break;
                }
                let pair = normalize_pair(child, sibling);
                if used_pairs.contains(&pair) || !taken.insert((child, sibling)) {
                    continue;
                }
                used_pairs.insert(pair);
                plan.links.push(PlannedLink {
                    source_page_id: child,
                    target_page_id: sibling,
                    is_mandatory: false,
                });
                realized += 1;
            }

            note_shortfall(&mut plan, child, realized, budget);
        }
        plan
    }

    /// Site scope: fill each page's budget purely from label_overlap edges,
    /// weight descending, ties broken by ascending target id. No mandatory
    /// edges exist here; both directions of a pair are allowed.
    pub fn select_site(graph: &LinkGraph) -> SelectionPlan {
        let mut plan = SelectionPlan::default();
        let mut taken: HashSet<(i64, i64)> = HashSet::new();

        for page in graph.page_ids() {
            let budget = graph
                .node(page)
                .map(|n| target_link_count(n.word_count))
                .unwrap_or(0);
            let mut realized = 0usize;

            let mut edges: Vec<(i64, EdgeAttr)> = graph
                .edges_of(page)
                .into_iter()
                .filter(|(_, attr)| attr.kind == EdgeKind::LabelOverlap)
                .collect();
            edges.sort_by(|a, b| b.1.weight.cmp(&a.1.weight).then(a.0.cmp(&b.0)));

            for (target, _) in edges {
                if realized >= budget {
                    break;
                }
                if !taken.insert((page, target)) {
                    continue;
                }
                plan.links.push(PlannedLink {
                    source_page_id: page,
                    target_page_id: target,
                    is_mandatory: false,
                });
                realized += 1;
            }

            note_shortfall(&mut plan, page, realized, budget);
        }
        plan
    }
}

fn normalize_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b { (a, b) } else { (b, a) }
}

fn note_shortfall(plan: &mut SelectionPlan, page: i64, realized: usize, budget: usize) {
    if realized < budget {
        let msg = format!("page {page} realized {realized} of {budget} budgeted links");
        warn!("{msg}");
        plan.warnings.push(msg);
    }
}
