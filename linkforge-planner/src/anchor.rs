//! Anchor text selection with per-target diversity enforcement.

use crate::graph::GraphNode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How many times the same anchor string may be reused for one target
/// within a scope before selection falls back to a variant.
pub const DEFAULT_DIVERSITY_CAP: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    ExactMatch,
    PartialMatch,
    Natural,
}

impl AnchorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorKind::ExactMatch => "exact_match",
            AnchorKind::PartialMatch => "partial_match",
            AnchorKind::Natural => "natural",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exact_match" => Some(AnchorKind::ExactMatch),
            "partial_match" => Some(AnchorKind::PartialMatch),
            "natural" => Some(AnchorKind::Natural),
            _ => None,
        }
    }
}

/// Per-scope tally of anchor strings already used per target page.
/// Matching is case-insensitive.
#[derive(Debug, Default)]
pub struct UsedAnchors {
    counts: HashMap<(i64, String), usize>,
}

impl UsedAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, target: i64, text: &str) -> usize {
        self.counts
            .get(&(target, text.to_lowercase()))
            .copied()
            .unwrap_or(0)
    }

    pub fn record(&mut self, target: i64, text: &str) {
        *self.counts.entry((target, text.to_lowercase())).or_insert(0) += 1;
    }
}

pub struct AnchorSelector {
    diversity_cap: usize,
}

impl AnchorSelector {
    pub fn new() -> Self {
        Self {
            diversity_cap: DEFAULT_DIVERSITY_CAP,
        }
    }

    pub fn with_diversity_cap(mut self, cap: usize) -> Self {
        self.diversity_cap = cap;
        self
    }

    /// Prefers the target's primary keyword verbatim until the diversity cap
    /// is hit for that target, then secondary-keyword variants, then the
    /// page title, then a derived natural phrase.
    pub fn choose(&self, target: &GraphNode, used: &mut UsedAnchors) -> (String, AnchorKind) {
        let mut candidates: Vec<(String, AnchorKind)> = Vec::new();
        if let Some(kw) = &target.keyword
            && !kw.trim().is_empty()
        {
            candidates.push((kw.trim().to_string(), AnchorKind::ExactMatch));
        }
        for sk in &target.secondary_keywords {
            if !sk.trim().is_empty() {
                candidates.push((sk.trim().to_string(), AnchorKind::PartialMatch));
            }
        }
        if let Some(title) = &target.title
            && !title.trim().is_empty()
        {
            candidates.push((title.trim().to_string(), AnchorKind::Natural));
        }

        for (text, kind) in &candidates {
            if used.count(target.page_id, text) < self.diversity_cap {
                used.record(target.page_id, text);
                return (text.clone(), *kind);
            }
        }

        // Everything capped out: derive one more natural phrasing. The
        // validator still gets the final say on diversity.
        let base = target
            .title
            .clone()
            .or_else(|| target.keyword.clone())
            .unwrap_or_else(|| target.url.clone());
        let text = format!("more about {}", base.trim());
        used.record(target.page_id, &text);
        (text, AnchorKind::Natural)
    }
}

impl Default for AnchorSelector {
    fn default() -> Self {
        Self::new()
    }
}
