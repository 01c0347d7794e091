//! Planning pipeline: prerequisite checks, the per-scope job registry, and
//! the background job that builds, injects, and validates a link plan.

use crate::data::Database;
use crate::model::{
    InternalLink, LinkStatus, Page, PipelineProgress, PipelineStatus, PlacementMethod,
    STEP_LABELS, Scope, ScopeKey,
};
use crate::snapshot::SnapshotManager;
use crate::validate::Validator;
use futures::future::join_all;
use linkforge_planner::anchor::DEFAULT_DIVERSITY_CAP;
use linkforge_planner::fallback::DEFAULT_FALLBACK_CONCURRENCY;
use linkforge_planner::graph::DEFAULT_OVERLAP_THRESHOLD;
use linkforge_planner::inject::{DEFAULT_MIN_WORD_SPACING, DEFAULT_PARAGRAPH_LINK_CAP};
use linkforge_planner::{
    AnchorKind, AnchorSelector, FallbackClient, GraphBuilder, Injector, PlanError, PlannedLink,
    TargetSelector, UsedAnchors, html,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("prerequisite not met: {0}")]
    Prerequisite(String),
    #[error("a planning run is already active for {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("snapshot {0} does not exist")]
    SnapshotMissing(String),
    #[error("snapshot restore failed: {0}")]
    SnapshotRestore(String),
    #[error("link validation failed: {0}")]
    Validator(String),
    #[error("planning error: {0}")]
    Plan(#[from] PlanError),
}

/// In-process table of running and finished jobs, keyed by scope. The
/// insert-if-not-planning check in [`try_begin`](JobRegistry::try_begin) is
/// what makes duplicate triggers for one scope impossible.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<ScopeKey, PipelineProgress>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim the scope. Returns false when a run is already
    /// planning there.
    pub fn try_begin(&self, key: ScopeKey) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get(&key) {
            Some(progress) if progress.status == PipelineStatus::Planning => false,
            _ => {
                jobs.insert(key, PipelineProgress::planning());
                true
            }
        }
    }

    pub fn update<F>(&self, key: &ScopeKey, apply: F)
    where
        F: FnOnce(&mut PipelineProgress),
    {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(progress) = jobs.get_mut(key) {
            apply(progress);
        }
    }

    /// Current progress for a scope; scopes never triggered report idle.
    pub fn lookup(&self, key: &ScopeKey) -> PipelineProgress {
        self.jobs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

/// Tunables threaded through to the planner building blocks.
#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub overlap_threshold: u32,
    pub paragraph_link_cap: usize,
    pub min_word_spacing: usize,
    pub diversity_cap: usize,
    pub fallback_endpoint: Option<Url>,
    pub fallback_concurrency: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            paragraph_link_cap: DEFAULT_PARAGRAPH_LINK_CAP,
            min_word_spacing: DEFAULT_MIN_WORD_SPACING,
            diversity_cap: DEFAULT_DIVERSITY_CAP,
            fallback_endpoint: None,
            fallback_concurrency: DEFAULT_FALLBACK_CONCURRENCY,
        }
    }
}

pub struct Orchestrator {
    db_path: PathBuf,
    registry: Arc<JobRegistry>,
    settings: PlannerSettings,
}

impl Orchestrator {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            registry: Arc::new(JobRegistry::new()),
            settings: PlannerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PlannerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn status(&self, key: &ScopeKey) -> PipelineProgress {
        self.registry.lookup(key)
    }

    /// Synchronous phase: validate the key, check prerequisites, claim the
    /// scope, then hand off to a background job. Errors here surface to the
    /// caller immediately; everything after is observable via [`status`](Self::status).
    pub fn trigger(&self, key: ScopeKey) -> Result<(), PipelineError> {
        key.validate().map_err(PipelineError::Validation)?;

        let db = Database::new(&self.db_path)?;
        check_prerequisites(&db, &key)?;
        drop(db);

        if !self.registry.try_begin(key) {
            return Err(PipelineError::Conflict(key.to_string()));
        }

        info!(scope = %key, "link planning triggered");
        let db_path = self.db_path.clone();
        let registry = Arc::clone(&self.registry);
        let settings = self.settings.clone();
        tokio::spawn(run_job(db_path, key, registry, settings));
        Ok(())
    }
}

fn check_prerequisites(db: &Database, key: &ScopeKey) -> Result<(), PipelineError> {
    if key.scope != Scope::Cluster {
        // Site-wide scopes have no hard gate; ineligible pages are just
        // excluded from the graph.
        return Ok(());
    }
    let pages = db.scope_pages(key)?;
    let ungated: Vec<i64> = pages
        .iter()
        .filter(|p| !p.content_complete || !p.keyword_approved)
        .map(|p| p.id)
        .collect();
    if !ungated.is_empty() {
        return Err(PipelineError::Prerequisite(format!(
            "cluster pages not ready: {ungated:?}"
        )));
    }
    if pages.len() < 2 {
        return Err(PipelineError::Prerequisite(
            "cluster has fewer than 2 pages".to_string(),
        ));
    }
    Ok(())
}

async fn run_job(
    db_path: PathBuf,
    key: ScopeKey,
    registry: Arc<JobRegistry>,
    settings: PlannerSettings,
) {
    let outcome = execute_plan(&db_path, &key, &registry, &settings).await;
    // the registry entry is settled here no matter how the job ended
    match outcome {
        Ok(total_links) => {
            registry.update(&key, |p| {
                p.status = PipelineStatus::Complete;
                p.total_links = total_links;
            });
            info!(scope = %key, links = total_links, "link planning complete");
        }
        Err(e) => {
            registry.update(&key, |p| {
                p.status = PipelineStatus::Failed;
                p.error = Some(e.to_string());
            });
            error!(scope = %key, "link planning failed: {e}");
        }
    }
}

fn set_step(registry: &JobRegistry, key: &ScopeKey, step: usize) {
    registry.update(key, |p| {
        p.current_step = step as u32;
        p.step_label = STEP_LABELS[step - 1].to_string();
    });
}

async fn execute_plan(
    db_path: &Path,
    key: &ScopeKey,
    registry: &JobRegistry,
    settings: &PlannerSettings,
) -> Result<usize, PipelineError> {
    // Every job opens its own connection; jobs never share one.
    let mut db = Database::new(db_path)?;

    set_step(registry, key, 2);
    let pages = db.scope_pages(key)?;
    registry.update(key, |p| p.total_pages = pages.len());

    let builder = GraphBuilder::new().with_overlap_threshold(settings.overlap_threshold);
    let graph = match key.scope {
        Scope::Cluster => builder.build_cluster(&pages),
        Scope::Onboarding | Scope::Blog => builder.build_site(&pages),
    };
    if graph.is_empty() {
        // nothing eligible: a complete run with zero links, not a failure
        return Ok(0);
    }

    set_step(registry, key, 3);
    let selection = match key.scope {
        Scope::Cluster => TargetSelector::select_cluster(&graph),
        Scope::Onboarding | Scope::Blog => TargetSelector::select_site(&graph),
    };
    for warning in &selection.warnings {
        warn!(scope = %key, "{warning}");
    }

    let anchor_selector = AnchorSelector::new().with_diversity_cap(settings.diversity_cap);
    let mut used = UsedAnchors::new();
    let mut by_source: BTreeMap<i64, Vec<(PlannedLink, String, AnchorKind)>> = BTreeMap::new();
    for link in &selection.links {
        let Some(target) = graph.node(link.target_page_id) else {
            continue;
        };
        let (text, kind) = anchor_selector.choose(target, &mut used);
        by_source
            .entry(link.source_page_id)
            .or_default()
            .push((*link, text, kind));
    }
    // mandatory links are always placed first within a page
    for placements in by_source.values_mut() {
        placements.sort_by_key(|(link, _, _)| !link.is_mandatory);
    }

    let prior = db.active_links(key)?;
    if !prior.is_empty() {
        set_step(registry, key, 4);
        let snapshot_id = SnapshotManager::new(&db).capture(key)?;
        debug!(snapshot = %snapshot_id, "prior plan captured before strip");
        strip_prior_links(&db, &prior)?;
        db.mark_links_removed(key)?;
    }

    set_step(registry, key, 5);
    let injector = Injector::new()
        .with_paragraph_link_cap(settings.paragraph_link_cap)
        .with_min_word_spacing(settings.min_word_spacing);

    let mut stored: Vec<InternalLink> = Vec::new();
    let mut failures: Vec<String> = Vec::new();
    let mut escalations: BTreeMap<i64, Vec<(PlannedLink, String, AnchorKind, String)>> =
        BTreeMap::new();

    let mut processed = 0usize;
    for (&source, placements) in &by_source {
        let Some(page) = db.get_page(source)? else {
            continue;
        };
        let mut body = page.body.clone();
        let mut mandatory_end = 0usize;
        let mut parent_pending = false;
        for (link, anchor, kind) in placements {
            let Some(target) = graph.node(link.target_page_id) else {
                continue;
            };
            // once a page's parent link is escalated, its sibling links stay
            // planned: injecting them now would put a sibling ahead of the
            // parent in document order
            if !link.is_mandatory && parent_pending {
                record_unplaced(
                    &db,
                    key,
                    link,
                    anchor,
                    *kind,
                    &mut failures,
                    "held back until the parent link is placed",
                )?;
                continue;
            }
            let min_offset = if link.is_mandatory { 0 } else { mandatory_end };
            match injector.inject_after(&body, anchor, &target.url, min_offset) {
                Some(done) => {
                    if link.is_mandatory {
                        mandatory_end = done.offset + 1;
                    }
                    body = done.html;
                    let mut row = build_link(
                        key,
                        link,
                        anchor,
                        *kind,
                        Some(done.offset as i64),
                        PlacementMethod::RuleBased,
                        LinkStatus::Injected,
                    );
                    row.id = db.insert_link(&row)?;
                    stored.push(row);
                }
                None => {
                    if link.is_mandatory {
                        parent_pending = true;
                    }
                    escalations.entry(source).or_default().push((
                        *link,
                        anchor.clone(),
                        *kind,
                        target.url.clone(),
                    ));
                }
            }
        }
        db.update_page_body(source, &body)?;
        processed += 1;
        let placed = stored.len();
        registry.update(key, |p| {
            p.pages_processed = processed;
            p.total_links = placed;
        });
    }

    if !escalations.is_empty() {
        db = run_fallbacks(db, key, settings, escalations, &mut stored, &mut failures).await?;
    }

    set_step(registry, key, 6);
    let pages_now: HashMap<i64, Page> = db
        .scope_pages(key)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let validator = Validator::new()
        .with_paragraph_link_cap(settings.paragraph_link_cap)
        .with_diversity_cap(settings.diversity_cap);
    let report = validator.validate(&stored, &pages_now, key.scope, key.cluster_id);
    for warning in report.warnings() {
        warn!(scope = %key, rule = warning.rule, "validation warning: {:?}", warning.detail);
    }
    if !report.passed() {
        let summary = report
            .failures()
            .iter()
            .map(|r| format!("{} {:?}", r.rule, r.offending_links))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(PipelineError::Validator(summary));
    }
    for link in &stored {
        db.set_link_status(link.id, LinkStatus::Verified)?;
    }

    if !failures.is_empty() {
        warn!(scope = %key, "{} links could not be placed", failures.len());
        let detail = failures.join("; ");
        registry.update(key, |p| p.error = Some(detail));
    }
    Ok(stored.len())
}

/// Unwrap the previous plan's anchors from every page body they touch.
fn strip_prior_links(db: &Database, prior: &[InternalLink]) -> Result<(), PipelineError> {
    let mut targets: HashSet<String> = HashSet::new();
    for link in prior {
        if let Some(page) = db.get_page(link.target_page_id)? {
            targets.insert(page.url);
        }
    }
    let sources: HashSet<i64> = prior.iter().map(|l| l.source_page_id).collect();
    for source in sources {
        if let Some(page) = db.get_page(source)? {
            let stripped = html::strip_links_to(&page.body, &targets);
            db.update_page_body(source, &stripped)?;
        }
    }
    Ok(())
}

/// Escalate unplaceable links to the fallback endpoint, one future per
/// source page so a page's edits stay sequential. Failures are recorded as
/// planned rows and the job carries on. Takes the connection by value so no
/// `&Database` borrow is held across the await (`rusqlite::Connection` is
/// `Send` but not `Sync`), and hands it back to the caller.
async fn run_fallbacks(
    db: Database,
    key: &ScopeKey,
    settings: &PlannerSettings,
    escalations: BTreeMap<i64, Vec<(PlannedLink, String, AnchorKind, String)>>,
    stored: &mut Vec<InternalLink>,
    failures: &mut Vec<String>,
) -> Result<Database, PipelineError> {
    let Some(endpoint) = settings.fallback_endpoint.clone() else {
        for (_, placements) in escalations {
            for (link, anchor, kind, _) in placements {
                record_unplaced(
                    &db,
                    key,
                    &link,
                    &anchor,
                    kind,
                    failures,
                    "no fallback endpoint configured",
                )?;
            }
        }
        return Ok(db);
    };
    let client = Arc::new(
        FallbackClient::new(endpoint).with_concurrency(settings.fallback_concurrency),
    );

    let mut groups = Vec::new();
    for (source, placements) in escalations {
        let Some(page) = db.get_page(source)? else {
            continue;
        };
        groups.push((source, page.body, placements));
    }

    let tasks = groups.into_iter().map(|(source, body, placements)| {
        let client = Arc::clone(&client);
        async move {
            let mut body = body;
            let mut placed = Vec::new();
            let mut rejected = Vec::new();
            for (link, anchor, kind, target_url) in placements {
                match client.inject(&body, &anchor, &target_url).await {
                    Ok(edited) => {
                        body = edited;
                        placed.push((link, anchor, kind));
                    }
                    Err(e) => rejected.push((link, anchor, kind, e.to_string())),
                }
            }
            (source, body, placed, rejected)
        }
    });

    for (source, body, placed, rejected) in join_all(tasks).await {
        if !placed.is_empty() {
            db.update_page_body(source, &body)?;
        }
        for (link, anchor, kind) in placed {
            let mut row = build_link(
                key,
                &link,
                &anchor,
                kind,
                None,
                PlacementMethod::LlmFallback,
                LinkStatus::Injected,
            );
            row.id = db.insert_link(&row)?;
            stored.push(row);
        }
        for (link, anchor, kind, reason) in rejected {
            record_unplaced(&db, key, &link, &anchor, kind, failures, &reason)?;
        }
    }
    Ok(db)
}

/// A link that could not be placed stays in the plan as a planned row so
/// the shortfall is visible, and the job keeps going. Planned rows are
/// excluded from validation.
fn record_unplaced(
    db: &Database,
    key: &ScopeKey,
    link: &PlannedLink,
    anchor: &str,
    kind: AnchorKind,
    failures: &mut Vec<String>,
    reason: &str,
) -> Result<(), PipelineError> {
    let row = build_link(
        key,
        link,
        anchor,
        kind,
        None,
        PlacementMethod::RuleBased,
        LinkStatus::Planned,
    );
    db.insert_link(&row)?;
    failures.push(format!(
        "{} -> {}: {reason}",
        link.source_page_id, link.target_page_id
    ));
    Ok(())
}

fn build_link(
    key: &ScopeKey,
    link: &PlannedLink,
    anchor: &str,
    kind: AnchorKind,
    position: Option<i64>,
    method: PlacementMethod,
    status: LinkStatus,
) -> InternalLink {
    InternalLink {
        id: 0,
        source_page_id: link.source_page_id,
        target_page_id: link.target_page_id,
        project_id: key.project_id,
        cluster_id: key.cluster_id,
        scope: key.scope,
        anchor_text: anchor.to_string(),
        anchor_type: kind,
        position_in_content: position,
        is_mandatory: link.is_mandatory,
        placement_method: method,
        status,
        created_at: 0,
        updated_at: 0,
    }
}
