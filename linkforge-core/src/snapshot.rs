//! Rollback points for destructive re-plans.

use crate::data::{Database, current_timestamp};
use crate::model::{LinkPlanSnapshot, LinkStatus, PageCapture, ScopeKey, SnapshotData};
use crate::pipeline::PipelineError;
use tracing::{error, info};

pub struct SnapshotManager<'a> {
    db: &'a Database,
}

impl<'a> SnapshotManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Capture the scope's page bodies and live link rows. Returns the
    /// snapshot id.
    pub fn capture(&self, key: &ScopeKey) -> Result<String, PipelineError> {
        let pages = self.db.scope_pages(key)?;
        let links = self.db.active_links(key)?;
        let snapshot = LinkPlanSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: key.project_id,
            cluster_id: key.cluster_id,
            scope: key.scope,
            total_links: links.len() as i64,
            plan_data: SnapshotData {
                pages: pages
                    .iter()
                    .map(|p| PageCapture {
                        page_id: p.id,
                        body: p.body.clone(),
                    })
                    .collect(),
                links,
            },
            created_at: current_timestamp(),
        };
        self.db.insert_snapshot(&snapshot)?;
        info!(snapshot = %snapshot.id, scope = %key, "captured link plan snapshot");
        Ok(snapshot.id)
    }

    /// Put page bodies back as captured and retire the captured link rows.
    /// A restore that fails partway is reported loudly; the snapshot row
    /// itself is never deleted, so the restore can be retried.
    pub fn restore(&self, snapshot_id: &str) -> Result<(), PipelineError> {
        let snapshot = self
            .db
            .get_snapshot(snapshot_id)?
            .ok_or_else(|| PipelineError::SnapshotMissing(snapshot_id.to_string()))?;

        for capture in &snapshot.plan_data.pages {
            self.db
                .update_page_body(capture.page_id, &capture.body)
                .map_err(|e| {
                    error!(
                        snapshot = snapshot_id,
                        page = capture.page_id,
                        "restore failed mid-way: {e}"
                    );
                    PipelineError::SnapshotRestore(format!(
                        "page {} could not be restored: {e}",
                        capture.page_id
                    ))
                })?;
        }
        for link in &snapshot.plan_data.links {
            self.db
                .set_link_status(link.id, LinkStatus::Removed)
                .map_err(|e| {
                    error!(snapshot = snapshot_id, link = link.id, "restore failed mid-way: {e}");
                    PipelineError::SnapshotRestore(format!(
                        "link {} could not be retired: {e}",
                        link.id
                    ))
                })?;
        }
        info!(
            snapshot = snapshot_id,
            pages = snapshot.plan_data.pages.len(),
            links = snapshot.plan_data.links.len(),
            "restored link plan snapshot"
        );
        Ok(())
    }
}
