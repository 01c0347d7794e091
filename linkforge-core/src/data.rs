use crate::model::{
    InternalLink, LinkPlanSnapshot, LinkStatus, Page, PlacementMethod, Scope, ScopeKey,
    SnapshotData,
};
use linkforge_planner::{AnchorKind, ClusterRole};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Database {
    conn: Connection,
}

pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn bad_column(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        format!("unrecognized {column}: {value}").into(),
    )
}

fn json_list(value: &str) -> Vec<String> {
    serde_json::from_str(value).unwrap_or_default()
}

impl Database {
    pub fn drop(path: &Path) {
        fs::remove_file(path).unwrap();
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Optimize for concurrent writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Generated site pages
            CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL,
    cluster_id INTEGER,
    url TEXT NOT NULL,
    title TEXT,
    body TEXT NOT NULL DEFAULT '',
    word_count INTEGER NOT NULL DEFAULT 0,
    role TEXT CHECK(role IN ('parent', 'child')),
    labels TEXT NOT NULL DEFAULT '[]',              -- JSON array
    keyword TEXT,
    secondary_keywords TEXT NOT NULL DEFAULT '[]',  -- JSON array
    content_complete BOOLEAN NOT NULL DEFAULT 0,
    keyword_approved BOOLEAN NOT NULL DEFAULT 0,
    UNIQUE(project_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_project ON pages(project_id);
CREATE INDEX IF NOT EXISTS idx_pages_cluster ON pages(project_id, cluster_id);

-- Planned and placed internal links
CREATE TABLE IF NOT EXISTS internal_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_page_id INTEGER NOT NULL,
    target_page_id INTEGER NOT NULL,
    project_id INTEGER NOT NULL,
    cluster_id INTEGER,
    scope TEXT NOT NULL CHECK(scope IN ('onboarding', 'cluster', 'blog')),
    anchor_text TEXT NOT NULL,
    anchor_type TEXT NOT NULL CHECK(anchor_type IN ('exact_match', 'partial_match', 'natural')),
    position_in_content INTEGER,
    is_mandatory BOOLEAN NOT NULL DEFAULT 0,
    placement_method TEXT NOT NULL CHECK(placement_method IN ('rule_based', 'llm_fallback')),
    status TEXT NOT NULL CHECK(status IN ('planned', 'injected', 'verified', 'removed')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK(source_page_id != target_page_id),
    FOREIGN KEY(source_page_id) REFERENCES pages(id) ON DELETE CASCADE,
    FOREIGN KEY(target_page_id) REFERENCES pages(id) ON DELETE CASCADE
);

-- At most one live link per (source, target) pair within a scope
CREATE UNIQUE INDEX IF NOT EXISTS idx_links_active_pair
    ON internal_links(project_id, scope, IFNULL(cluster_id, -1), source_page_id, target_page_id)
    WHERE status != 'removed';

CREATE INDEX IF NOT EXISTS idx_links_scope ON internal_links(project_id, scope, cluster_id);
CREATE INDEX IF NOT EXISTS idx_links_source ON internal_links(source_page_id);
CREATE INDEX IF NOT EXISTS idx_links_status ON internal_links(status);

-- Rollback points captured before destructive re-plans
CREATE TABLE IF NOT EXISTS link_plan_snapshots (
    id TEXT PRIMARY KEY,
    project_id INTEGER NOT NULL,
    cluster_id INTEGER,
    scope TEXT NOT NULL CHECK(scope IN ('onboarding', 'cluster', 'blog')),
    plan_data TEXT NOT NULL,  -- JSON: page bodies plus link rows
    total_links INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshots_scope ON link_plan_snapshots(project_id, scope, cluster_id);
            ",
        )?;
        Ok(())
    }

    // Page operations
    pub fn insert_page(&self, page: &Page) -> Result<i64> {
        let labels = serde_json::to_string(&page.labels).unwrap_or_else(|_| "[]".to_string());
        let secondary =
            serde_json::to_string(&page.secondary_keywords).unwrap_or_else(|_| "[]".to_string());

        self.conn.execute(
            "INSERT INTO pages (
                id, project_id, cluster_id, url, title, body, word_count, role,
                labels, keyword, secondary_keywords, content_complete, keyword_approved
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                if page.id > 0 { Some(page.id) } else { None },
                page.project_id,
                page.cluster_id,
                &page.url,
                &page.title,
                &page.body,
                page.word_count as i64,
                page.role.map(|r| r.as_str()),
                labels,
                &page.keyword,
                secondary,
                page.content_complete,
                page.keyword_approved,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_page(&self, page_id: i64) -> Result<Option<Page>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE id = ?1"
        ))?;
        stmt.query_row(params![page_id], row_to_page).optional()
    }

    pub fn pages_for_cluster(&self, project_id: i64, cluster_id: i64) -> Result<Vec<Page>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages
             WHERE project_id = ?1 AND cluster_id = ?2 ORDER BY id"
        ))?;
        let pages = stmt
            .query_map(params![project_id, cluster_id], row_to_page)?
            .collect::<Result<Vec<_>>>()?;
        Ok(pages)
    }

    pub fn site_pages(&self, project_id: i64) -> Result<Vec<Page>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages
             WHERE project_id = ?1 AND cluster_id IS NULL ORDER BY id"
        ))?;
        let pages = stmt
            .query_map(params![project_id], row_to_page)?
            .collect::<Result<Vec<_>>>()?;
        Ok(pages)
    }

    /// The working set for one scope key. Blog narrows the site-wide set to
    /// pages carrying the blog label.
    pub fn scope_pages(&self, key: &ScopeKey) -> Result<Vec<Page>> {
        match key.scope {
            Scope::Cluster => match key.cluster_id {
                Some(cluster_id) => self.pages_for_cluster(key.project_id, cluster_id),
                None => Ok(Vec::new()),
            },
            Scope::Onboarding => self.site_pages(key.project_id),
            Scope::Blog => {
                let pages = self.site_pages(key.project_id)?;
                Ok(pages
                    .into_iter()
                    .filter(|p| p.labels.contains("blog"))
                    .collect())
            }
        }
    }

    /// Replace a page body. word_count is left alone: budgets are based on
    /// authored content length, not on bodies that links were spliced into.
    pub fn update_page_body(&self, page_id: i64, body: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE pages SET body = ?1 WHERE id = ?2",
            params![body, page_id],
        )?;
        Ok(())
    }

    // Link operations
    pub fn insert_link(&self, link: &InternalLink) -> Result<i64> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "INSERT INTO internal_links (
                source_page_id, target_page_id, project_id, cluster_id, scope,
                anchor_text, anchor_type, position_in_content, is_mandatory,
                placement_method, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                link.source_page_id,
                link.target_page_id,
                link.project_id,
                link.cluster_id,
                link.scope.as_str(),
                &link.anchor_text,
                link.anchor_type.as_str(),
                link.position_in_content,
                link.is_mandatory,
                link.placement_method.as_str(),
                link.status.as_str(),
                timestamp,
                timestamp,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn set_link_status(&self, link_id: i64, status: LinkStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE internal_links SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), current_timestamp(), link_id],
        )?;
        Ok(())
    }

    /// All non-removed links for one scope key.
    pub fn active_links(&self, key: &ScopeKey) -> Result<Vec<InternalLink>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LINK_COLUMNS} FROM internal_links
             WHERE project_id = ?1 AND scope = ?2 AND cluster_id IS ?3
               AND status != 'removed'
             ORDER BY id"
        ))?;
        let links = stmt
            .query_map(
                params![key.project_id, key.scope.as_str(), key.cluster_id],
                row_to_link,
            )?
            .collect::<Result<Vec<_>>>()?;
        Ok(links)
    }

    /// Mark every non-removed link in the scope as removed. Returns the
    /// number of rows affected.
    pub fn mark_links_removed(&self, key: &ScopeKey) -> Result<usize> {
        let count = self.conn.execute(
            "UPDATE internal_links SET status = 'removed', updated_at = ?1
             WHERE project_id = ?2 AND scope = ?3 AND cluster_id IS ?4
               AND status != 'removed'",
            params![
                current_timestamp(),
                key.project_id,
                key.scope.as_str(),
                key.cluster_id
            ],
        )?;
        Ok(count)
    }

    pub fn removed_link_count(&self, key: &ScopeKey) -> Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM internal_links
             WHERE project_id = ?1 AND scope = ?2 AND cluster_id IS ?3
               AND status = 'removed'",
            params![key.project_id, key.scope.as_str(), key.cluster_id],
            |row| row.get(0),
        )
    }

    // Snapshot operations
    pub fn insert_snapshot(&self, snapshot: &LinkPlanSnapshot) -> Result<()> {
        let plan_data = serde_json::to_string(&snapshot.plan_data)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        self.conn.execute(
            "INSERT INTO link_plan_snapshots (
                id, project_id, cluster_id, scope, plan_data, total_links, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &snapshot.id,
                snapshot.project_id,
                snapshot.cluster_id,
                snapshot.scope.as_str(),
                plan_data,
                snapshot.total_links,
                snapshot.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<LinkPlanSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, cluster_id, scope, plan_data, total_links, created_at
             FROM link_plan_snapshots WHERE id = ?1",
        )?;
        stmt.query_row(params![snapshot_id], row_to_snapshot).optional()
    }

    pub fn snapshot_count(&self, key: &ScopeKey) -> Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM link_plan_snapshots
             WHERE project_id = ?1 AND scope = ?2 AND cluster_id IS ?3",
            params![key.project_id, key.scope.as_str(), key.cluster_id],
            |row| row.get(0),
        )
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

const PAGE_COLUMNS: &str = "id, project_id, cluster_id, url, title, body, word_count, role, \
                            labels, keyword, secondary_keywords, content_complete, keyword_approved";

const LINK_COLUMNS: &str = "id, source_page_id, target_page_id, project_id, cluster_id, scope, \
                            anchor_text, anchor_type, position_in_content, is_mandatory, \
                            placement_method, status, created_at, updated_at";

fn row_to_page(row: &Row<'_>) -> Result<Page> {
    let role: Option<String> = row.get(7)?;
    let role = match role {
        Some(s) => Some(ClusterRole::from_str(&s).ok_or_else(|| bad_column("role", &s))?),
        None => None,
    };
    let labels: String = row.get(8)?;
    let secondary: String = row.get(10)?;
    Ok(Page {
        id: row.get(0)?,
        project_id: row.get(1)?,
        cluster_id: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        body: row.get(5)?,
        word_count: row.get::<_, i64>(6)? as usize,
        role,
        labels: json_list(&labels).into_iter().collect(),
        keyword: row.get(9)?,
        secondary_keywords: json_list(&secondary),
        content_complete: row.get(11)?,
        keyword_approved: row.get(12)?,
    })
}

fn row_to_link(row: &Row<'_>) -> Result<InternalLink> {
    let scope: String = row.get(5)?;
    let anchor_type: String = row.get(7)?;
    let placement: String = row.get(10)?;
    let status: String = row.get(11)?;
    Ok(InternalLink {
        id: row.get(0)?,
        source_page_id: row.get(1)?,
        target_page_id: row.get(2)?,
        project_id: row.get(3)?,
        cluster_id: row.get(4)?,
        scope: Scope::from_str(&scope).ok_or_else(|| bad_column("scope", &scope))?,
        anchor_text: row.get(6)?,
        anchor_type: AnchorKind::from_str(&anchor_type)
            .ok_or_else(|| bad_column("anchor_type", &anchor_type))?,
        position_in_content: row.get(8)?,
        is_mandatory: row.get(9)?,
        placement_method: PlacementMethod::from_str(&placement)
            .ok_or_else(|| bad_column("placement_method", &placement))?,
        status: LinkStatus::from_str(&status).ok_or_else(|| bad_column("status", &status))?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn row_to_snapshot(row: &Row<'_>) -> Result<LinkPlanSnapshot> {
    let scope: String = row.get(3)?;
    let plan_data: String = row.get(4)?;
    let plan_data: SnapshotData = serde_json::from_str(&plan_data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(LinkPlanSnapshot {
        id: row.get(0)?,
        project_id: row.get(1)?,
        cluster_id: row.get(2)?,
        scope: Scope::from_str(&scope).ok_or_else(|| bad_column("scope", &scope))?,
        plan_data,
        total_links: row.get(5)?,
        created_at: row.get(6)?,
    })
}
