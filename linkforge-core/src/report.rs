// Report generation from database

use crate::data::Database;
use crate::model::{LinkStatus, Page, ScopeKey};
use crate::pipeline::PipelineError;
use crate::validate::{ValidationReport, Validator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub project_id: i64,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i64>,
    pub total_pages: usize,
    pub status_counts: StatusCounts,
    pub links: Vec<LinkRow>,
    pub validation: ValidationReport,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusCounts {
    pub planned: i64,
    pub injected: i64,
    pub verified: i64,
    pub removed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkRow {
    pub id: i64,
    pub source_url: String,
    pub target_url: String,
    pub anchor_text: String,
    pub anchor_type: String,
    pub status: String,
    pub placement_method: String,
    pub is_mandatory: bool,
}

pub fn gather_report_data(db: &Database, key: &ScopeKey) -> Result<ReportData, PipelineError> {
    let pages = db.scope_pages(key)?;
    let page_map: HashMap<i64, Page> = pages.into_iter().map(|p| (p.id, p)).collect();
    let links = db.active_links(key)?;

    let mut status_counts = StatusCounts {
        removed: db.removed_link_count(key)?,
        ..StatusCounts::default()
    };
    for link in &links {
        match link.status {
            LinkStatus::Planned => status_counts.planned += 1,
            LinkStatus::Injected => status_counts.injected += 1,
            LinkStatus::Verified => status_counts.verified += 1,
            LinkStatus::Removed => status_counts.removed += 1,
        }
    }

    let placed: Vec<_> = links
        .iter()
        .filter(|l| l.status != LinkStatus::Planned)
        .cloned()
        .collect();
    let validation = Validator::new().validate(&placed, &page_map, key.scope, key.cluster_id);

    let url_of = |id: i64| {
        page_map
            .get(&id)
            .map(|p| p.url.clone())
            .unwrap_or_else(|| format!("page {id}"))
    };
    let rows = links
        .iter()
        .map(|l| LinkRow {
            id: l.id,
            source_url: url_of(l.source_page_id),
            target_url: url_of(l.target_page_id),
            anchor_text: l.anchor_text.clone(),
            anchor_type: l.anchor_type.as_str().to_string(),
            status: l.status.as_str().to_string(),
            placement_method: l.placement_method.as_str().to_string(),
            is_mandatory: l.is_mandatory,
        })
        .collect();

    Ok(ReportData {
        project_id: key.project_id,
        scope: key.scope.as_str().to_string(),
        cluster_id: key.cluster_id,
        total_pages: page_map.len(),
        status_counts,
        links: rows,
        validation,
    })
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    // Header
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("                        LINKFORGE INTERNAL LINK REPORT\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    report.push_str(&format!("Project:      {}\n", data.project_id));
    report.push_str(&format!("Scope:        {}\n", data.scope));
    if let Some(cluster) = data.cluster_id {
        report.push_str(&format!("Cluster:      {}\n", cluster));
    }
    report.push_str(&format!("Pages:        {}\n", data.total_pages));
    report.push('\n');

    // Summary
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("LINK SUMMARY\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!("Active Links:   {}\n\n", data.links.len()));
    if data.status_counts.verified > 0 {
        report.push_str(&format!("  [VERIFIED] {}\n", data.status_counts.verified));
    }
    if data.status_counts.injected > 0 {
        report.push_str(&format!("  [INJECTED] {}\n", data.status_counts.injected));
    }
    if data.status_counts.planned > 0 {
        report.push_str(&format!(
            "  [PLANNED]  {}  (no safe insertion point yet)\n",
            data.status_counts.planned
        ));
    }
    if data.status_counts.removed > 0 {
        report.push_str(&format!("  [REMOVED]  {}\n", data.status_counts.removed));
    }
    report.push('\n');

    // Validation outcomes
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("VALIDATION\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    for result in &data.validation.results {
        let mark = match (result.passed, result.advisory) {
            (true, _) => "PASS",
            (false, true) => "WARN",
            (false, false) => "FAIL",
        };
        report.push_str(&format!("  [{mark}] {}\n", result.rule));
        if let Some(ref detail) = result.detail {
            report.push_str(&format!("         {detail}\n"));
        }
    }
    report.push('\n');

    // Link listing
    if !data.links.is_empty() {
        report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        report.push_str("LINKS\n");
        report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
        for (idx, link) in data.links.iter().enumerate() {
            report.push_str(&format!("[{}] \"{}\"\n", idx + 1, link.anchor_text));
            report.push_str(&format!("Source:       {}\n", link.source_url));
            report.push_str(&format!("Target:       {}\n", link.target_url));
            report.push_str(&format!(
                "Type:         {}{}\n",
                link.anchor_type,
                if link.is_mandatory { " (mandatory)" } else { "" }
            ));
            report.push_str(&format!("Status:       {}\n", link.status));
            report.push_str(&format!("Placed By:    {}\n", link.placement_method));
            report.push_str("────────────────────────────────────────────────────────────────────────────────\n\n");
        }
    }

    // Footer
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("                          End of Report\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("\nGenerated by Linkforge - internal link planning for generated sites\n\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Linkforge",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "scope": {
                "project_id": data.project_id,
                "scope": data.scope,
                "cluster_id": data.cluster_id,
                "total_pages": data.total_pages
            },
            "summary": {
                "active_links": data.links.len(),
                "status_breakdown": data.status_counts,
                "validation_passed": data.validation.passed()
            },
            "links": data.links,
            "validation": data.validation.results
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
