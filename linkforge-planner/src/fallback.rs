//! Fallback injection through an external language-model capability.
//!
//! Only invoked when rule-based injection finds no safe insertion point.
//! The request is template-constrained to a minimal edit, and any response
//! that fails the structural sanity check is rejected outright.

use crate::error::{PlanError, Result};
use crate::html;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

/// Upper bound on in-flight fallback calls, shared across jobs.
pub const DEFAULT_FALLBACK_CONCURRENCY: usize = 5;

/// Allowed drift in visible word count between snippet and response.
const MAX_WORD_DRIFT: usize = 3;

const INSTRUCTION_TEMPLATE: &str = "Insert exactly one hyperlink into the HTML below. \
Wrap the anchor text \"{anchor}\" (or the closest natural phrasing of it) in \
<a href=\"{url}\">...</a>. Do not add, remove, or rewrite any other text or markup. \
Return only the modified HTML.";

#[derive(Debug, Serialize)]
struct FallbackRequest<'a> {
    html: &'a str,
    anchor_text: &'a str,
    target_url: &'a str,
    instruction: String,
}

#[derive(Debug, Deserialize)]
struct FallbackResponse {
    html: String,
}

pub struct FallbackClient {
    client: Client,
    endpoint: Url,
    permits: Arc<Semaphore>,
}

impl FallbackClient {
    pub fn new(endpoint: Url) -> Self {
        Self::with_timeout(endpoint, 30)
    }

    pub fn with_timeout(endpoint: Url, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent("Linkforge/0.1 (https://github.com/trapdoorsec/linkforge)")
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs / 2))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint,
            permits: Arc::new(Semaphore::new(DEFAULT_FALLBACK_CONCURRENCY)),
        }
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    /// Ask the model for a minimal edit that inserts exactly one link.
    /// Returns the modified HTML, or an error if the call fails or the
    /// response flunks the sanity check.
    pub async fn inject(
        &self,
        snippet: &str,
        anchor_text: &str,
        target_url: &str,
    ) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("fallback semaphore closed");

        let instruction = INSTRUCTION_TEMPLATE
            .replace("{anchor}", anchor_text)
            .replace("{url}", target_url);
        let request = FallbackRequest {
            html: snippet,
            anchor_text,
            target_url,
            instruction,
        };

        debug!("fallback injection request for anchor '{anchor_text}'");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body: FallbackResponse = response.json().await?;

        sanity_check(snippet, &body.html)?;
        Ok(body.html)
    }
}

/// Structural check on the model's edit: exactly one link added, visible
/// word count materially unchanged.
fn sanity_check(original: &str, modified: &str) -> Result<()> {
    let links_before = html::count_links(original);
    let links_after = html::count_links(modified);
    if links_after != links_before + 1 {
        warn!(
            links_before,
            links_after, "fallback response changed link count unexpectedly"
        );
        return Err(PlanError::FallbackRejected(format!(
            "expected {} links, got {}",
            links_before + 1,
            links_after
        )));
    }

    let words_before = html::visible_word_count(original);
    let words_after = html::visible_word_count(modified);
    if words_before.abs_diff(words_after) > MAX_WORD_DRIFT {
        warn!(
            words_before,
            words_after, "fallback response materially changed content"
        );
        return Err(PlanError::FallbackRejected(format!(
            "word count drifted from {words_before} to {words_after}"
        )));
    }
    Ok(())
}
