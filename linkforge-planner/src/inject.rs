//! Rule-based link injection.
//!
//! Injection is two-phase: first locate the match and compute an edit plan
//! (byte offsets into the original string), then apply the splice. The
//! document is never mutated while it is being walked.

use crate::html::strip_tags;
use tracing::debug;

/// Maximum `<a>` elements allowed per paragraph container.
pub const DEFAULT_PARAGRAPH_LINK_CAP: usize = 2;
/// Minimum words between an insertion point and any existing link in the
/// same container.
pub const DEFAULT_MIN_WORD_SPACING: usize = 50;

/// Regions whose text must never become anchor text: existing links,
/// headings, list items.
const FORBIDDEN_TAGS: [&str; 8] = ["a", "h1", "h2", "h3", "h4", "h5", "h6", "li"];

#[derive(Debug, Clone)]
pub struct Injection {
    pub html: String,
    /// Index of the `<p>` container that received the link, document order.
    pub paragraph_index: usize,
    /// Byte offset of the anchor text in the returned html.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy)]
struct EditPlan {
    start: usize,
    end: usize,
    paragraph_index: usize,
}

pub struct Injector {
    paragraph_link_cap: usize,
    min_word_spacing: usize,
}

impl Injector {
    pub fn new() -> Self {
        Self {
            paragraph_link_cap: DEFAULT_PARAGRAPH_LINK_CAP,
            min_word_spacing: DEFAULT_MIN_WORD_SPACING,
        }
    }

    pub fn with_paragraph_link_cap(mut self, cap: usize) -> Self {
        self.paragraph_link_cap = cap;
        self
    }

    pub fn with_min_word_spacing(mut self, words: usize) -> Self {
        self.min_word_spacing = words;
        self
    }

    /// Wrap the first safe occurrence of `anchor_text` in a link to
    /// `target_url`. Returns `None` when no safe insertion point exists;
    /// the caller escalates to the fallback injector.
    pub fn inject(&self, html: &str, anchor_text: &str, target_url: &str) -> Option<Injection> {
        self.inject_after(html, anchor_text, target_url, 0)
    }

    /// Like [`inject`](Self::inject) but only considers matches at or past
    /// `min_offset`, so later links on a page can be forced after an
    /// already-placed mandatory link in document order.
    pub fn inject_after(
        &self,
        html: &str,
        anchor_text: &str,
        target_url: &str,
        min_offset: usize,
    ) -> Option<Injection> {
        let plan = self.locate(html, anchor_text, min_offset)?;
        let mut out = String::with_capacity(html.len() + target_url.len() + 16);
        out.push_str(&html[..plan.start]);
        out.push_str("<a href=\"");
        out.push_str(target_url);
        out.push_str("\">");
        out.push_str(&html[plan.start..plan.end]);
        out.push_str("</a>");
        out.push_str(&html[plan.end..]);
        debug!(
            paragraph = plan.paragraph_index,
            offset = plan.start,
            "injected link to {target_url}"
        );
        Some(Injection {
            html: out,
            paragraph_index: plan.paragraph_index,
            offset: plan.start,
        })
    }

    fn locate(&self, html: &str, anchor_text: &str, min_offset: usize) -> Option<EditPlan> {
        let needle = anchor_text.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }
        let lower = html.to_ascii_lowercase();

        let mut cursor = 0usize;
        let mut paragraph_index = 0usize;
        while let Some(rel) = lower[cursor..].find("<p") {
            let tag_start = cursor + rel;
            let boundary = matches!(
                lower.as_bytes().get(tag_start + 2),
                Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')
            );
            if !boundary {
                cursor = tag_start + 2;
                continue;
            }
            let Some(open_rel) = lower[tag_start..].find('>') else {
                return None;
            };
            let content_start = tag_start + open_rel + 1;
            let Some(close_rel) = lower[content_start..].find("</p>") else {
                cursor = content_start;
                continue;
            };
            let content_end = content_start + close_rel;
            let index = paragraph_index;
            paragraph_index += 1;
            cursor = content_end + 4;

            // a paragraph nested inside a list item or heading is itself
            // forbidden territory
            if inside_forbidden_region(&lower, tag_start) {
                continue;
            }
            if let Some(plan) =
                self.scan_container(html, &lower, &needle, content_start, content_end, index, min_offset)
            {
                return Some(plan);
            }
        }
        None
    }

    /// Walk one container's content, collecting text runs outside forbidden
    /// regions and the spans of existing links, then try every occurrence of
    /// the needle against the density and spacing rules.
    #[allow(clippy::too_many_arguments)]
    fn scan_container(
        &self,
        html: &str,
        lower: &str,
        needle: &str,
        start: usize,
        end: usize,
        paragraph_index: usize,
        min_offset: usize,
    ) -> Option<EditPlan> {
        let mut texts: Vec<(usize, usize)> = Vec::new();
        let mut links: Vec<(usize, usize)> = Vec::new();
        let mut forbidden_depth = 0usize;
        let mut link_open: Option<usize> = None;

        let bytes = lower.as_bytes();
        let mut i = start;
        while i < end {
            if bytes[i] == b'<' {
                let Some(close_rel) = lower[i..end].find('>') else {
                    break;
                };
                let tag_end = i + close_rel + 1;
                let inner = &lower[i + 1..tag_end - 1];
                let closing = inner.starts_with('/');
                let name: String = inner
                    .trim_start_matches('/')
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .collect();
                if FORBIDDEN_TAGS.contains(&name.as_str()) {
                    if closing {
                        forbidden_depth = forbidden_depth.saturating_sub(1);
                        if name == "a"
                            && let Some(open) = link_open.take()
                        {
                            links.push((open, tag_end));
                        }
                    } else if !inner.ends_with('/') {
                        forbidden_depth += 1;
                        if name == "a" {
                            link_open = Some(i);
                        }
                    }
                }
                i = tag_end;
            } else {
                let run_end = lower[i..end].find('<').map(|j| i + j).unwrap_or(end);
                if forbidden_depth == 0 {
                    texts.push((i, run_end));
                }
                i = run_end;
            }
        }

        if let Some(open) = link_open {
            // unterminated link: treat the rest of the container as linked
            links.push((open, end));
        }

        if links.len() >= self.paragraph_link_cap {
            return None;
        }

        for (run_start, run_end) in texts {
            let hay = &lower[run_start..run_end];
            let mut from = 0usize;
            while let Some(pos) = hay[from..].find(needle) {
                let m_start = run_start + from + pos;
                let m_end = m_start + needle.len();
                from = from + pos + 1;
                if m_start < min_offset {
                    continue;
                }
                if !on_word_boundary(lower, m_start, m_end) {
                    continue;
                }
                if self.spacing_ok(html, &links, m_start, m_end) {
                    return Some(EditPlan {
                        start: m_start,
                        end: m_end,
                        paragraph_index,
                    });
                }
            }
        }
        None
    }

    fn spacing_ok(&self, html: &str, links: &[(usize, usize)], m_start: usize, m_end: usize) -> bool {
        for &(l_start, l_end) in links {
            let between = if l_end <= m_start {
                &html[l_end..m_start]
            } else {
                &html[m_end..l_start]
            };
            let words = strip_tags(between).split_whitespace().count();
            if words < self.min_word_spacing {
                return false;
            }
        }
        true
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether any forbidden tag opened before `upto` is still unclosed there.
fn inside_forbidden_region(lower: &str, upto: usize) -> bool {
    let mut depth = 0usize;
    let mut i = 0usize;
    while i < upto {
        let Some(rel) = lower[i..upto].find('<') else {
            break;
        };
        let start = i + rel;
        let Some(close_rel) = lower[start..].find('>') else {
            break;
        };
        let tag_end = start + close_rel + 1;
        let inner = &lower[start + 1..tag_end - 1];
        let closing = inner.starts_with('/');
        let name: String = inner
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if FORBIDDEN_TAGS.contains(&name.as_str()) {
            if closing {
                depth = depth.saturating_sub(1);
            } else if !inner.ends_with('/') {
                depth += 1;
            }
        }
        i = tag_end;
    }
    depth > 0
}

fn on_word_boundary(lower: &str, start: usize, end: usize) -> bool {
    let before = lower[..start].chars().next_back();
    let after = lower[end..].chars().next();
    !before.map(char::is_alphanumeric).unwrap_or(false)
        && !after.map(char::is_alphanumeric).unwrap_or(false)
}
