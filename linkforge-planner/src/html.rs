//! Read-only HTML inspection plus the string-level helpers shared by the
//! injector, validator, and re-plan stripping.

use scraper::{Html, Selector};
use std::collections::HashSet;

/// Total `<a>` elements in a fragment.
pub fn count_links(html: &str) -> usize {
    let document = Html::parse_fragment(html);
    let selector = Selector::parse("a").unwrap();
    document.select(&selector).count()
}

/// `<a>` counts per `<p>` container, in document order.
pub fn paragraph_link_counts(html: &str) -> Vec<usize> {
    let document = Html::parse_fragment(html);
    let p_selector = Selector::parse("p").unwrap();
    let a_selector = Selector::parse("a").unwrap();
    document
        .select(&p_selector)
        .map(|p| p.select(&a_selector).count())
        .collect()
}

/// href of the first `<a href>` in document order, if any.
pub fn first_link_href(html: &str) -> Option<String> {
    let document = Html::parse_fragment(html);
    let selector = Selector::parse("a[href]").unwrap();
    document
        .select(&selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Visible (rendered-text) word count of a fragment.
pub fn visible_word_count(html: &str) -> usize {
    let document = Html::parse_fragment(html);
    document
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .count()
}

/// Drop tag markup from a slice, keeping only text content.
pub(crate) fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Unwrap every `<a>` whose href is in `targets`, keeping the inner text.
/// Used when a re-plan strips previously injected links out of page bodies.
pub fn strip_links_to(html: &str, targets: &HashSet<String>) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut i = 0usize;
    while i < html.len() {
        let Some(rel) = lower[i..].find("<a") else {
            out.push_str(&html[i..]);
            break;
        };
        let tag_start = i + rel;
        let boundary = matches!(
            lower.as_bytes().get(tag_start + 2),
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')
        );
        if !boundary {
            out.push_str(&html[i..tag_start + 2]);
            i = tag_start + 2;
            continue;
        }
        let Some(open_rel) = lower[tag_start..].find('>') else {
            out.push_str(&html[i..]);
            break;
        };
        let open_end = tag_start + open_rel + 1;
        let Some(close_rel) = lower[open_end..].find("</a>") else {
            out.push_str(&html[i..]);
            break;
        };
        let close_start = open_end + close_rel;

        out.push_str(&html[i..tag_start]);
        let href = extract_href(&html[tag_start..open_end]);
        if href.map(|h| targets.contains(&h)).unwrap_or(false) {
            out.push_str(&html[open_end..close_start]);
        } else {
            out.push_str(&html[tag_start..close_start + 4]);
        }
        i = close_start + 4;
    }
    out
}

fn extract_href(tag: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let pos = lower.find("href")?;
    let rest = tag[pos + 4..].trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    rest[1..].find(quote).map(|end| rest[1..1 + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_links_and_paragraph_density() {
        let html = r#"<p>one <a href="/a">x</a> <a href="/b">y</a></p><p>plain</p>"#;
        assert_eq!(count_links(html), 2);
        assert_eq!(paragraph_link_counts(html), vec![2, 0]);
    }

    #[test]
    fn first_link_in_document_order() {
        let html = r#"<p>text</p><p><a href="/first">a</a> <a href="/second">b</a></p>"#;
        assert_eq!(first_link_href(html), Some("/first".to_string()));
    }

    #[test]
    fn word_count_ignores_markup() {
        let html = "<p>three <b>short</b> words</p>";
        assert_eq!(visible_word_count(html), 3);
    }

    #[test]
    fn strips_only_matching_links() {
        let html = r#"<p>see <a href="/keep">kept</a> and <a href="/drop">dropped</a></p>"#;
        let targets: HashSet<String> = ["/drop".to_string()].into_iter().collect();
        let stripped = strip_links_to(html, &targets);
        assert_eq!(
            stripped,
            r#"<p>see <a href="/keep">kept</a> and dropped</p>"#
        );
    }

    #[test]
    fn strip_then_count_round_trip() {
        let html = r#"<p>alpha <a href="/x">beta</a> gamma</p>"#;
        let targets: HashSet<String> = ["/x".to_string()].into_iter().collect();
        let stripped = strip_links_to(html, &targets);
        assert_eq!(stripped, "<p>alpha beta gamma</p>");
        assert_eq!(count_links(&stripped), 0);
        assert_eq!(visible_word_count(&stripped), visible_word_count(html));
    }
}
