//! Content-length banded link budgets.
//!
//! The budget is advisory input to target selection, not a hard ceiling
//! enforced anywhere else in the pipeline.

/// Lower edge of the recommended realized-link range (validator WARN band).
pub const MIN_RECOMMENDED_LINKS: usize = 3;
/// Upper edge of the recommended realized-link range (validator WARN band).
pub const MAX_RECOMMENDED_LINKS: usize = 5;

/// Suggested outbound link count for a page of the given length.
pub fn target_link_count(word_count: usize) -> usize {
    match word_count {
        0..=399 => 2,
        400..=899 => 3,
        900..=1499 => 4,
        1500..=2499 => 5,
        _ => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_gets_two_links() {
        assert_eq!(target_link_count(0), 2);
        assert_eq!(target_link_count(399), 2);
    }

    #[test]
    fn bands_are_monotonic() {
        let mut last = 0;
        for words in [0, 400, 900, 1500, 2500, 10_000] {
            let budget = target_link_count(words);
            assert!(budget >= last, "budget dropped at {words} words");
            last = budget;
        }
    }

    #[test]
    fn long_content_gets_more_links() {
        assert_eq!(target_link_count(1800), 5);
        assert_eq!(target_link_count(5000), 6);
    }
}
