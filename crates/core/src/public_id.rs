//! Human-shareable public identifiers for gigs.
//!
//! A public id is `slug(title)-YYYY-MM-DD`. Collisions are resolved by the
//! store probing `-2`, `-3`, ... candidates; the unique index on
//! `gigs.public_id` is the final authority.

use rand::Rng;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::gig::date_key;
use crate::types::EpochMillis;

/// Number of suffixed candidates tried before falling back to a random one.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 50;

/// Slug used when the title has no ASCII-representable characters.
const FALLBACK_SLUG: &str = "gig";

const RANDOM_SUFFIX_LEN: usize = 6;

/// Convert a title to a URL-safe slug.
///
/// Lowercases, strips diacritics, collapses runs of non-alphanumerics into
/// a single hyphen and trims hyphens at either end.
pub fn slugify(title: &str) -> String {
    let folded: String = title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let mut result = String::with_capacity(folded.len());
    let mut prev_hyphen = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_matches('-').to_string()
}

/// The unsuffixed public id for a title and start date.
pub fn base_public_id(title: &str, date_ms: EpochMillis) -> String {
    let slug = slugify(title);
    let slug = if slug.is_empty() { FALLBACK_SLUG } else { &slug };
    format!("{slug}-{}", date_key(date_ms))
}

/// The `attempt`-th candidate: the base for attempt 1, then `base-2`, `base-3`, ...
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

/// Iterator over the suffixed candidates in order.
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    (1..=MAX_SUFFIX_ATTEMPTS).map(move |attempt| candidate(base, attempt))
}

/// Random-suffixed candidate used once probing is exhausted.
pub fn random_candidate(base: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{base}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gig::parse_gig_date;

    #[test]
    fn slug_basic() {
        assert_eq!(slugify("Foo Bar"), "foo-bar");
        assert_eq!(slugify("  --Foo!!!  Bar--  "), "foo-bar");
    }

    #[test]
    fn slug_strips_diacritics() {
        assert_eq!(slugify("Sigur Rós en Málaga"), "sigur-ros-en-malaga");
        assert_eq!(slugify("Ñu Ça Va"), "nu-ca-va");
    }

    #[test]
    fn slug_of_symbols_is_empty() {
        assert_eq!(slugify("!!! ???"), "");
        assert_eq!(slugify("Концерт"), "");
    }

    #[test]
    fn base_id_appends_date() {
        let date = parse_gig_date("2026-01-23").unwrap();
        assert_eq!(base_public_id("Foo Bar", date), "foo-bar-2026-01-23");
        assert_eq!(base_public_id("Концерт", date), "gig-2026-01-23");
    }

    #[test]
    fn candidates_are_suffixed_from_two() {
        let all: Vec<String> = candidates("foo-bar-2026-01-23").take(3).collect();
        assert_eq!(
            all,
            vec![
                "foo-bar-2026-01-23",
                "foo-bar-2026-01-23-2",
                "foo-bar-2026-01-23-3"
            ]
        );
        assert_eq!(candidates("x").count() as u32, MAX_SUFFIX_ATTEMPTS);
    }

    #[test]
    fn random_candidate_shape() {
        let id = random_candidate("foo-2026-01-23");
        let suffix = id.strip_prefix("foo-2026-01-23-").unwrap();
        assert_eq!(suffix.len(), RANDOM_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
