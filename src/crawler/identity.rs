//! Cross-mirror work identity.
//!
//! Backup mirrors may index a translated edition under its own catalog code.
//! When the work a backup returns is an edition of the id that was queried,
//! callers must see the queried id, not the mirror's.

use super::models::{LanguageEdition, RawWork};
use regex::Regex;
use std::sync::LazyLock;

static CATALOG_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RJ\d{6,}").expect("static catalog code pattern"));

fn eq_id(candidate: Option<&str>, id: &str) -> bool {
    candidate.is_some_and(|c| c.trim().eq_ignore_ascii_case(id))
}

/// Whether `original_workno` or any edition's workno equals `catalog_id`,
/// ignoring case and surrounding whitespace.
pub fn work_matches_catalog_id(
    original_workno: Option<&str>,
    editions: &[LanguageEdition],
    catalog_id: &str,
) -> bool {
    let id = catalog_id.trim();
    if id.is_empty() {
        return false;
    }
    eq_id(original_workno, id) || editions.iter().any(|e| eq_id(e.workno.as_deref(), id))
}

/// Source id to report for `work` when it was found by querying `queried_id`.
pub fn reconcile_source_id(work: &RawWork, queried_id: &str) -> String {
    let queried = queried_id.trim();
    if work_matches_catalog_id(work.original_workno.as_deref(), work.editions(), queried) {
        return queried.to_string();
    }
    match work.source_id.as_deref().map(str::trim) {
        Some(own) if !own.is_empty() => own.to_string(),
        _ => queried.to_string(),
    }
}

/// Whether a search keyword has the canonical-id shape (`RJ` prefix, any case).
pub fn looks_like_catalog_id(keyword: &str) -> bool {
    keyword
        .trim()
        .get(..2)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("RJ"))
}

/// First catalog code in `text`, uppercased.
pub fn extract_catalog_code(text: &str) -> Option<String> {
    let upper = text.trim().to_uppercase();
    CATALOG_CODE.find(&upper).map(|m| m.as_str().to_string())
}

/// Trims and uppercases candidates, dropping blanks and duplicates while
/// keeping first-seen order.
pub fn normalize_candidates<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for candidate in candidates {
        let normalized = candidate.as_ref().trim().to_uppercase();
        if !normalized.is_empty() && !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}
