//! Header rewrite for a release.

use crate::{CodeSystemDocument, Concept, TEMPLATE_SENTINEL_CODE};
use chrono::{FixedOffset, NaiveDate};
use serde_json::Value;

/// TMT releases are dated in Thailand time.
const RELEASE_UTC_OFFSET_SECS: i32 = 7 * 3600;

const TITLE_PREFIX: &str = "Thai Medicines Terminology (TMT)";

/// ISO-8601 timestamp for a `YYYYMMDD` release version, e.g.
/// `20250407` → `2025-04-07T00:00:00+07:00`.
///
/// Anything that is not exactly eight digits naming a real calendar day
/// yields an empty string.
pub fn release_date(version: &str) -> String {
    if version.len() != 8 || !version.bytes().all(|b| b.is_ascii_digit()) {
        return String::new();
    }
    let Ok(day) = NaiveDate::parse_from_str(version, "%Y%m%d") else {
        return String::new();
    };
    let Some(offset) = FixedOffset::east_opt(RELEASE_UTC_OFFSET_SECS) else {
        return String::new();
    };
    day.and_hms_opt(0, 0, 0)
        .and_then(|t| t.and_local_timezone(offset).single())
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
        .unwrap_or_default()
}

pub fn release_title(version: &str) -> String {
    format!("{TITLE_PREFIX} {version}")
}

/// Turns the template into the release document: drops the placeholder
/// concept, stamps `version`/`date`/`title`, and appends `concepts`.
pub fn finalize_document(
    mut doc: CodeSystemDocument,
    version: &str,
    concepts: Vec<Concept>,
) -> CodeSystemDocument {
    let seeds_before = doc.concept.len();
    doc.concept.retain(|c| c.code != TEMPLATE_SENTINEL_CODE);
    if doc.concept.len() == seeds_before {
        tracing::warn!(
            sentinel = TEMPLATE_SENTINEL_CODE,
            "template has no placeholder concept to remove"
        );
    }

    doc.version = version.to_string();
    doc.date = release_date(version);
    if doc.date.is_empty() {
        tracing::warn!(version, "version is not a YYYYMMDD date; leaving `date` empty");
    }
    doc.title = release_title(version);

    doc.concept.extend(concepts);
    if doc.extra.contains_key("count") {
        doc.extra
            .insert("count".to_string(), Value::from(doc.concept.len()));
    }
    doc
}
