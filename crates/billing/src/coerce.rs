//! Coercion of loosely typed provider values
//!
//! Product metadata arrives as strings (sometimes native JSON values).
//! Every conversion here is total: a value that does not fit becomes the
//! documented fallback and the occurrence is logged with a
//! `malformed_field` tag.

use planwise_shared::{FlagKind, LimitKind};
use serde_json::Value;

pub const DOCS_PROCESSING_KEY: &str = "docs_processing";

/// Metadata key carrying the maximum for a limit kind
pub fn limit_metadata_key(kind: LimitKind) -> &'static str {
    match kind {
        LimitKind::Members => "members_limit",
        LimitKind::Apps => "apps_limit",
        LimitKind::VectorSpace => "vector_space_limit",
        LimitKind::AnnotationQuota => "annotation_quota_limit",
        LimitKind::DocumentsUploadQuota => "documents_upload_quota_limit",
    }
}

/// Metadata key carrying a flag
pub fn flag_metadata_key(kind: FlagKind) -> &'static str {
    kind.as_str()
}

/// Integer from a JSON number or a string holding one
pub fn parse_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Boolean from a JSON bool or a case-insensitive `"true"`/`"false"` string
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

pub fn parse_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Integer or 0, logging the miss
pub fn count_or_zero(field: &str, value: &Value) -> i64 {
    parse_count(value).unwrap_or_else(|| {
        report_malformed(field, value, "0");
        0
    })
}

/// Boolean or `false`, logging the miss
pub fn flag_or_false(field: &str, value: &Value) -> bool {
    parse_flag(value).unwrap_or_else(|| {
        report_malformed(field, value, "false");
        false
    })
}

pub fn report_malformed(field: &str, raw: &Value, fallback: &str) {
    tracing::warn!(
        malformed_field = field,
        raw = %raw,
        fallback,
        "Coerced malformed billing field to default"
    );
}
