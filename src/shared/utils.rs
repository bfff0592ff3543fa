use chrono::{DateTime, FixedOffset, Utc};

/// Audit timestamps are reported in the fixed +08:00 offset used by the
/// downstream log consumers.
const AUDIT_OFFSET_SECS: i32 = 8 * 3600;

pub fn audit_timestamp() -> String {
    audit_timestamp_at(Utc::now())
}

pub fn audit_timestamp_at(instant: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(AUDIT_OFFSET_SECS).expect("offset within range");
    instant.with_timezone(&offset).to_rfc3339()
}

/// Human-readable due date for emails, e.g. "01 June 2024, 10:00 AM".
pub fn format_due_date(due: &DateTime<Utc>) -> String {
    due.format("%d %B %Y, %I:%M %p").to_string()
}
