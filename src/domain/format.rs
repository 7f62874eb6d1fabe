use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// Human-readable rendering of an upstream millisecond timestamp.
pub fn format_timestamp_ms(ms: Option<i64>) -> String {
    let Some(ms) = ms.filter(|ms| *ms > 0) else {
        return "Unknown".to_string();
    };

    let nanos = i128::from(ms).saturating_mul(1_000_000);
    let Ok(timestamp) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
        return "Unknown".to_string();
    };
    timestamp
        .format(&TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| "Unknown".to_string())
}
