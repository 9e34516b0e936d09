use time::OffsetDateTime;
use time::macros::format_description;

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Format a refresh timestamp as `YYYY-MM-DD HH:MM:SS` for the `updTm` field.
pub fn format_update_time(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| at.unix_timestamp().to_string())
}
