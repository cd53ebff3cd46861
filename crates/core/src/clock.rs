//! UTC timestamp helpers.
//!
//! All persisted timestamps are RFC 3339 strings. Formatting is done by
//! hand so the helper is infallible; millisecond precision keeps history
//! entries distinguishable within a request burst.

use time::OffsetDateTime;

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.millisecond()
    )
}
