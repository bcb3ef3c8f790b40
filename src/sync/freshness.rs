//! Freshness comparison between the remote `Last-Modified` header and the
//! locally stored refresh stamp.
//!
//! The two sides arrive in different formats (RFC 2822 from the server, a
//! local `%Y-%m-%d %H:%M:%S` stamp on disk), so both are parsed to actual
//! instants before comparing. Raw string ordering is kept only as a last
//! resort for stamps no format matches.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

use crate::models::NEVER_UPDATED;

/// Format used when stamping a successful refresh.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_stamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        // Refresh stamps carry no zone; they were written in local time.
        return Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
    }
    None
}

/// Whether the remote stamp is strictly newer than the local one.
pub fn is_newer(remote: &str, local: &str) -> bool {
    if local == NEVER_UPDATED {
        return true;
    }
    match (parse_stamp(remote), parse_stamp(local)) {
        (Some(remote), Some(local)) => remote > local,
        // Unparseable on either side: fall back to raw string ordering.
        _ => remote > local,
    }
}
