use crate::error::CoreError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Parse and validate an IANA timezone name
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    timezone
        .parse()
        .map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Format a UTC instant for display in the given timezone
pub fn format_with_timezone(
    datetime: DateTime<Utc>,
    timezone: &str,
    format: &str,
) -> Result<String, CoreError> {
    let tz = parse_timezone(timezone)?;
    Ok(datetime.with_timezone(&tz).format(format).to_string())
}
