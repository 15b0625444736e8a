use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::{Display, Write};
use thiserror::Error;

const TIMESTAMP: &str = "{timestamp}";
const COUNT: &str = "{count}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitMessageError {
    #[error("`{format}` is not a valid strftime format")]
    InvalidFormat { format: String },
    #[error("`{format}` has no date or time fields")]
    NoTimestampFields { format: String },
}

/// Check that `format` parses, contains at least one date or time field and
/// can be rendered for the current local time
pub fn check_timestamp_format(format: &str) -> Result<(), CommitMessageError> {
    let mut has_field = false;
    for item in StrftimeItems::new(format) {
        match item {
            Item::Error => {
                return Err(CommitMessageError::InvalidFormat {
                    format: format.to_string(),
                })
            }
            Item::Literal(_) | Item::OwnedLiteral(_) | Item::Space(_) | Item::OwnedSpace(_) => {}
            _ => has_field = true,
        }
    }

    if !has_field {
        return Err(CommitMessageError::NoTimestampFields {
            format: format.to_string(),
        });
    }

    // some specifiers only parse and fail when formatting
    format_timestamp(format, &Local::now()).map(|_| ())
}

fn format_timestamp<Tz>(format: &str, now: &DateTime<Tz>) -> Result<String, CommitMessageError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    write!(out, "{}", now.format(format)).map_err(|_| CommitMessageError::InvalidFormat {
        format: format.to_string(),
    })?;
    Ok(out)
}

/// Render a commit message template
///
/// `{timestamp}` is replaced with `now` formatted by `timestamp_format` and
/// `{count}` with the number of changed paths. A template without a
/// `{timestamp}` placeholder gets one appended in parentheses, so every
/// published commit is dated.
pub fn render<Tz>(
    template: &str,
    timestamp_format: &str,
    now: &DateTime<Tz>,
    count: usize,
) -> Result<String, CommitMessageError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let template = template.trim();
    let template = if template.contains(TIMESTAMP) {
        template.to_string()
    } else if template.is_empty() {
        TIMESTAMP.to_string()
    } else {
        format!("{template} ({TIMESTAMP})")
    };

    let timestamp = format_timestamp(timestamp_format, now)?;
    Ok(template
        .replace(TIMESTAMP, &timestamp)
        .replace(COUNT, &count.to_string()))
}
